//! Chat model collaborator
//!
//! Message and tool-spec types mirror the OpenAI chat-completions wire
//! format so the conversation history serializes directly into requests.
//! The [`ChatModel`] trait is the seam the orchestrator drives; the
//! production implementation talks to any OpenAI-compatible endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// One conversation turn in wire format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    /// System turn
    #[must_use]
    pub fn system(content: &str) -> Self {
        Self::plain("system", content)
    }

    /// User turn
    #[must_use]
    pub fn user(content: &str) -> Self {
        Self::plain("user", content)
    }

    /// Assistant text turn
    #[must_use]
    pub fn assistant(content: &str) -> Self {
        Self::plain("assistant", content)
    }

    /// Assistant turn carrying tool calls
    #[must_use]
    pub fn assistant_with_calls(content: Option<String>, calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: "assistant".to_string(),
            content,
            tool_calls: Some(calls),
            tool_call_id: None,
        }
    }

    /// Tool-result turn answering the call with the given correlation id
    #[must_use]
    pub fn tool(call_id: &str, content: &str) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content.to_string()),
            tool_calls: None,
            tool_call_id: Some(call_id.to_string()),
        }
    }

    fn plain(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.to_string()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

/// A tool call requested by the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: FunctionCall,
}

impl ToolCallRequest {
    /// Function-type tool call
    #[must_use]
    pub fn function(id: &str, name: &str, arguments: &str) -> Self {
        Self {
            id: id.to_string(),
            call_type: "function".to_string(),
            function: FunctionCall {
                name: name.to_string(),
                arguments: arguments.to_string(),
            },
        }
    }
}

/// Function name and JSON-encoded arguments within a tool call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

/// A callable function advertised to the model
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    #[serde(rename = "type")]
    pub spec_type: String,
    pub function: FunctionSpec,
}

/// Function shape within a tool spec
#[derive(Debug, Clone, Serialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolSpec {
    /// Function-type spec from a name, description, and parameter schema
    #[must_use]
    pub fn function(name: String, description: String, parameters: Value) -> Self {
        Self {
            spec_type: "function".to_string(),
            function: FunctionSpec {
                name,
                description,
                parameters,
            },
        }
    }
}

/// The model's reply to one completion request
#[derive(Debug, Clone)]
pub struct AssistantReply {
    /// Text content, absent when the reply only carries tool calls
    pub content: Option<String>,
    /// Tool calls to execute before the next round
    pub tool_calls: Vec<ToolCallRequest>,
}

/// Chat completion collaborator
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send the message list (and tool catalog) and return the reply
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<AssistantReply>;
}

/// Request body for the chat-completions endpoint
#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolSpec]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'a str>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: WireAssistantMessage,
}

#[derive(Deserialize)]
struct WireAssistantMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallRequest>>,
}

/// Chat client for OpenAI-compatible APIs
pub struct OpenAiChat {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
}

impl OpenAiChat {
    /// Create a chat client
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing
    pub fn new(api_key: Option<String>, api_base: String, model: String) -> Result<Self> {
        let api_key = api_key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Config("API key required for chat completions".to_string()))?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            api_base,
            model,
        })
    }

    /// Model identifier this client sends
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<AssistantReply> {
        tracing::debug!(
            model = %self.model,
            messages = messages.len(),
            tools = tools.len(),
            "requesting chat completion"
        );

        let body = ChatCompletionRequest {
            model: &self.model,
            messages,
            tools: (!tools.is_empty()).then_some(tools),
            tool_choice: (!tools.is_empty()).then_some("auto"),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "chat completion request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "chat API error");
            return Err(Error::Processing(format!("chat API error {status}: {body}")));
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse chat completion");
            e
        })?;

        let message = completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| Error::Processing("chat completion had no choices".to_string()))?;

        Ok(AssistantReply {
            content: message.content,
            tool_calls: message.tool_calls.unwrap_or_default(),
        })
    }
}
