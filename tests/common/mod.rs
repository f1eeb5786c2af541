//! Shared test utilities

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use vox_gateway::llm::{AssistantReply, ChatMessage, ChatModel, ToolCallRequest, ToolSpec};
use vox_gateway::tools::ToolProviderConfig;
use vox_gateway::Result;

/// A chunk of pure silence (1280 zero samples)
#[must_use]
pub fn silent_chunk() -> Vec<u8> {
    vec![0u8; 1280 * 2]
}

/// A constant-amplitude loud chunk (RMS well above any silence threshold)
#[must_use]
pub fn loud_chunk() -> Vec<u8> {
    16000i16.to_le_bytes().repeat(1280)
}

/// Config for a shell-based fake provider
///
/// The provider answers `tools/list` with a single tool named `search` and
/// every other request with a text block carrying `reply_text`, echoing the
/// request's correlation id throughout.
#[cfg(unix)]
#[must_use]
pub fn fake_provider(reply_text: &str) -> ToolProviderConfig {
    let script = format!(
        r#"while IFS= read -r line; do
  id=$(printf '%s' "$line" | sed -n 's/.*"id":\([0-9]*\).*/\1/p')
  case "$line" in
    *tools/list*) printf '{{"id":%s,"result":{{"tools":[{{"name":"search","description":"Search","inputSchema":{{"type":"object"}}}}]}}}}\n' "$id" ;;
    *) printf '{{"id":%s,"result":{{"content":[{{"type":"text","text":"{reply_text}"}}]}}}}\n' "$id" ;;
  esac
done"#
    );
    ToolProviderConfig {
        name: format!("fake ({reply_text})"),
        command: "sh".to_string(),
        args: vec!["-c".to_string(), script],
        env: HashMap::new(),
        exclude_tools: Vec::new(),
        enabled: true,
    }
}

/// Config for a provider that answers discovery once, then exits
#[cfg(unix)]
#[must_use]
pub fn one_shot_provider() -> ToolProviderConfig {
    let script = r#"IFS= read -r line
id=$(printf '%s' "$line" | sed -n 's/.*"id":\([0-9]*\).*/\1/p')
printf '{"id":%s,"result":{"tools":[{"name":"search","description":"Search","inputSchema":{"type":"object"}}]}}\n' "$id"
exit 0"#;
    ToolProviderConfig {
        name: "one-shot".to_string(),
        command: "sh".to_string(),
        args: vec!["-c".to_string(), script.to_string()],
        env: HashMap::new(),
        exclude_tools: Vec::new(),
        enabled: true,
    }
}

/// Chat model that pops one scripted reply per completion request and
/// records every message list it sees
pub struct ScriptedModel {
    replies: Mutex<Vec<AssistantReply>>,
    pub seen: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    #[must_use]
    pub fn new(mut replies: Vec<AssistantReply>) -> Self {
        replies.reverse();
        Self {
            replies: Mutex::new(replies),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Reply with plain text (ends the tool loop)
    #[must_use]
    pub fn text(content: &str) -> AssistantReply {
        AssistantReply {
            content: Some(content.to_string()),
            tool_calls: Vec::new(),
        }
    }

    /// Reply requesting a single tool call
    #[must_use]
    pub fn tool_call(id: &str, qualified_name: &str, arguments: &str) -> AssistantReply {
        AssistantReply {
            content: None,
            tool_calls: vec![ToolCallRequest::function(id, qualified_name, arguments)],
        }
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _tools: &[ToolSpec],
    ) -> Result<AssistantReply> {
        self.seen.lock().unwrap().push(messages.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| vox_gateway::Error::Processing("scripted model exhausted".to_string()))
    }
}
