//! Shared assistant service
//!
//! One process-wide instance glues transcription, context assembly, the
//! tool orchestrator, and the conversation history. Sessions and the HTTP
//! endpoints all drive the same code path through [`UtterancePipeline`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::audio::UtterancePipeline;
use crate::context::{ContextAssembler, ContextProvider, ConversationHistory};
use crate::llm::ChatModel;
use crate::stt::Transcriber;
use crate::tools::ToolOrchestrator;
use crate::Result;

/// Process-wide assistant shared across sessions
pub struct Assistant {
    chat: Arc<dyn ChatModel>,
    transcriber: Arc<dyn Transcriber>,
    orchestrator: Arc<ToolOrchestrator>,
    context: Option<Arc<dyn ContextProvider>>,
    assembler: ContextAssembler,
    /// Held across the model call so concurrent sessions append turns in a
    /// consistent order
    history: Mutex<ConversationHistory>,
}

impl Assistant {
    /// Create an assistant
    #[must_use]
    pub fn new(
        chat: Arc<dyn ChatModel>,
        transcriber: Arc<dyn Transcriber>,
        orchestrator: Arc<ToolOrchestrator>,
        context: Option<Arc<dyn ContextProvider>>,
        base_prompt: String,
    ) -> Self {
        Self {
            chat,
            transcriber,
            orchestrator,
            context,
            assembler: ContextAssembler::new(base_prompt),
            history: Mutex::new(ConversationHistory::new()),
        }
    }

    /// Answer one user message, updating the conversation history
    ///
    /// Retrieval failures degrade to an un-augmented request; they never
    /// fail the turn.
    ///
    /// # Errors
    ///
    /// Returns error if the model/tool loop fails.
    pub async fn respond(&self, text: &str) -> Result<String> {
        let retrieved = match &self.context {
            Some(provider) => match provider.search(text).await {
                Ok(chunks) => chunks,
                Err(e) => {
                    tracing::warn!(error = %e, "context retrieval failed, continuing without");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let mut history = self.history.lock().await;
        history.push_user(text);
        let messages = self.assembler.assemble(&retrieved, history.turns());

        tracing::info!(history_turns = history.len(), "running conversation turn");
        let reply = self
            .orchestrator
            .run_conversation_turn(self.chat.as_ref(), messages)
            .await?;

        history.push_assistant(&reply);
        tracing::info!(chars = reply.len(), "assistant reply ready");
        Ok(reply)
    }

    /// Drop the conversation history
    pub async fn reset_conversation(&self) {
        self.history.lock().await.reset();
    }

    /// Re-read the document-context collaborator's source
    ///
    /// # Errors
    ///
    /// Returns error if no provider is configured or the reload fails.
    pub async fn reload_knowledge(&self) -> Result<()> {
        match &self.context {
            Some(provider) => provider.reload().await,
            None => Err(crate::Error::Config(
                "document retrieval is not enabled".to_string(),
            )),
        }
    }

    /// Whether document retrieval is configured
    #[must_use]
    pub fn retrieval_enabled(&self) -> bool {
        self.context.is_some()
    }
}

#[async_trait]
impl UtterancePipeline for Assistant {
    async fn transcribe(&self, wav: Vec<u8>) -> Result<String> {
        self.transcriber.transcribe(wav).await
    }

    async fn respond(&self, text: &str) -> Result<String> {
        Self::respond(self, text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToolsConfig;
    use crate::llm::{AssistantReply, ChatMessage, ToolSpec};

    struct CannedModel;

    #[async_trait]
    impl ChatModel for CannedModel {
        async fn complete(
            &self,
            messages: &[ChatMessage],
            _tools: &[ToolSpec],
        ) -> Result<AssistantReply> {
            // Echo how much context arrived so tests can assert on it
            Ok(AssistantReply {
                content: Some(format!("saw {} messages", messages.len())),
                tool_calls: Vec::new(),
            })
        }
    }

    struct NoopTranscriber;

    #[async_trait]
    impl Transcriber for NoopTranscriber {
        async fn transcribe(&self, _audio: Vec<u8>) -> Result<String> {
            Ok("transcript".to_string())
        }
    }

    fn assistant() -> Assistant {
        Assistant::new(
            Arc::new(CannedModel),
            Arc::new(NoopTranscriber),
            Arc::new(ToolOrchestrator::new(&ToolsConfig::default())),
            None,
            "Base.".to_string(),
        )
    }

    #[tokio::test]
    async fn history_grows_across_turns() {
        let assistant = assistant();

        // system + user
        assert_eq!(assistant.respond("one").await.unwrap(), "saw 2 messages");
        // system + user + assistant + user
        assert_eq!(assistant.respond("two").await.unwrap(), "saw 4 messages");
    }

    #[tokio::test]
    async fn reset_clears_history() {
        let assistant = assistant();
        assistant.respond("one").await.unwrap();
        assistant.reset_conversation().await;
        assert_eq!(assistant.respond("two").await.unwrap(), "saw 2 messages");
    }

    #[tokio::test]
    async fn reload_without_provider_is_a_config_error() {
        let assistant = assistant();
        assert!(assistant.reload_knowledge().await.is_err());
        assert!(!assistant.retrieval_enabled());
    }
}
