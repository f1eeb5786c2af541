//! Conversation context assembly
//!
//! Merges retrieved reference material and the conversation history into
//! the message list sent to the model. Retrieval itself is a collaborator
//! behind [`ContextProvider`]; the bundled file-backed implementation does
//! simple token-overlap ranking and exists so the gateway runs end-to-end
//! without an external document store.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::llm::ChatMessage;
use crate::Result;

/// Maximum retrieved chunks merged into one request
const MAX_CONTEXT_CHUNKS: usize = 3;

/// Document retrieval collaborator
#[async_trait]
pub trait ContextProvider: Send + Sync {
    /// Return ranked text chunks relevant to the query, best first
    async fn search(&self, query: &str) -> Result<Vec<String>>;

    /// Re-read the underlying document source
    async fn reload(&self) -> Result<()> {
        Ok(())
    }
}

/// Ordered role-tagged conversation turns
///
/// Reset only by the explicit reset operation, never implicitly.
#[derive(Debug, Default)]
pub struct ConversationHistory {
    turns: Vec<ChatMessage>,
}

impl ConversationHistory {
    /// Create an empty history
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a user turn
    pub fn push_user(&mut self, content: &str) {
        self.turns.push(ChatMessage::user(content));
    }

    /// Append an assistant turn
    pub fn push_assistant(&mut self, content: &str) {
        self.turns.push(ChatMessage::assistant(content));
    }

    /// All turns in order
    #[must_use]
    pub fn turns(&self) -> &[ChatMessage] {
        &self.turns
    }

    /// Number of turns
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the history is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Drop every turn
    pub fn reset(&mut self) {
        self.turns.clear();
        tracing::info!("conversation history reset");
    }
}

/// Builds the outbound message list for one conversation turn
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    base_prompt: String,
}

impl ContextAssembler {
    /// Create an assembler over the configured base system prompt
    #[must_use]
    pub fn new(base_prompt: String) -> Self {
        Self { base_prompt }
    }

    /// Merge retrieved chunks and history into a full message list
    ///
    /// The system turn carries the base prompt plus any reference material;
    /// history follows in order. The caller appends the current user turn
    /// to the history before assembling.
    #[must_use]
    pub fn assemble(&self, retrieved: &[String], history: &[ChatMessage]) -> Vec<ChatMessage> {
        let mut system = self.base_prompt.clone();
        if !retrieved.is_empty() {
            system.push_str("\n\nUse the following reference material when answering:");
            for chunk in retrieved.iter().take(MAX_CONTEXT_CHUNKS) {
                system.push_str("\n\n");
                system.push_str(chunk);
            }
        }

        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage::system(&system));
        messages.extend(history.iter().cloned());
        messages
    }
}

/// File-backed context provider
///
/// Loads every `.txt` and `.md` file under a directory, splits on blank
/// lines into chunks, and ranks chunks by token overlap with the query.
pub struct FileContextProvider {
    dir: PathBuf,
    chunks: RwLock<Vec<String>>,
}

impl FileContextProvider {
    /// Create a provider over a document directory
    ///
    /// Documents load on the first [`reload`](ContextProvider::reload).
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            chunks: RwLock::new(Vec::new()),
        }
    }

    fn load(&self) -> Result<Vec<String>> {
        let mut chunks = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_text = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e == "txt" || e == "md");
            if !is_text {
                continue;
            }
            let content = std::fs::read_to_string(&path)?;
            chunks.extend(
                content
                    .split("\n\n")
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(ToString::to_string),
            );
        }
        tracing::info!(dir = %self.dir.display(), chunks = chunks.len(), "knowledge loaded");
        Ok(chunks)
    }
}

#[async_trait]
impl ContextProvider for FileContextProvider {
    async fn search(&self, query: &str) -> Result<Vec<String>> {
        let query_lower = query.to_lowercase();
        let tokens: Vec<&str> = query_lower
            .split_whitespace()
            .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|t| t.len() > 2)
            .collect();

        let chunks = self.chunks.read().await;
        let mut scored: Vec<(usize, &String)> = chunks
            .iter()
            .filter_map(|chunk| {
                let chunk_lower = chunk.to_lowercase();
                let score = tokens.iter().filter(|t| chunk_lower.contains(**t)).count();
                (score > 0).then_some((score, chunk))
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(MAX_CONTEXT_CHUNKS)
            .map(|(_, chunk)| chunk.clone())
            .collect())
    }

    async fn reload(&self) -> Result<()> {
        let loaded = self.load()?;
        *self.chunks.write().await = loaded;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_reset_is_explicit() {
        let mut history = ConversationHistory::new();
        history.push_user("hi");
        history.push_assistant("hello");
        assert_eq!(history.len(), 2);

        history.reset();
        assert!(history.is_empty());
    }

    #[test]
    fn assemble_puts_reference_material_in_system_turn() {
        let assembler = ContextAssembler::new("Base prompt.".to_string());
        let mut history = ConversationHistory::new();
        history.push_user("what are the fees?");

        let messages = assembler.assemble(
            &["Fees are 100 per term.".to_string()],
            history.turns(),
        );

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        let system = messages[0].content.as_deref().unwrap();
        assert!(system.starts_with("Base prompt."));
        assert!(system.contains("Fees are 100 per term."));
        assert_eq!(messages[1].role, "user");
    }

    #[test]
    fn assemble_without_retrieval_keeps_base_prompt_only() {
        let assembler = ContextAssembler::new("Base prompt.".to_string());
        let messages = assembler.assemble(&[], &[]);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content.as_deref(), Some("Base prompt."));
    }

    #[tokio::test]
    async fn file_provider_ranks_by_overlap() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("docs.md"),
            "Enrollment opens in March each year.\n\nThe robotics program runs two years.\n\nCafeteria hours are 8 to 5.",
        )
        .unwrap();

        let provider = FileContextProvider::new(dir.path().to_path_buf());
        provider.reload().await.unwrap();

        let results = provider.search("when does enrollment open").await.unwrap();
        assert!(!results.is_empty());
        assert!(results[0].contains("Enrollment opens"));

        let none = provider.search("zzz qqq").await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn reload_picks_up_new_documents() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FileContextProvider::new(dir.path().to_path_buf());
        provider.reload().await.unwrap();
        assert!(provider.search("grading").await.unwrap().is_empty());

        std::fs::write(dir.path().join("new.txt"), "Grading uses a 20-point scale.").unwrap();
        provider.reload().await.unwrap();
        let results = provider.search("grading scale").await.unwrap();
        assert_eq!(results.len(), 1);
    }
}
