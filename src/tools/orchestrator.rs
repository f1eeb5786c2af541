//! Tool orchestrator: provider registry, shared catalog, and the
//! model/tool conversation loop
//!
//! Owns one [`ProviderConnection`] per registered provider. Each connection
//! sits behind its own async mutex, so starting, stopping, and invoking
//! against one provider are mutually exclusive while distinct providers
//! proceed fully in parallel. Catalog reads never take a connection lock —
//! they read the per-connection descriptor snapshots.

use std::collections::HashMap;
use std::sync::{Arc, RwLock as StdRwLock};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{Mutex, RwLock};

use crate::config::ToolsConfig;
use crate::llm::{AssistantReply, ChatMessage, ChatModel, ToolSpec};
use crate::{Error, Result};

use super::provider::{ProviderConnection, ToolDescriptor};
use super::registry::{ProviderRegistry, ToolProviderConfig};

/// Tool-result content used when an invocation cannot be completed; the
/// model sees this and can react instead of the turn aborting
const TOOL_FAILURE_CONTENT: &str = "Error executing tool";

/// One registered provider: exclusive connection plus a lock-free view of
/// its discovered tools
struct ProviderEntry {
    conn: Arc<Mutex<ProviderConnection>>,
    tools: Arc<StdRwLock<Vec<ToolDescriptor>>>,
}

/// Status of one provider, as reported by the admin API
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProviderStatus {
    pub key: String,
    pub name: String,
    pub enabled: bool,
    pub active: bool,
    pub tools: usize,
}

/// Process-wide orchestrator shared by all sessions
pub struct ToolOrchestrator {
    providers: RwLock<HashMap<String, ProviderEntry>>,
    max_rounds: usize,
    request_timeout: Duration,
}

impl ToolOrchestrator {
    /// Create an orchestrator with no providers
    #[must_use]
    pub fn new(config: &ToolsConfig) -> Self {
        Self {
            providers: RwLock::new(HashMap::new()),
            max_rounds: config.max_tool_rounds,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }

    /// Create an orchestrator pre-registered with every provider in the
    /// registry
    #[must_use]
    pub fn from_registry(config: &ToolsConfig, registry: &ProviderRegistry) -> Self {
        let request_timeout = Duration::from_secs(config.request_timeout_secs);
        let providers = registry
            .iter()
            .map(|(key, provider_config)| {
                (
                    key.clone(),
                    Self::entry(key.clone(), provider_config.clone(), request_timeout),
                )
            })
            .collect();
        Self {
            providers: RwLock::new(providers),
            max_rounds: config.max_tool_rounds,
            request_timeout,
        }
    }

    fn entry(key: String, config: ToolProviderConfig, timeout: Duration) -> ProviderEntry {
        let conn = ProviderConnection::new(key, config, timeout);
        let tools = conn.tools_handle();
        ProviderEntry {
            conn: Arc::new(Mutex::new(conn)),
            tools,
        }
    }

    /// Register a provider at runtime
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a provider with this key already exists.
    pub async fn register(&self, key: String, config: ToolProviderConfig) -> Result<()> {
        let mut providers = self.providers.write().await;
        if providers.contains_key(&key) {
            return Err(Error::Config(format!("provider {key} already registered")));
        }
        providers.insert(key.clone(), Self::entry(key, config, self.request_timeout));
        Ok(())
    }

    /// Administratively enable a provider
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an unknown key.
    pub async fn enable(&self, key: &str) -> Result<()> {
        self.set_enabled(key, true).await
    }

    /// Administratively disable a provider (a running process keeps running
    /// until explicitly stopped)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an unknown key.
    pub async fn disable(&self, key: &str) -> Result<()> {
        self.set_enabled(key, false).await
    }

    async fn set_enabled(&self, key: &str, enabled: bool) -> Result<()> {
        let conn = self.connection(key).await?;
        conn.lock().await.set_enabled(enabled);
        tracing::info!(provider = %key, enabled, "provider flag updated");
        Ok(())
    }

    /// Start one provider and discover its tools
    ///
    /// Returns `Ok(false)` when the provider is disabled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an unknown key and [`Error::Provider`]
    /// when launch or discovery fails.
    pub async fn start(&self, key: &str) -> Result<bool> {
        let conn = self.connection(key).await?;
        let mut conn = conn.lock().await;
        if !conn.start()? {
            return Ok(false);
        }
        if let Err(e) = conn.discover_tools().await {
            tracing::error!(provider = %key, error = %e, "tool discovery failed, stopping provider");
            conn.stop().await;
            return Err(e);
        }
        Ok(true)
    }

    /// Stop one provider
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an unknown key.
    pub async fn stop(&self, key: &str) -> Result<()> {
        let conn = self.connection(key).await?;
        conn.lock().await.stop().await;
        Ok(())
    }

    /// Start every enabled provider, continuing past individual failures
    pub async fn start_all_enabled(&self) {
        for key in self.keys().await {
            match self.start(&key).await {
                Ok(true) => {}
                Ok(false) => tracing::debug!(provider = %key, "skipped (disabled)"),
                Err(e) => tracing::error!(provider = %key, error = %e, "failed to start provider"),
            }
        }
        let catalog = self.catalog().await;
        tracing::info!(tools = catalog.len(), "provider startup complete");
    }

    /// Stop every provider
    pub async fn shutdown_all(&self) {
        for key in self.keys().await {
            if let Err(e) = self.stop(&key).await {
                tracing::warn!(provider = %key, error = %e, "failed to stop provider");
            }
        }
        tracing::info!("all providers stopped");
    }

    /// Snapshot of every discovered tool across running providers
    ///
    /// Reads per-connection snapshots without taking connection locks, so a
    /// long-running invocation on one provider never blocks catalog reads.
    pub async fn catalog(&self) -> Vec<ToolDescriptor> {
        let providers = self.providers.read().await;
        let mut descriptors = Vec::new();
        for entry in providers.values() {
            if let Ok(tools) = entry.tools.read() {
                descriptors.extend(tools.iter().cloned());
            }
        }
        descriptors
    }

    /// Status of every registered provider
    pub async fn status(&self) -> Vec<ProviderStatus> {
        let providers = self.providers.read().await;
        let mut statuses = Vec::with_capacity(providers.len());
        for (key, entry) in providers.iter() {
            let mut conn = entry.conn.lock().await;
            let tools = entry.tools.read().map(|t| t.len()).unwrap_or(0);
            statuses.push(ProviderStatus {
                key: key.clone(),
                name: conn.display_name().to_string(),
                enabled: conn.is_enabled(),
                active: conn.is_running(),
                tools,
            });
        }
        statuses.sort_by(|a, b| a.key.cmp(&b.key));
        statuses
    }

    /// Invoke a tool by qualified name
    ///
    /// Resolution is a two-level lookup: the descriptor (from the shared
    /// catalog) names its provider key and local tool name; the key selects
    /// the connection. No string-splitting happens at call time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tool`] for a name not in the catalog, and
    /// propagates [`Error::Provider`] / [`Error::Tool`] from the connection.
    pub async fn invoke(&self, qualified_name: &str, arguments: Value) -> Result<String> {
        let descriptor = self
            .catalog()
            .await
            .into_iter()
            .find(|d| d.qualified_name == qualified_name)
            .ok_or_else(|| {
                Error::Tool(format!("no provider offers tool {qualified_name}"))
            })?;

        let conn = self.connection(&descriptor.provider_key).await.map_err(|_| {
            Error::Tool(format!(
                "provider {} is not registered",
                descriptor.provider_key
            ))
        })?;

        let mut conn = conn.lock().await;
        conn.call_tool(&descriptor.name, arguments).await
    }

    /// Drive one conversation turn through the model/tool loop
    ///
    /// Repeatedly sends `messages` plus the current catalog to the model;
    /// executes any requested tool calls, appending one tool-result turn
    /// per call with the call's correlation id; and returns the model's
    /// text once it stops calling tools. A failed tool call becomes
    /// error-content for the model rather than a turn-level failure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Processing`] if the model call fails or the round
    /// cap is exceeded.
    pub async fn run_conversation_turn(
        &self,
        model: &dyn ChatModel,
        mut messages: Vec<ChatMessage>,
    ) -> Result<String> {
        let specs: Vec<ToolSpec> = self
            .catalog()
            .await
            .into_iter()
            .map(|d| ToolSpec::function(d.qualified_name, d.description, d.input_schema))
            .collect();

        for round in 0..self.max_rounds {
            let AssistantReply {
                content,
                tool_calls,
            } = model.complete(&messages, &specs).await?;

            if tool_calls.is_empty() {
                return Ok(content.unwrap_or_default());
            }

            tracing::debug!(round, calls = tool_calls.len(), "model requested tool calls");
            messages.push(ChatMessage::assistant_with_calls(content, tool_calls.clone()));

            // Calls against distinct providers run concurrently; the
            // per-connection mutex serializes calls to the same provider
            let results = futures::future::join_all(tool_calls.into_iter().map(|call| {
                let arguments: Value = serde_json::from_str(&call.function.arguments)
                    .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));
                async move {
                    let output = match self.invoke(&call.function.name, arguments).await {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::warn!(
                                tool = %call.function.name,
                                error = %e,
                                "tool invocation failed"
                            );
                            TOOL_FAILURE_CONTENT.to_string()
                        }
                    };
                    (call.id, output)
                }
            }))
            .await;

            for (call_id, output) in results {
                messages.push(ChatMessage::tool(&call_id, &output));
            }
        }

        Err(Error::Processing(format!(
            "tool-call loop exceeded {} rounds",
            self.max_rounds
        )))
    }

    async fn connection(&self, key: &str) -> Result<Arc<Mutex<ProviderConnection>>> {
        let providers = self.providers.read().await;
        providers
            .get(key)
            .map(|entry| Arc::clone(&entry.conn))
            .ok_or_else(|| Error::Config(format!("unknown provider {key}")))
    }

    async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.providers.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    /// Scripted model: pops one reply per round
    struct ScriptedModel {
        replies: StdMutex<Vec<AssistantReply>>,
        seen: StdMutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedModel {
        fn new(mut replies: Vec<AssistantReply>) -> Self {
            replies.reverse();
            Self {
                replies: StdMutex::new(replies),
                seen: StdMutex::new(Vec::new()),
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
                .ok_or_else(|| Error::Processing("script exhausted".to_string()))
        }
    }

    fn text_reply(text: &str) -> AssistantReply {
        AssistantReply {
            content: Some(text.to_string()),
            tool_calls: Vec::new(),
        }
    }

    fn call_reply(id: &str, name: &str) -> AssistantReply {
        AssistantReply {
            content: None,
            tool_calls: vec![crate::llm::ToolCallRequest::function(id, name, "{}")],
        }
    }

    #[tokio::test]
    async fn plain_reply_ends_loop_in_one_round() {
        let orchestrator = ToolOrchestrator::new(&ToolsConfig::default());
        let model = ScriptedModel::new(vec![text_reply("hello")]);

        let out = orchestrator
            .run_conversation_turn(&model, vec![ChatMessage::user("hi")])
            .await
            .unwrap();
        assert_eq!(out, "hello");
        assert_eq!(model.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unavailable_tool_continues_the_loop() {
        let orchestrator = ToolOrchestrator::new(&ToolsConfig::default());
        let model = ScriptedModel::new(vec![
            call_reply("call_1", "ghost_search"),
            text_reply("answered anyway"),
        ]);

        let out = orchestrator
            .run_conversation_turn(&model, vec![ChatMessage::user("hi")])
            .await
            .unwrap();
        assert_eq!(out, "answered anyway");

        // Second round saw the assistant turn plus the error-content tool turn
        let seen = model.seen.lock().unwrap();
        let second = &seen[1];
        assert_eq!(second.len(), 3);
        assert_eq!(second[1].role, "assistant");
        assert_eq!(second[2].role, "tool");
        assert_eq!(second[2].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(second[2].content.as_deref(), Some(TOOL_FAILURE_CONTENT));
    }

    #[tokio::test]
    async fn round_cap_is_a_reported_failure() {
        let config = ToolsConfig {
            max_tool_rounds: 2,
            ..ToolsConfig::default()
        };
        let orchestrator = ToolOrchestrator::new(&config);
        let model = ScriptedModel::new(vec![
            call_reply("c1", "x_y"),
            call_reply("c2", "x_y"),
            text_reply("never reached"),
        ]);

        let err = orchestrator
            .run_conversation_turn(&model, vec![ChatMessage::user("hi")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Processing(message) if message.contains("2 rounds")));
    }

    #[tokio::test]
    async fn invoke_unknown_tool_is_a_tool_error() {
        let orchestrator = ToolOrchestrator::new(&ToolsConfig::default());
        let err = orchestrator
            .invoke("nobody_search", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Tool(_)));
    }

    #[tokio::test]
    async fn register_rejects_duplicate_keys() {
        let orchestrator = ToolOrchestrator::new(&ToolsConfig::default());
        let config = ToolProviderConfig {
            name: "a".to_string(),
            command: "true".to_string(),
            args: Vec::new(),
            env: HashMap::new(),
            exclude_tools: Vec::new(),
            enabled: true,
        };
        orchestrator.register("a".to_string(), config.clone()).await.unwrap();
        assert!(orchestrator.register("a".to_string(), config).await.is_err());
    }
}
