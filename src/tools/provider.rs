//! One tool provider subprocess connection
//!
//! Owns the child process, writes request lines to its stdin, and matches
//! response lines read from its stdout back to pending requests by
//! correlation id. A connection with no live process has an empty pending
//! table and an empty tool catalog.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::{Error, Result};

use super::protocol::{
    METHOD_CALL_TOOL, METHOD_LIST_TOOLS, ProviderRequest, ResponseOutcome, ToolsListResult,
    parse_response, text_content,
};
use super::registry::ToolProviderConfig;
use super::qualify;

/// A tool discovered from a provider, addressable by its qualified name
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolDescriptor {
    /// Globally unique name: provider key + separator + local name
    pub qualified_name: String,
    /// Owning provider key
    pub provider_key: String,
    /// Name the provider knows the tool by
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// JSON Schema for the tool's arguments
    pub input_schema: Value,
}

/// Pending-request completion: the protocol outcome for one correlation id
type PendingSender = oneshot::Sender<ResponseOutcome>;

/// Live subprocess state, absent while the provider is stopped
struct LiveProcess {
    child: Child,
    stdin: ChildStdin,
    pending: Arc<Mutex<HashMap<u64, PendingSender>>>,
    /// Set by the reader task when the provider's stdout closes
    exited: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    stderr_logger: Option<JoinHandle<()>>,
}

/// Connection to one external tool provider
pub struct ProviderConnection {
    key: String,
    config: ToolProviderConfig,
    next_id: AtomicU64,
    request_timeout: Duration,
    live: Option<LiveProcess>,
    /// Discovered tools, shared so the orchestrator can read the catalog
    /// without taking the connection's exclusive lock
    tools: Arc<RwLock<Vec<ToolDescriptor>>>,
}

impl ProviderConnection {
    /// Create a connection in the stopped state
    #[must_use]
    pub fn new(key: String, config: ToolProviderConfig, request_timeout: Duration) -> Self {
        Self {
            key,
            config,
            next_id: AtomicU64::new(0),
            request_timeout,
            live: None,
            tools: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Provider key
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Display name from the provider's configuration
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.config.name
    }

    /// Whether the provider is administratively enabled
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Flip the administrative enable flag
    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
    }

    /// Shared handle to this connection's discovered tools
    #[must_use]
    pub fn tools_handle(&self) -> Arc<RwLock<Vec<ToolDescriptor>>> {
        Arc::clone(&self.tools)
    }

    /// Whether a live, not-yet-exited process is attached
    ///
    /// A process that exited since the last call is reaped here, with the
    /// same catalog cleanup as an explicit [`stop`](Self::stop).
    pub fn is_running(&mut self) -> bool {
        let exited = match &self.live {
            Some(live) => live.exited.load(Ordering::SeqCst),
            None => return false,
        };
        if exited {
            self.handle_unexpected_exit();
            return false;
        }
        true
    }

    /// Launch the provider subprocess and start the response reader
    ///
    /// Returns `Ok(false)` — not an error — when the provider is
    /// administratively disabled. Starting an already-started provider is a
    /// no-op returning `Ok(true)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Provider`] if the process cannot be spawned or its
    /// pipes cannot be taken.
    pub fn start(&mut self) -> Result<bool> {
        if self.is_running() {
            return Ok(true);
        }
        if !self.config.enabled {
            tracing::warn!(provider = %self.key, "provider disabled, not starting");
            return Ok(false);
        }

        let mut child = Command::new(&self.config.command)
            .args(&self.config.args)
            .envs(&self.config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::Provider(format!("failed to launch {}: {e}", self.config.command))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Provider("provider stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Provider("provider stdout unavailable".to_string()))?;

        let pending: Arc<Mutex<HashMap<u64, PendingSender>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let exited = Arc::new(AtomicBool::new(false));

        let reader = tokio::spawn(read_responses(
            self.key.clone(),
            stdout,
            Arc::clone(&pending),
            Arc::clone(&exited),
        ));

        let stderr_logger = child.stderr.take().map(|stderr| {
            let key = self.key.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(provider = %key, "stderr: {line}");
                }
            })
        });

        self.live = Some(LiveProcess {
            child,
            stdin,
            pending,
            exited,
            reader,
            stderr_logger,
        });

        tracing::info!(provider = %self.key, name = %self.config.name, "provider started");
        Ok(true)
    }

    /// Issue one request and await its correlated response
    ///
    /// # Errors
    ///
    /// Returns [`Error::Provider`] when the process is not running, has
    /// exited, or does not answer within the configured timeout, and
    /// [`Error::Tool`] when the provider answers with an error payload.
    pub async fn request(&mut self, method: &str, params: Value) -> Result<Value> {
        if !self.is_running() {
            return Err(Error::Provider(format!(
                "provider {} is not running",
                self.key
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let line = ProviderRequest {
            id,
            method: method.to_string(),
            params,
        }
        .to_line()?;

        // Callers hold this connection exclusively, so request lines from
        // different turns never interleave on the pipe.
        let live = self
            .live
            .as_mut()
            .ok_or_else(|| Error::Provider(format!("provider {} is not running", self.key)))?;

        let (tx, rx) = oneshot::channel();
        if let Ok(mut pending) = live.pending.lock() {
            pending.insert(id, tx);
        }

        if let Err(e) = live.stdin.write_all(&line).await {
            self.remove_pending(id);
            self.handle_unexpected_exit();
            return Err(Error::Provider(format!(
                "write to provider {} failed: {e}",
                self.key
            )));
        }
        if let Err(e) = live.stdin.flush().await {
            self.remove_pending(id);
            self.handle_unexpected_exit();
            return Err(Error::Provider(format!(
                "write to provider {} failed: {e}",
                self.key
            )));
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(ResponseOutcome::Ok(result))) => Ok(result),
            Ok(Ok(ResponseOutcome::Err(message))) => Err(Error::Tool(message)),
            // Sender dropped: the reader hit EOF and failed all pending
            Ok(Err(_)) => {
                self.handle_unexpected_exit();
                Err(Error::Provider(format!("provider {} exited", self.key)))
            }
            Err(_) => {
                self.remove_pending(id);
                Err(Error::Provider(format!(
                    "provider {} request timed out after {:?}",
                    self.key, self.request_timeout
                )))
            }
        }
    }

    /// Discover this provider's tools via the capability-listing method
    ///
    /// Tools named in `exclude_tools` are dropped; the rest land in the
    /// shared catalog under their qualified names.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response has an
    /// unexpected shape.
    pub async fn discover_tools(&mut self) -> Result<Vec<ToolDescriptor>> {
        let result = self.request(METHOD_LIST_TOOLS, json!({})).await?;
        let list: ToolsListResult = serde_json::from_value(result)
            .map_err(|e| Error::Provider(format!("bad tools/list response: {e}")))?;

        let descriptors: Vec<ToolDescriptor> = list
            .tools
            .into_iter()
            .filter(|t| !self.config.exclude_tools.contains(&t.name))
            .map(|t| ToolDescriptor {
                qualified_name: qualify(&self.key, &t.name),
                provider_key: self.key.clone(),
                name: t.name,
                description: t.description.unwrap_or_default(),
                input_schema: t.input_schema.unwrap_or_else(|| json!({"type": "object"})),
            })
            .collect();

        tracing::info!(
            provider = %self.key,
            tools = descriptors.len(),
            "discovered tools"
        );

        if let Ok(mut tools) = self.tools.write() {
            *tools = descriptors.clone();
        }
        Ok(descriptors)
    }

    /// Invoke one of this provider's tools by its local name
    ///
    /// # Errors
    ///
    /// Propagates [`request`](Self::request) failures.
    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<String> {
        let result = self
            .request(METHOD_CALL_TOOL, json!({"name": name, "arguments": arguments}))
            .await?;
        Ok(text_content(&result))
    }

    /// Terminate the subprocess and purge this provider's catalog entries
    ///
    /// Calling `stop` on an already-stopped connection is a no-op.
    pub async fn stop(&mut self) {
        let Some(mut live) = self.live.take() else {
            return;
        };

        if let Err(e) = live.child.start_kill() {
            tracing::debug!(provider = %self.key, error = %e, "kill signal failed");
        }
        if let Err(e) = live.child.wait().await {
            tracing::debug!(provider = %self.key, error = %e, "wait failed");
        }
        live.reader.abort();
        if let Some(logger) = live.stderr_logger {
            logger.abort();
        }
        if let Ok(mut pending) = live.pending.lock() {
            pending.clear();
        }
        if let Ok(mut tools) = self.tools.write() {
            tools.clear();
        }

        tracing::info!(provider = %self.key, "provider stopped");
    }

    /// Clean up after a process that died on its own
    ///
    /// Identical to `stop` for catalog purposes; the child has already
    /// exited so there is nothing to signal.
    fn handle_unexpected_exit(&mut self) {
        let Some(live) = self.live.take() else {
            return;
        };
        live.reader.abort();
        if let Some(logger) = live.stderr_logger {
            logger.abort();
        }
        if let Ok(mut pending) = live.pending.lock() {
            pending.clear();
        }
        if let Ok(mut tools) = self.tools.write() {
            tools.clear();
        }
        tracing::warn!(provider = %self.key, "provider process exited unexpectedly");
    }

    /// Drop one pending entry (request failed before a response arrived)
    fn remove_pending(&mut self, id: u64) {
        if let Some(live) = &self.live {
            if let Ok(mut pending) = live.pending.lock() {
                pending.remove(&id);
            }
        }
    }
}

/// Reader task: route response lines to their pending requests
///
/// Runs until the provider's stdout closes, then flags the exit and fails
/// every still-pending request by dropping its sender.
async fn read_responses(
    key: String,
    stdout: tokio::process::ChildStdout,
    pending: Arc<Mutex<HashMap<u64, PendingSender>>>,
    exited: Arc<AtomicBool>,
) {
    let mut lines = BufReader::new(stdout).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        match parse_response(&line) {
            Ok(response) => {
                let sender = pending
                    .lock()
                    .ok()
                    .and_then(|mut p| p.remove(&response.id));
                match sender {
                    Some(tx) => {
                        let _ = tx.send(response.outcome);
                    }
                    None => {
                        tracing::warn!(
                            provider = %key,
                            id = response.id,
                            "discarding response with unknown correlation id"
                        );
                    }
                }
            }
            Err(e) => {
                tracing::warn!(provider = %key, error = %e, "discarding malformed response line");
            }
        }
    }

    exited.store(true, Ordering::SeqCst);
    if let Ok(mut p) = pending.lock() {
        p.clear();
    }
    tracing::debug!(provider = %key, "provider stdout closed");
}
