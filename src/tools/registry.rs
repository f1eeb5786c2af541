//! Tool provider registry
//!
//! Providers are declared in a JSON file keyed by provider key. String
//! values may reference environment variables as `${VAR}`; placeholders are
//! resolved at load time, with unresolved variables replaced by the empty
//! string rather than failing the load.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

use super::QUALIFIED_SEPARATOR;

/// Configuration for one tool provider subprocess
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolProviderConfig {
    /// Human-readable display name
    pub name: String,
    /// Executable to launch
    pub command: String,
    /// Launch arguments
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment passed to the subprocess
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Tool names to drop from this provider's discovery response
    #[serde(default)]
    pub exclude_tools: Vec<String>,
    /// Administratively enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

const fn default_enabled() -> bool {
    true
}

/// Keyed collection of provider configurations
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, ToolProviderConfig>,
}

impl ProviderRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a registry from a JSON file
    ///
    /// # Errors
    ///
    /// Returns error if the file can't be read or parsed, or if a provider
    /// key contains the qualified-name separator.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut raw: Value = serde_json::from_str(&content)?;
        resolve_env_placeholders(&mut raw);

        let providers: HashMap<String, ToolProviderConfig> = serde_json::from_value(raw)?;

        let mut registry = Self::new();
        for (key, config) in providers {
            registry.insert(key, config)?;
        }

        tracing::info!(
            path = %path.display(),
            providers = registry.providers.len(),
            "loaded provider registry"
        );
        Ok(registry)
    }

    /// Add a provider, validating its key
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the key is empty or contains the
    /// qualified-name separator — such keys would make qualified tool names
    /// ambiguous.
    pub fn insert(&mut self, key: String, config: ToolProviderConfig) -> Result<()> {
        if key.is_empty() {
            return Err(Error::Config("provider key must not be empty".to_string()));
        }
        if key.contains(QUALIFIED_SEPARATOR) {
            return Err(Error::Config(format!(
                "provider key {key:?} must not contain {QUALIFIED_SEPARATOR:?}"
            )));
        }
        self.providers.insert(key, config);
        Ok(())
    }

    /// Get a provider's configuration
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ToolProviderConfig> {
        self.providers.get(key)
    }

    /// Iterate all providers
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ToolProviderConfig)> {
        self.providers.iter()
    }

    /// Number of registered providers
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// Replace `${VAR}` placeholders in every string value, recursively
///
/// Unresolved variables fail open to the empty string.
fn resolve_env_placeholders(value: &mut Value) {
    match value {
        Value::String(s) => *s = expand(s),
        Value::Array(items) => items.iter_mut().for_each(resolve_env_placeholders),
        Value::Object(map) => map.values_mut().for_each(resolve_env_placeholders),
        _ => {}
    }
}

/// Expand `${VAR}` occurrences in one string
fn expand(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let var = &after[..end];
                match std::env::var(var) {
                    Ok(v) => out.push_str(&v),
                    Err(_) => {
                        tracing::warn!(var, "unresolved environment placeholder, using empty string");
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                // Unterminated placeholder: keep the literal text
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
