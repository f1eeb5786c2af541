//! Tool provider orchestration
//!
//! Tool providers are external subprocesses speaking a line-delimited JSON
//! request/response protocol over stdio. Each provider's discovered tools
//! are exposed to the language model under a qualified name formed by
//! prefixing the provider key, and invocations are routed back to the
//! owning subprocess.

pub mod orchestrator;
pub mod protocol;
pub mod provider;
pub mod registry;

pub use orchestrator::{ProviderStatus, ToolOrchestrator};
pub use provider::{ProviderConnection, ToolDescriptor};
pub use registry::{ProviderRegistry, ToolProviderConfig};

/// Separator between provider key and local tool name in qualified names
///
/// Provider keys containing this character are rejected at registry load,
/// so splitting a qualified name at the first separator is unambiguous.
pub const QUALIFIED_SEPARATOR: char = '_';

/// Build a globally unique tool name from a provider key and local name
#[must_use]
pub fn qualify(provider_key: &str, tool_name: &str) -> String {
    format!("{provider_key}{QUALIFIED_SEPARATOR}{tool_name}")
}

/// Split a qualified name back into `(provider_key, local_name)`
#[must_use]
pub fn split_qualified(qualified: &str) -> Option<(&str, &str)> {
    qualified.split_once(QUALIFIED_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualify_round_trips() {
        for (key, name) in [
            ("serper", "search"),
            ("providerA", "search"),
            ("k", "multi_word_tool"),
        ] {
            let qualified = qualify(key, name);
            assert_eq!(split_qualified(&qualified), Some((key, name)));
        }
    }

    #[test]
    fn split_takes_first_separator() {
        // Local names may contain the separator; keys may not
        assert_eq!(split_qualified("web_fetch_page"), Some(("web", "fetch_page")));
        assert_eq!(split_qualified("nounderscore"), None);
    }
}
