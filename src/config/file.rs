//! TOML configuration file loading
//!
//! Supports `~/.config/omni/vox/config.toml` as a persistent config source.
//! All fields are optional — the file is a partial overlay on top of defaults.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct VoxConfigFile {
    /// Server/runtime configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Audio pipeline configuration
    #[serde(default)]
    pub audio: AudioFileConfig,

    /// Model/API configuration
    #[serde(default)]
    pub model: ModelFileConfig,

    /// Tool provider configuration
    #[serde(default)]
    pub tools: ToolsFileConfig,

    /// Enable document-retrieval augmentation
    #[serde(default)]
    pub use_retrieval: Option<bool>,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// Bind host
    pub host: Option<String>,

    /// API server port
    pub port: Option<u16>,
}

/// Audio pipeline configuration
#[derive(Debug, Default, Deserialize)]
pub struct AudioFileConfig {
    /// Sample rate in Hz
    pub sample_rate: Option<u32>,

    /// Transport chunk size in samples
    pub chunk_size: Option<usize>,

    /// Wake-word scorer frame size in samples
    pub frame_size: Option<usize>,

    /// Wake-word confidence threshold
    pub wake_threshold: Option<f32>,

    /// RMS silence threshold
    pub silence_threshold: Option<f32>,

    /// Silence duration in seconds ending an utterance
    pub silence_duration: Option<f32>,

    /// Gate recording behind wake-word detection
    pub require_wake_word: Option<bool>,
}

/// Model/API configuration
#[derive(Debug, Default, Deserialize)]
pub struct ModelFileConfig {
    /// API key (env `OPENAI_API_KEY` takes precedence)
    pub api_key: Option<String>,

    /// OpenAI-compatible API base URL
    pub api_base: Option<String>,

    /// Chat model identifier
    pub llm_model: Option<String>,

    /// Transcription model identifier
    pub stt_model: Option<String>,

    /// Base system prompt
    pub system_prompt: Option<String>,
}

/// Tool provider configuration
#[derive(Debug, Default, Deserialize)]
pub struct ToolsFileConfig {
    /// Enable tool providers
    pub enabled: Option<bool>,

    /// Path to the provider registry JSON file
    pub registry_path: Option<String>,

    /// Max model/tool rounds per turn
    pub max_tool_rounds: Option<usize>,

    /// Provider request timeout in seconds
    pub request_timeout_secs: Option<u64>,
}

/// Load the TOML config file from the standard path
///
/// Returns `VoxConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> VoxConfigFile {
    let Some(path) = config_file_path() else {
        return VoxConfigFile::default();
    };

    if !path.exists() {
        return VoxConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                VoxConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            VoxConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/omni/vox/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| {
        d.config_dir()
            .join("omni")
            .join("vox")
            .join("config.toml")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_overlay_parses() {
        let toml = r#"
            [audio]
            silence_threshold = 650.0
            require_wake_word = true

            [tools]
            enabled = true
            max_tool_rounds = 5
        "#;
        let fc: VoxConfigFile = toml::from_str(toml).unwrap();
        assert_eq!(fc.audio.silence_threshold, Some(650.0));
        assert_eq!(fc.audio.require_wake_word, Some(true));
        assert_eq!(fc.tools.max_tool_rounds, Some(5));
        assert!(fc.server.port.is_none());
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let fc: VoxConfigFile = toml::from_str("").unwrap();
        assert!(fc.model.llm_model.is_none());
        assert!(fc.use_retrieval.is_none());
    }
}
