//! Configuration management for the vox gateway

pub mod file;

use std::path::PathBuf;

use serde::Serialize;

use crate::Result;

/// Default audio sample rate (Hz) for inbound PCM and assembled utterances
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;

/// Default chunk size in samples used by the silence-endpoint arithmetic
pub const DEFAULT_CHUNK_SIZE: usize = 1280;

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Host the API server binds to
    pub host: String,

    /// Port the API server binds to
    pub port: u16,

    /// Audio pipeline configuration
    pub audio: AudioConfig,

    /// Language model / transcription configuration
    pub model: ModelConfig,

    /// Tool provider configuration
    pub tools: ToolsConfig,

    /// Enable document-retrieval augmentation
    pub use_retrieval: bool,
}

/// Audio pipeline configuration
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Sample rate for inbound PCM and assembled utterances (Hz)
    pub sample_rate: u32,

    /// Chunk size in samples expected from the streaming transport
    pub chunk_size: usize,

    /// Fixed frame size in samples fed to the wake-word scorer
    pub frame_size: usize,

    /// Wake-word confidence threshold in [0, 1]
    pub wake_threshold: f32,

    /// RMS energy threshold below which a chunk counts as silence
    pub silence_threshold: f32,

    /// Seconds of continuous silence that end an utterance
    pub silence_duration: f32,

    /// Require a wake word before recording; when false, sessions start
    /// recording immediately and re-enter recording after each utterance
    pub require_wake_word: bool,
}

/// Language model and transcription configuration
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// API key for the inference service
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API
    pub api_base: String,

    /// Chat model identifier
    pub llm_model: String,

    /// Transcription model identifier
    pub stt_model: String,

    /// Base system prompt sent with every conversation turn
    pub system_prompt: String,
}

/// Tool provider configuration
#[derive(Debug, Clone)]
pub struct ToolsConfig {
    /// Enable tool providers
    pub enabled: bool,

    /// Path to the provider registry JSON file
    pub registry_path: Option<PathBuf>,

    /// Maximum model/tool rounds per conversation turn
    pub max_tool_rounds: usize,

    /// Per-request timeout for provider subprocess calls (seconds)
    pub request_timeout_secs: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            frame_size: DEFAULT_CHUNK_SIZE,
            wake_threshold: 0.5,
            silence_threshold: 500.0,
            silence_duration: 1.5,
            require_wake_word: false,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: "https://api.openai.com/v1".to_string(),
            llm_model: "gpt-4o-mini".to_string(),
            stt_model: "whisper-1".to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            registry_path: None,
            max_tool_rounds: 8,
            request_timeout_secs: 30,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            audio: AudioConfig::default(),
            model: ModelConfig::default(),
            tools: ToolsConfig::default(),
            use_retrieval: false,
        }
    }
}

/// Default assistant system prompt; overridable via config file or env
const DEFAULT_SYSTEM_PROMPT: &str = "You are a warm, helpful voice assistant. \
Answer clearly and concisely. When retrieved reference material is provided, \
prefer it over general knowledge. If you lack specific information, say so.";

impl Config {
    /// Load configuration with layering: defaults < TOML file < environment
    ///
    /// # Errors
    ///
    /// Returns an error if an environment override fails to parse.
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        let mut config = Self::default();

        if let Some(host) = fc.server.host {
            config.host = host;
        }
        if let Some(port) = fc.server.port {
            config.port = port;
        }
        if let Some(v) = env_parse::<u16>("VOX_PORT")? {
            config.port = v;
        }

        config.audio = AudioConfig {
            sample_rate: fc.audio.sample_rate.unwrap_or(config.audio.sample_rate),
            chunk_size: fc.audio.chunk_size.unwrap_or(config.audio.chunk_size),
            frame_size: fc.audio.frame_size.unwrap_or(config.audio.frame_size),
            wake_threshold: env_parse::<f32>("VOX_WAKE_THRESHOLD")?
                .or(fc.audio.wake_threshold)
                .unwrap_or(config.audio.wake_threshold),
            silence_threshold: env_parse::<f32>("VOX_SILENCE_THRESHOLD")?
                .or(fc.audio.silence_threshold)
                .unwrap_or(config.audio.silence_threshold),
            silence_duration: env_parse::<f32>("VOX_SILENCE_DURATION")?
                .or(fc.audio.silence_duration)
                .unwrap_or(config.audio.silence_duration),
            require_wake_word: fc
                .audio
                .require_wake_word
                .unwrap_or(config.audio.require_wake_word),
        };

        config.model = ModelConfig {
            api_key: std::env::var("OPENAI_API_KEY").ok().or(fc.model.api_key),
            api_base: std::env::var("VOX_API_BASE")
                .ok()
                .or(fc.model.api_base)
                .unwrap_or(config.model.api_base),
            llm_model: std::env::var("VOX_LLM_MODEL")
                .ok()
                .or(fc.model.llm_model)
                .unwrap_or(config.model.llm_model),
            stt_model: std::env::var("VOX_STT_MODEL")
                .ok()
                .or(fc.model.stt_model)
                .unwrap_or(config.model.stt_model),
            system_prompt: fc.model.system_prompt.unwrap_or(config.model.system_prompt),
        };

        config.tools = ToolsConfig {
            enabled: env_parse::<bool>("VOX_USE_TOOLS")?
                .or(fc.tools.enabled)
                .unwrap_or(config.tools.enabled),
            registry_path: std::env::var("VOX_PROVIDERS_FILE")
                .ok()
                .map(PathBuf::from)
                .or(fc.tools.registry_path.map(PathBuf::from)),
            max_tool_rounds: fc
                .tools
                .max_tool_rounds
                .unwrap_or(config.tools.max_tool_rounds),
            request_timeout_secs: fc
                .tools
                .request_timeout_secs
                .unwrap_or(config.tools.request_timeout_secs),
        };

        config.use_retrieval = env_parse::<bool>("VOX_USE_RETRIEVAL")?
            .or(fc.use_retrieval)
            .unwrap_or(config.use_retrieval);

        Ok(config)
    }

    /// Effective configuration reported by the admin API
    ///
    /// Secrets are omitted; this is safe to serialize to clients.
    #[must_use]
    pub fn summary(&self) -> ConfigSummary {
        ConfigSummary {
            llm_model: self.model.llm_model.clone(),
            stt_model: self.model.stt_model.clone(),
            sample_rate: self.audio.sample_rate,
            wake_threshold: self.audio.wake_threshold,
            silence_threshold: self.audio.silence_threshold,
            silence_duration: self.audio.silence_duration,
            require_wake_word: self.audio.require_wake_word,
            retrieval_enabled: self.use_retrieval,
            tools_enabled: self.tools.enabled,
            max_tool_rounds: self.tools.max_tool_rounds,
        }
    }
}

/// Serializable view of the effective configuration
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub llm_model: String,
    pub stt_model: String,
    pub sample_rate: u32,
    pub wake_threshold: f32,
    pub silence_threshold: f32,
    pub silence_duration: f32,
    pub require_wake_word: bool,
    pub retrieval_enabled: bool,
    pub tools_enabled: bool,
    pub max_tool_rounds: usize,
}

/// Parse an environment variable, treating an unset variable as `None`
fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw.parse::<T>().map(Some).map_err(|_| {
            crate::Error::Config(format!("invalid value for {name}: {raw:?}"))
        }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_streaming_transport() {
        let config = Config::default();
        assert_eq!(config.audio.sample_rate, 16_000);
        assert_eq!(config.audio.chunk_size, 1280);
        assert_eq!(config.tools.max_tool_rounds, 8);
        assert!(!config.audio.require_wake_word);
    }

    #[test]
    fn summary_omits_secrets() {
        let mut config = Config::default();
        config.model.api_key = Some("sk-secret".to_string());
        let json = serde_json::to_string(&config.summary()).unwrap();
        assert!(!json.contains("sk-secret"));
        assert!(json.contains("\"llm_model\":\"gpt-4o-mini\""));
    }
}
