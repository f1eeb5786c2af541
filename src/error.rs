//! Error types for the vox gateway

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the gateway
///
/// The first five variants form the containment taxonomy: only `Transport`
/// ends a session; every other category is recovered at its own layer.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Chunk delivery or connection failure; fatal to the session,
    /// recoverable by letting the client reconnect
    #[error("transport error: {0}")]
    Transport(String),

    /// Inference failure inside wake-word or silence detection; recovered
    /// locally as "no detection this frame"
    #[error("detection error: {0}")]
    Detection(String),

    /// Transcription or model-response failure during an utterance;
    /// reported to the caller as a structured error event
    #[error("processing error: {0}")]
    Processing(String),

    /// Tool provider launch or communication failure; the provider is
    /// marked unavailable, other providers continue
    #[error("provider error: {0}")]
    Provider(String),

    /// A specific tool invocation failed or targeted an unknown provider;
    /// surfaced as tool-result content so the model can react
    #[error("tool error: {0}")]
    Tool(String),

    /// Audio decoding/encoding error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
