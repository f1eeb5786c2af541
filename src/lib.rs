//! Vox Gateway - Voice assistant backend
//!
//! Turns a live audio stream into answered utterances:
//! - Real-time audio sessions (wake word detection, silence endpointing,
//!   utterance buffering)
//! - Speech-to-text and chat completion via OpenAI-compatible APIs
//! - Tool providers: external subprocesses whose capabilities the model
//!   can call mid-conversation
//! - Optional retrieval augmentation from a document collaborator
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                     Transports                       │
//! │   WebSocket stream  │  audio upload  │  text chat    │
//! └──────────────────────────┬───────────────────────────┘
//!                            │
//! ┌──────────────────────────▼───────────────────────────┐
//! │                     Vox Gateway                      │
//! │  Audio sessions │ Assistant │ Tool orchestrator      │
//! └──────────────────────────┬───────────────────────────┘
//!                            │
//! ┌──────────────────────────▼───────────────────────────┐
//! │              External collaborators                  │
//! │  STT API │ Chat API │ tool subprocesses │ documents  │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod assistant;
pub mod audio;
pub mod config;
pub mod context;
pub mod error;
pub mod llm;
pub mod stt;
pub mod tools;

pub use assistant::Assistant;
pub use audio::{
    AudioSession, DetectionResult, EnergyScorer, FrameNormalizer, FrameScorer, SessionEvent,
    SessionState, SilenceDetector, UtterancePipeline, WakeWordDetector,
};
pub use config::Config;
pub use context::{ContextAssembler, ContextProvider, ConversationHistory, FileContextProvider};
pub use error::{Error, Result};
pub use llm::{ChatMessage, ChatModel, OpenAiChat};
pub use stt::{SpeechToText, Transcriber};
pub use tools::{
    ProviderConnection, ProviderRegistry, ProviderStatus, ToolDescriptor, ToolOrchestrator,
    ToolProviderConfig,
};
