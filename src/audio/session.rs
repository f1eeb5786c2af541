//! Per-connection audio session state machine
//!
//! Composes the frame normalizer, wake-word detector, and silence
//! endpointer to turn the inbound chunk stream into discrete utterances,
//! handing each completed utterance to the [`UtterancePipeline`]
//! collaborator and emitting status events for the client.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::config::AudioConfig;
use crate::{Error, Result};

use super::{FrameNormalizer, SilenceDetector, WakeWordDetector, chunks_to_wav};

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Discarding chunks until a wake word is detected
    WaitingForTrigger,
    /// Buffering chunks until the endpointer reports silence
    Recording,
    /// Transcribing and answering the buffered utterance
    Processing,
}

/// Status events emitted to the client over the session transport
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Connection accepted, session ready for audio
    Ready,
    /// Wake word detected, now recording
    WakeWordDetected { confidence: f32 },
    /// Recording started
    Listening,
    /// Utterance transcribed
    Transcribed { text: String },
    /// Assistant response ready
    Response { text: String },
    /// Processing failed; the session stays usable
    Error { message: String },
}

/// Transcription and response collaborator for completed utterances
#[async_trait]
pub trait UtterancePipeline: Send + Sync {
    /// Transcribe a WAV-contained utterance to text
    async fn transcribe(&self, wav: Vec<u8>) -> Result<String>;

    /// Produce the assistant response for a transcribed utterance
    async fn respond(&self, text: &str) -> Result<String>;
}

/// State machine for one live audio connection
pub struct AudioSession {
    id: Uuid,
    state: SessionState,
    closed: bool,
    require_wake_word: bool,
    sample_rate: u32,
    buffer: Vec<Vec<u8>>,
    normalizer: FrameNormalizer,
    wake: WakeWordDetector,
    endpoint: SilenceDetector,
    pipeline: Arc<dyn UtterancePipeline>,
}

impl AudioSession {
    /// Create a session for a new connection
    ///
    /// With `require_wake_word` unset the session starts directly in
    /// [`SessionState::Recording`] and re-enters it after each utterance.
    ///
    /// # Errors
    ///
    /// Returns error if the frame normalizer cannot be constructed
    pub fn new(
        config: &AudioConfig,
        wake: WakeWordDetector,
        pipeline: Arc<dyn UtterancePipeline>,
    ) -> Result<Self> {
        Self::with_source_rate(config, config.sample_rate, wake, pipeline)
    }

    /// Create a session whose transport delivers PCM at `source_rate`
    ///
    /// Detection frames are resampled to the configured rate; the assembled
    /// utterance keeps the source rate, and the silence-run arithmetic is
    /// scaled to it.
    ///
    /// # Errors
    ///
    /// Returns error if the frame normalizer cannot be constructed
    pub fn with_source_rate(
        config: &AudioConfig,
        source_rate: u32,
        wake: WakeWordDetector,
        pipeline: Arc<dyn UtterancePipeline>,
    ) -> Result<Self> {
        let state = if config.require_wake_word {
            SessionState::WaitingForTrigger
        } else {
            SessionState::Recording
        };

        Ok(Self {
            id: Uuid::new_v4(),
            state,
            closed: false,
            require_wake_word: config.require_wake_word,
            sample_rate: source_rate,
            buffer: Vec::new(),
            normalizer: FrameNormalizer::new(source_rate, config.sample_rate, config.frame_size)?,
            wake,
            endpoint: SilenceDetector::new(
                config.silence_threshold,
                config.silence_duration,
                source_rate,
                config.chunk_size,
            ),
            pipeline,
        })
    }

    /// Session identifier
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Number of chunks currently buffered
    #[must_use]
    pub fn buffered_chunks(&self) -> usize {
        self.buffer.len()
    }

    /// React to one inbound PCM chunk
    ///
    /// Logically sequential within the session: the caller must not deliver
    /// the next chunk until this call returns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the session was already closed.
    pub async fn handle_chunk(&mut self, chunk: &[u8]) -> Result<Vec<SessionEvent>> {
        if self.closed {
            return Err(Error::Transport("session closed".to_string()));
        }

        match self.state {
            SessionState::WaitingForTrigger => Ok(self.observe_for_wake(chunk)),
            SessionState::Recording => {
                self.buffer.push(chunk.to_vec());
                if self.endpoint.check_silence_end(chunk) {
                    Ok(self.process_utterance().await)
                } else {
                    Ok(Vec::new())
                }
            }
            // Processing is synchronous inside process_utterance; a chunk
            // can't arrive in this state from a well-ordered transport.
            SessionState::Processing => Ok(Vec::new()),
        }
    }

    /// Terminate the session: release buffers, no further transitions
    pub fn close(&mut self) {
        self.closed = true;
        self.buffer.clear();
        self.normalizer.reset();
        tracing::debug!(session_id = %self.id, "session closed");
    }

    /// Whether the session has been closed
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Feed a trigger-phase chunk to the wake-word detector
    ///
    /// The chunk itself is discarded — buffering starts only after the
    /// trigger.
    fn observe_for_wake(&mut self, chunk: &[u8]) -> Vec<SessionEvent> {
        for frame in self.normalizer.push(chunk) {
            let result = self.wake.detect(&frame);
            if result.detected {
                tracing::info!(
                    session_id = %self.id,
                    confidence = result.confidence,
                    "wake word detected"
                );
                self.buffer.clear();
                self.endpoint.reset();
                self.normalizer.reset();
                self.wake.reset();
                self.state = SessionState::Recording;
                return vec![
                    SessionEvent::WakeWordDetected {
                        confidence: result.confidence,
                    },
                    SessionEvent::Listening,
                ];
            }
        }
        Vec::new()
    }

    /// Assemble, transcribe, and answer the buffered utterance
    ///
    /// A failure anywhere in the pipeline is reported as a structured error
    /// event; the machine always returns to its pre-utterance idle state.
    async fn process_utterance(&mut self) -> Vec<SessionEvent> {
        self.state = SessionState::Processing;
        tracing::info!(
            session_id = %self.id,
            chunks = self.buffer.len(),
            "silence detected, processing utterance"
        );

        let mut events = Vec::new();
        match chunks_to_wav(&self.buffer, self.sample_rate) {
            Ok(wav) => match self.pipeline.transcribe(wav).await {
                Ok(text) => {
                    events.push(SessionEvent::Transcribed { text: text.clone() });
                    match self.pipeline.respond(&text).await {
                        Ok(response) => events.push(SessionEvent::Response { text: response }),
                        Err(e) => {
                            tracing::error!(session_id = %self.id, error = %e, "response failed");
                            events.push(SessionEvent::Error {
                                message: e.to_string(),
                            });
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(session_id = %self.id, error = %e, "transcription failed");
                    events.push(SessionEvent::Error {
                        message: e.to_string(),
                    });
                }
            },
            Err(e) => {
                tracing::error!(session_id = %self.id, error = %e, "utterance assembly failed");
                events.push(SessionEvent::Error {
                    message: e.to_string(),
                });
            }
        }

        self.buffer.clear();
        self.endpoint.reset();
        self.normalizer.reset();
        self.wake.reset();
        self.state = if self.require_wake_word {
            SessionState::WaitingForTrigger
        } else {
            SessionState::Recording
        };

        events
    }
}
