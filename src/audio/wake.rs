//! Wake word detection
//!
//! The neural scoring model is an external concern; this module treats it as
//! an opaque [`FrameScorer`] over a fixed-size frame and layers temporal
//! smoothing and thresholding on top. A scorer failure is recovered as "no
//! detection this frame" — wake-word misses are recoverable, crashes on a
//! long-lived stream are not.

use std::collections::VecDeque;

use crate::Result;

/// Frames averaged for temporal smoothing
const SMOOTHING_FRAMES: usize = 4;

/// Per-frame detection outcome
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionResult {
    /// Whether the smoothed confidence cleared the threshold
    pub detected: bool,
    /// Smoothed confidence in [0, 1]
    pub confidence: f32,
}

/// Opaque per-frame wake-word scoring function
///
/// Implementations may keep internal temporal state; `reset` must clear it
/// so a new call sequence behaves as if freshly constructed.
pub trait FrameScorer: Send {
    /// Score one fixed-size normalized frame, returning confidence in [0, 1]
    ///
    /// # Errors
    ///
    /// Returns error if inference fails
    fn score(&mut self, frame: &[f32]) -> Result<f32>;

    /// Clear any internal temporal state
    fn reset(&mut self) {}
}

/// Energy-based scorer used when no neural model is configured
///
/// Maps smoothed frame RMS energy onto [0, 1]. Not a real keyword spotter,
/// but exercises the full detection path and is deterministic in tests.
#[derive(Debug, Default)]
pub struct EnergyScorer {
    smoothed: f32,
}

/// RMS at or above this maps to full confidence
const ENERGY_FULL_SCALE: f32 = 0.15;

impl FrameScorer for EnergyScorer {
    fn score(&mut self, frame: &[f32]) -> Result<f32> {
        if frame.is_empty() {
            return Ok(0.0);
        }
        #[allow(clippy::cast_precision_loss)]
        let energy = (frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32).sqrt();
        // Exponential smoothing keeps one-frame spikes from scoring high
        self.smoothed = 0.6f32.mul_add(self.smoothed, 0.4 * energy);
        Ok((self.smoothed / ENERGY_FULL_SCALE).min(1.0))
    }

    fn reset(&mut self) {
        self.smoothed = 0.0;
    }
}

/// Streaming wake-word detector with temporal smoothing
pub struct WakeWordDetector {
    scorer: Box<dyn FrameScorer>,
    threshold: f32,
    recent: VecDeque<f32>,
}

impl WakeWordDetector {
    /// Create a detector over the given scorer
    ///
    /// `threshold` is the configured confidence cutoff:
    /// `detected = confidence >= threshold`.
    #[must_use]
    pub fn new(scorer: Box<dyn FrameScorer>, threshold: f32) -> Self {
        Self {
            scorer,
            threshold,
            recent: VecDeque::with_capacity(SMOOTHING_FRAMES),
        }
    }

    /// Score one frame and report the smoothed detection result
    ///
    /// An inference failure is logged and reported as a negative result with
    /// confidence 0, never propagated.
    pub fn detect(&mut self, frame: &[f32]) -> DetectionResult {
        let score = match self.scorer.score(frame) {
            Ok(score) => score.clamp(0.0, 1.0),
            Err(e) => {
                tracing::warn!(error = %e, "wake-word inference failed, treating as no detection");
                return DetectionResult {
                    detected: false,
                    confidence: 0.0,
                };
            }
        };

        if self.recent.len() == SMOOTHING_FRAMES {
            self.recent.pop_front();
        }
        self.recent.push_back(score);

        #[allow(clippy::cast_precision_loss)]
        let confidence = self.recent.iter().sum::<f32>() / self.recent.len() as f32;
        DetectionResult {
            detected: confidence >= self.threshold,
            confidence,
        }
    }

    /// Fully clear temporal state so the next frame behaves as if fresh
    pub fn reset(&mut self) {
        self.recent.clear();
        self.scorer.reset();
    }

    /// Configured detection threshold
    #[must_use]
    pub const fn threshold(&self) -> f32 {
        self.threshold
    }
}
