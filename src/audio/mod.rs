//! Real-time audio processing
//!
//! Turns a raw PCM chunk stream into discrete utterances: frame
//! normalization, wake-word detection, silence endpointing, and the
//! per-connection session state machine that composes them.

mod endpoint;
mod frame;
mod session;
mod wake;

pub use endpoint::SilenceDetector;
pub use frame::FrameNormalizer;
pub use session::{AudioSession, SessionEvent, SessionState, UtterancePipeline};
pub use wake::{DetectionResult, EnergyScorer, FrameScorer, WakeWordDetector};

use crate::{Error, Result};

/// Assemble buffered raw PCM chunks into a mono 16-bit WAV container
///
/// Chunks are little-endian signed 16-bit samples at `sample_rate`; any odd
/// trailing byte in a chunk is ignored.
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn chunks_to_wav(chunks: &[Vec<u8>], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for chunk in chunks {
            for pair in chunk.chunks_exact(2) {
                let sample = i16::from_le_bytes([pair[0], pair[1]]);
                writer
                    .write_sample(sample)
                    .map_err(|e| Error::Audio(e.to_string()))?;
            }
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
