//! Frame normalization for detector input
//!
//! Converts raw little-endian 16-bit PCM chunks into the fixed-size float
//! frames the detection models expect, resampling when the source rate
//! differs from the target rate. Chunks rarely divide evenly into frames, so
//! leftover samples are carried across calls.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

/// Input block size fed to the resampler
const RESAMPLER_CHUNK: usize = 1024;

/// Reframes and resamples raw PCM into fixed-size normalized frames
pub struct FrameNormalizer {
    frame_size: usize,
    resampler: Option<SincFixedIn<f32>>,
    /// Source-rate samples waiting for a full resampler block
    pending_in: Vec<f32>,
    /// Target-rate samples waiting for a full frame
    pending_out: Vec<f32>,
}

impl FrameNormalizer {
    /// Create a normalizer producing `frame_size`-sample frames at `target_rate`
    ///
    /// # Errors
    ///
    /// Returns error if the resampler cannot be constructed for the given
    /// rate pair
    pub fn new(source_rate: u32, target_rate: u32, frame_size: usize) -> crate::Result<Self> {
        let resampler = if source_rate == target_rate {
            None
        } else {
            let params = SincInterpolationParameters {
                sinc_len: 256,
                f_cutoff: 0.95,
                interpolation: SincInterpolationType::Linear,
                oversampling_factor: 256,
                window: WindowFunction::BlackmanHarris2,
            };
            let resampler = SincFixedIn::new(
                f64::from(target_rate) / f64::from(source_rate),
                2.0,
                params,
                RESAMPLER_CHUNK,
                1,
            )
            .map_err(|e| crate::Error::Audio(e.to_string()))?;
            Some(resampler)
        };

        Ok(Self {
            frame_size,
            resampler,
            pending_in: Vec::new(),
            pending_out: Vec::new(),
        })
    }

    /// Feed a raw PCM chunk, returning zero or more complete frames
    ///
    /// Empty input yields no frames; an odd trailing byte is dropped.
    pub fn push(&mut self, raw: &[u8]) -> Vec<Vec<f32>> {
        if raw.is_empty() {
            return Vec::new();
        }
        if raw.len() % 2 != 0 {
            tracing::debug!(len = raw.len(), "odd-length PCM chunk, dropping trailing byte");
        }

        let samples = raw
            .chunks_exact(2)
            .map(|pair| f32::from(i16::from_le_bytes([pair[0], pair[1]])) / 32768.0);

        match self.resampler.as_mut() {
            None => self.pending_out.extend(samples),
            Some(resampler) => {
                self.pending_in.extend(samples);
                while self.pending_in.len() >= RESAMPLER_CHUNK {
                    let block: Vec<f32> = self.pending_in.drain(..RESAMPLER_CHUNK).collect();
                    match resampler.process(&[block], None) {
                        Ok(mut out) => self.pending_out.append(&mut out[0]),
                        Err(e) => {
                            tracing::warn!(error = %e, "resampler failed, dropping block");
                        }
                    }
                }
            }
        }

        let mut frames = Vec::new();
        while self.pending_out.len() >= self.frame_size {
            frames.push(self.pending_out.drain(..self.frame_size).collect());
        }
        frames
    }

    /// Drop any carried-over partial frame so the next call starts fresh
    pub fn reset(&mut self) {
        self.pending_in.clear();
        self.pending_out.clear();
        if let Some(resampler) = self.resampler.as_mut() {
            resampler.reset();
        }
    }

    /// Number of samples currently carried over awaiting a full frame
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending_in.len() + self.pending_out.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcm_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn passthrough_framing_carries_leftovers() {
        let mut normalizer = FrameNormalizer::new(16_000, 16_000, 100).unwrap();

        // 250 samples: two full frames, 50 carried over
        let frames = normalizer.push(&pcm_bytes(&vec![100i16; 250]));
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].len(), 100);
        assert_eq!(normalizer.pending(), 50);

        // 50 more samples complete the third frame
        let frames = normalizer.push(&pcm_bytes(&vec![100i16; 50]));
        assert_eq!(frames.len(), 1);
        assert_eq!(normalizer.pending(), 0);
    }

    #[test]
    fn amplitude_scale_is_preserved() {
        let mut normalizer = FrameNormalizer::new(16_000, 16_000, 4).unwrap();
        let frames = normalizer.push(&pcm_bytes(&[i16::MAX, i16::MIN, 0, 16384]));
        assert_eq!(frames.len(), 1);
        assert!((frames[0][0] - 0.99997).abs() < 1e-4);
        assert!((frames[0][1] + 1.0).abs() < 1e-6);
        assert!(frames[0][2].abs() < 1e-6);
        assert!((frames[0][3] - 0.5).abs() < 1e-4);
    }

    #[test]
    fn malformed_input_yields_zero_frames() {
        let mut normalizer = FrameNormalizer::new(16_000, 16_000, 100).unwrap();
        assert!(normalizer.push(&[]).is_empty());
        assert!(normalizer.push(&[0x01]).is_empty());
        assert_eq!(normalizer.pending(), 0);
    }

    #[test]
    fn reset_clears_partial_frame() {
        let mut normalizer = FrameNormalizer::new(16_000, 16_000, 100).unwrap();
        normalizer.push(&pcm_bytes(&vec![1i16; 60]));
        assert_eq!(normalizer.pending(), 60);

        normalizer.reset();
        assert_eq!(normalizer.pending(), 0);

        // A fresh 100-sample chunk now produces exactly one frame
        let frames = normalizer.push(&pcm_bytes(&vec![1i16; 100]));
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn downsampling_produces_target_rate_frames() {
        let mut normalizer = FrameNormalizer::new(48_000, 16_000, 160).unwrap();

        // One second of 48 kHz audio resamples to roughly one second at
        // 16 kHz: ~100 frames of 160 samples, minus sinc edge latency.
        let samples: Vec<i16> = (0..48_000)
            .map(|i| {
                let t = i as f32 / 48_000.0;
                (0.3 * (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 32767.0) as i16
            })
            .collect();

        let frames = normalizer.push(&pcm_bytes(&samples));
        assert!(frames.len() > 90, "expected ~100 frames, got {}", frames.len());
        assert!(frames.len() <= 100);
        assert!(frames.iter().all(|f| f.len() == 160));
    }
}
