//! Silence-based utterance endpointing
//!
//! Decides, from streaming audio, the moment speech has ended: a run of
//! consecutive chunks whose RMS energy stays below a configured threshold.

/// Tracks silence runs over consecutive PCM chunks
#[derive(Debug)]
pub struct SilenceDetector {
    threshold: f32,
    needed: usize,
    count: usize,
}

impl SilenceDetector {
    /// Create a detector requiring `silence_duration` seconds of silence
    ///
    /// The required run length is `ceil(silence_duration * sample_rate /
    /// chunk_size)` chunks.
    #[must_use]
    pub fn new(threshold: f32, silence_duration: f32, sample_rate: u32, chunk_size: usize) -> Self {
        #[allow(clippy::cast_precision_loss, clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let needed = ((silence_duration * sample_rate as f32) / chunk_size as f32).ceil() as usize;
        Self {
            threshold,
            needed: needed.max(1),
            count: 0,
        }
    }

    /// Whether the chunk's RMS energy is below the silence threshold
    #[must_use]
    pub fn is_silence(&self, chunk: &[u8]) -> bool {
        rms(chunk) < self.threshold
    }

    /// Observe a chunk and report whether the utterance has ended
    ///
    /// The counter increments on silence and resets to zero on any
    /// non-silent chunk; a single loud chunk fully cancels a silence run.
    pub fn check_silence_end(&mut self, chunk: &[u8]) -> bool {
        if self.is_silence(chunk) {
            self.count += 1;
        } else {
            self.count = 0;
        }
        self.count >= self.needed
    }

    /// Zero the silence counter without altering configuration
    pub fn reset(&mut self) {
        self.count = 0;
    }

    /// Consecutive silent chunks required to end an utterance
    #[must_use]
    pub const fn needed(&self) -> usize {
        self.needed
    }

    /// Current consecutive-silence count
    #[must_use]
    pub const fn count(&self) -> usize {
        self.count
    }
}

/// Root-mean-square energy of a little-endian 16-bit PCM chunk
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn rms(chunk: &[u8]) -> f32 {
    let mut sum = 0.0f64;
    let mut n = 0usize;
    for pair in chunk.chunks_exact(2) {
        let sample = f64::from(i16::from_le_bytes([pair[0], pair[1]]));
        sum += sample * sample;
        n += 1;
    }
    if n == 0 {
        return 0.0;
    }
    (sum / n as f64).sqrt() as f32
}
