use crate::audio_pipeline::TARGET_SAMPLE_RATE;

/// Mono `f32` audio at 16 kHz, amplitude in roughly `[-1.0, 1.0]`.
///
/// A waveform is produced by the normalizer for a single transcription call and dropped after
/// it; nothing holds onto it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Waveform {
    samples: Vec<f32>,
}

impl Waveform {
    pub fn new(samples: Vec<f32>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration implied by the sample count at the target rate.
    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / TARGET_SAMPLE_RATE as f64
    }

    /// Scale signed 16-bit PCM into `[-1.0, 1.0)` by dividing by full scale (32768).
    pub fn from_pcm_i16(pcm: &[i16]) -> Self {
        Self::new(pcm.iter().map(|s| *s as f32 / 32768.0).collect())
    }
}
