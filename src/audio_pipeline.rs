//! PCM normalization for decoded audio.
//!
//! Responsibilities:
//! - Convert Symphonia-decoded PCM into interleaved `f32`
//! - Downmix to mono
//! - Resample to the target sample rate (when needed)
//! - Emit fixed-size chunks via a callback
//!
//! `finalize()` must be called at end-of-stream to flush any remaining resampler input.

use anyhow::{Context, Result, anyhow, bail};
use rubato::{Resampler, SincFixedIn, WindowFunction};
use symphonia::core::audio::{AudioBufferRef, SampleBuffer};

/// Target mono sample rate (Hz) expected by the speech-to-text backend.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// A small stateful pipeline that converts decoded audio into mono 16 kHz `f32` chunks.
pub struct AudioPipeline {
    // Scratch buffer used to copy decoded PCM into an interleaved `Vec<f32>`.
    sample_buf_f32: Option<SampleBuffer<f32>>,

    // Lazily initialized resampler (only needed when the source sample rate != 16 kHz).
    resampler: Option<SincFixedIn<f32>>,
    src_rate: Option<u32>,

    // Accumulator for mono source samples before feeding full blocks into rubato.
    mono_src_acc: Vec<f32>,

    // Mono source frames seen so far, used to trim resampler padding at the end.
    src_frames_total: u64,
}

impl Default for AudioPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioPipeline {
    pub fn new() -> Self {
        Self {
            sample_buf_f32: None,
            resampler: None,
            src_rate: None,
            mono_src_acc: Vec::new(),
            src_frames_total: 0,
        }
    }

    /// Push a decoded Symphonia buffer through the pipeline and emit 16 kHz mono chunks.
    ///
    /// Returning `Ok(false)` from `emit` signals "stop early".
    pub fn push_decoded_and_emit(
        &mut self,
        decoded: &AudioBufferRef<'_>,
        target_chunk_frames: usize,
        mut emit: impl FnMut(&[f32]) -> Result<bool>,
    ) -> Result<()> {
        let (interleaved, src_rate, channels) =
            decoded_to_interleaved_f32(decoded, &mut self.sample_buf_f32)?;

        let mono_src = downmix_to_mono(&interleaved, channels);
        self.src_frames_total += mono_src.len() as u64;

        if src_rate == TARGET_SAMPLE_RATE {
            emit_mono_chunks(&mono_src, target_chunk_frames, &mut emit)?;
            return Ok(());
        }

        self.ensure_resampler(src_rate)?;
        self.push_and_flush_resampler(&mono_src, target_chunk_frames, &mut emit)?;
        Ok(())
    }

    /// Flush remaining buffered samples at end-of-stream.
    ///
    /// If resampling was never needed, this is a no-op.
    pub fn finalize(
        &mut self,
        target_chunk_frames: usize,
        mut emit: impl FnMut(&[f32]) -> Result<bool>,
    ) -> Result<()> {
        let Some(rs) = self.resampler.as_ref() else {
            return Ok(());
        };

        if self.mono_src_acc.is_empty() {
            return Ok(());
        }

        // rubato expects exact block sizes; pad the remainder with zeros.
        let in_max = rs.input_frames_max();
        let rem = self.mono_src_acc.len() % in_max;
        if rem != 0 {
            self.mono_src_acc
                .resize(self.mono_src_acc.len() + (in_max - rem), 0.0);
        }

        while !self.mono_src_acc.is_empty() {
            let block: Vec<f32> = self.mono_src_acc.drain(..in_max).collect();
            let out = self.resample_block(&block)?;
            emit_mono_chunks(&out, target_chunk_frames, &mut emit)?;
        }

        Ok(())
    }

    /// Number of target-rate frames the consumed source audio corresponds to.
    ///
    /// The resampler works in whole blocks, so the flushed output can run slightly past this.
    pub fn expected_output_frames(&self) -> u64 {
        match self.src_rate {
            Some(rate) if rate != TARGET_SAMPLE_RATE => {
                (self.src_frames_total as f64 * TARGET_SAMPLE_RATE as f64 / rate as f64).round()
                    as u64
            }
            _ => self.src_frames_total,
        }
    }

    fn ensure_resampler(&mut self, src_rate: u32) -> Result<()> {
        if let Some(existing) = self.src_rate {
            if existing != src_rate {
                bail!("sample rate changed mid-stream ({existing} Hz -> {src_rate} Hz)");
            }
            return Ok(());
        }

        // How many source frames we feed rubato per `process()` call.
        let in_chunk_src_frames = 2048;

        let rs = SincFixedIn::<f32>::new(
            TARGET_SAMPLE_RATE as f64 / src_rate as f64,
            2.0,
            rubato::SincInterpolationParameters {
                sinc_len: 256,
                f_cutoff: 0.95,
                interpolation: rubato::SincInterpolationType::Linear,
                oversampling_factor: 256,
                window: WindowFunction::BlackmanHarris2,
            },
            in_chunk_src_frames,
            1,
        )
        .map_err(|e| anyhow!(e))
        .context("failed to init resampler")?;

        self.resampler = Some(rs);
        self.src_rate = Some(src_rate);
        Ok(())
    }

    fn push_and_flush_resampler(
        &mut self,
        mono_src: &[f32],
        target_chunk_frames: usize,
        emit: &mut impl FnMut(&[f32]) -> Result<bool>,
    ) -> Result<()> {
        self.mono_src_acc.extend_from_slice(mono_src);

        loop {
            let in_max = self
                .resampler
                .as_ref()
                .ok_or_else(|| anyhow!("resampler not initialized"))?
                .input_frames_max();

            if self.mono_src_acc.len() < in_max {
                break;
            }

            let block: Vec<f32> = self.mono_src_acc.drain(..in_max).collect();
            let out = self.resample_block(&block)?;

            for chunk in out.chunks(target_chunk_frames) {
                if !emit(chunk)? {
                    return Ok(());
                }
            }
        }

        Ok(())
    }

    fn resample_block(&mut self, mono_src_block: &[f32]) -> Result<Vec<f32>> {
        let rs = self
            .resampler
            .as_mut()
            .ok_or_else(|| anyhow!("resampler not initialized"))?;

        let input = [mono_src_block];
        let mut out = rs
            .process(&input, None)
            .map_err(|e| anyhow!(e))
            .context("resampler process failed")?;

        if out.len() != 1 {
            bail!("expected mono output from resampler");
        }

        Ok(out.swap_remove(0))
    }
}

fn decoded_to_interleaved_f32(
    decoded: &AudioBufferRef<'_>,
    sample_buf_f32: &mut Option<SampleBuffer<f32>>,
) -> Result<(Vec<f32>, u32, usize)> {
    let spec = *decoded.spec();
    let channels = spec.channels.count();
    if channels == 0 {
        bail!("decoded audio had zero channels");
    }

    // Packets can grow (e.g. variable frame sizes), so re-allocate when the scratch buffer is
    // too small for this one.
    let needed = decoded.capacity() * channels;
    if sample_buf_f32
        .as_ref()
        .is_none_or(|buf| buf.capacity() < needed)
    {
        *sample_buf_f32 = Some(SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
    }

    let buf = sample_buf_f32
        .as_mut()
        .ok_or_else(|| anyhow!("sample buffer not initialized"))?;

    // Integer PCM is scaled by full scale here (i16 / 32768), landing in [-1.0, 1.0).
    buf.copy_interleaved_ref(decoded.clone());

    Ok((buf.samples().to_vec(), spec.rate, channels))
}

/// Downmix interleaved samples into mono by averaging channels.
fn downmix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels == 1 {
        return interleaved.to_vec();
    }

    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

fn emit_mono_chunks(
    mono_16k: &[f32],
    chunk_frames: usize,
    emit: &mut impl FnMut(&[f32]) -> Result<bool>,
) -> Result<()> {
    for chunk in mono_16k.chunks(chunk_frames) {
        if !emit(chunk)? {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalize_is_noop_without_resampler() -> anyhow::Result<()> {
        let mut pipeline = AudioPipeline::new();
        pipeline.finalize(256, |_| Ok(true))?;
        Ok(())
    }

    #[test]
    fn downmix_to_mono_single_channel_is_identity() {
        let input = vec![0.0, 1.0, -1.0];
        assert_eq!(downmix_to_mono(&input, 1), input);
    }

    #[test]
    fn downmix_to_mono_averages_channels() {
        // (L=1, R=3), (L=-1, R=1) => 2, 0
        let interleaved = vec![1.0, 3.0, -1.0, 1.0];
        assert_eq!(downmix_to_mono(&interleaved, 2), vec![2.0, 0.0]);
    }

    #[test]
    fn emit_mono_chunks_respects_early_stop() -> anyhow::Result<()> {
        let mut seen = Vec::new();
        let mono = vec![1.0; 10];
        emit_mono_chunks(&mono, 4, &mut |chunk| {
            seen.push(chunk.len());
            Ok(false)
        })?;

        assert_eq!(seen, vec![4]);
        Ok(())
    }

    #[test]
    fn resample_block_errors_when_resampler_is_missing() {
        let mut pipeline = AudioPipeline::new();
        let err = pipeline.resample_block(&[0.0; 16]).unwrap_err();
        assert!(err.to_string().contains("resampler not initialized"));
    }

    #[test]
    fn resampler_rejects_rate_changes() -> anyhow::Result<()> {
        let mut pipeline = AudioPipeline::new();
        pipeline.ensure_resampler(8_000)?;
        pipeline.ensure_resampler(8_000)?;
        assert!(pipeline.ensure_resampler(44_100).is_err());
        Ok(())
    }

    #[test]
    fn resample_path_emits_and_finalize_flushes_remainder() -> anyhow::Result<()> {
        let mut pipeline = AudioPipeline::new();
        pipeline.ensure_resampler(8_000)?;

        let in_max = pipeline
            .resampler
            .as_ref()
            .expect("resampler initialized")
            .input_frames_max();

        let mono_src = vec![0.0; (in_max * 2) + 7];
        pipeline.src_frames_total = mono_src.len() as u64;

        let mut emitted_samples = 0usize;
        pipeline.push_and_flush_resampler(&mono_src, 256, &mut |chunk| {
            emitted_samples += chunk.len();
            Ok(true)
        })?;

        assert!(pipeline.mono_src_acc.len() < in_max);

        pipeline.finalize(256, |chunk| {
            emitted_samples += chunk.len();
            Ok(true)
        })?;

        // 8 kHz -> 16 kHz doubles the frame count; padding may only add, never remove.
        assert_eq!(pipeline.expected_output_frames(), mono_src.len() as u64 * 2);
        assert!(emitted_samples as u64 >= pipeline.expected_output_frames());
        Ok(())
    }
}
