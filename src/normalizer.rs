//! Decode media (audio clips or audio-bearing video) into a [`Waveform`].
//!
//! This module is orchestration only:
//! - `demux` handles probing + packet iteration
//! - `decode` handles codec decoding
//! - `audio_pipeline` handles downmix + resample
//!
//! Every failure is reported as [`Error::Decode`]; an undecodable payload is never replaced by
//! silence.
//!
//! Symphonia has no Opus decoder, so with the `video` feature enabled any payload it rejects is
//! retried through libav before giving up.

use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use symphonia::core::io::MediaSource;
use tracing::debug;

use crate::audio_pipeline::AudioPipeline;
use crate::decode::{PacketOutcome, decode_packet_and_then, make_decoder_for_track};
use crate::demux::{next_packet, probe_audio_track};
use crate::error::{Error, Result};
use crate::waveform::Waveform;

// Chunk size handed to the pipeline callback. The normalizer collects everything, so this only
// bounds the size of each copy.
const COLLECT_CHUNK_FRAMES: usize = 16_000;

/// Decode an in-memory payload (e.g. one streamed chunk).
///
/// `hint_extension` names the container when the caller knows it (browsers send `"webm"`).
pub fn normalize_bytes(bytes: Vec<u8>, hint_extension: Option<&str>) -> Result<Waveform> {
    if bytes.is_empty() {
        return Err(Error::Decode("audio payload was empty".to_owned()));
    }

    let bytes: Arc<[u8]> = bytes.into();
    match normalize_source(Box::new(Cursor::new(Arc::clone(&bytes))), hint_extension) {
        Ok(waveform) => Ok(waveform),
        #[cfg(feature = "video")]
        Err(err) => fallback::bytes(&bytes, hint_extension)
            .with_context(|| format!("symphonia could not decode the payload: {err:#}"))
            .map_err(Error::decode),
        #[cfg(not(feature = "video"))]
        Err(err) => Err(Error::decode(err)),
    }
}

/// Decode the audio track of a file on disk. The extension is used as a probe hint.
pub fn normalize_file(path: &Path) -> Result<Waveform> {
    let file = File::open(path)
        .with_context(|| format!("failed to open media file '{}'", path.display()))
        .map_err(Error::decode)?;
    let hint = path.extension().and_then(|e| e.to_str());

    match normalize_source(Box::new(file), hint) {
        Ok(waveform) => Ok(waveform),
        #[cfg(feature = "video")]
        Err(err) => fallback::file(path)
            .with_context(|| format!("symphonia could not decode the file: {err:#}"))
            .map_err(Error::decode),
        #[cfg(not(feature = "video"))]
        Err(err) => Err(Error::decode(err)),
    }
}

#[cfg(feature = "video")]
mod fallback {
    use std::io::Write;
    use std::path::Path;

    use anyhow::{Context, Result};
    use tracing::debug;

    use crate::backends::ffmpeg::decode_audio_file;
    use crate::waveform::Waveform;

    pub(super) fn file(path: &Path) -> Result<Waveform> {
        let pcm = decode_audio_file(path)?;
        if pcm.is_empty() {
            anyhow::bail!("libav decoded no audio samples");
        }
        debug!(samples = pcm.len(), "normalized audio via libav");
        Ok(Waveform::from_pcm_i16(&pcm))
    }

    /// libav probes from a path, so the payload is spooled to a temp file first.
    pub(super) fn bytes(bytes: &[u8], hint_extension: Option<&str>) -> Result<Waveform> {
        let suffix = hint_extension.map(|ext| format!(".{ext}")).unwrap_or_default();
        let mut tmp = tempfile::Builder::new()
            .prefix("poise-chunk-")
            .suffix(&suffix)
            .tempfile()
            .context("failed to create temp file for audio payload")?;
        tmp.write_all(bytes)
            .and_then(|()| tmp.flush())
            .context("failed to spool audio payload")?;

        file(tmp.path())
    }
}

fn normalize_source(
    source: Box<dyn MediaSource>,
    hint_extension: Option<&str>,
) -> anyhow::Result<Waveform> {
    let (mut format, track) = probe_audio_track(source, hint_extension)?;
    let mut decoder = make_decoder_for_track(&track)?;
    let mut pipeline = AudioPipeline::new();
    let mut samples = Vec::<f32>::new();

    let mut decoded_packets = 0usize;
    let mut skipped_packets = 0usize;

    while let Some(packet) = next_packet(&mut format)? {
        if packet.track_id() != track.id {
            continue;
        }

        let outcome = decode_packet_and_then(&mut decoder, &packet, |decoded| {
            pipeline
                .push_decoded_and_emit(&decoded, COLLECT_CHUNK_FRAMES, |chunk| {
                    samples.extend_from_slice(chunk);
                    Ok(true)
                })
                .context("audio pipeline failed while processing decoded samples")
        })?;

        match outcome {
            PacketOutcome::Decoded => decoded_packets += 1,
            PacketOutcome::Skipped => skipped_packets += 1,
        }
    }

    if decoded_packets == 0 && skipped_packets > 0 {
        bail!("none of the {skipped_packets} audio packets could be decoded");
    }

    pipeline
        .finalize(COLLECT_CHUNK_FRAMES, |chunk| {
            samples.extend_from_slice(chunk);
            Ok(true)
        })
        .context("audio pipeline failed during finalize")?;

    let expected = usize::try_from(pipeline.expected_output_frames())
        .map_err(|_| anyhow!("decoded audio is too long"))?;
    samples.truncate(expected);

    debug!(
        decoded_packets,
        skipped_packets,
        samples = samples.len(),
        "normalized audio"
    );

    Ok(Waveform::new(samples))
}
