//! Codec-level decoding helpers built on top of Symphonia.

use anyhow::{Context, Result, anyhow};
use symphonia::core::audio::AudioBufferRef;
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{Packet, Track};

/// Create a decoder for the selected audio track using Symphonia's default codec registry.
///
/// Fails when the codec is unsupported or its parameters are invalid.
pub fn make_decoder_for_track(track: &Track) -> Result<Box<dyn Decoder>> {
    let decoder_opts: DecoderOptions = Default::default();

    symphonia::default::get_codecs()
        .make(&track.codec_params, &decoder_opts)
        .map_err(|e| anyhow!(e))
        .context("failed to create decoder for audio track")
}

/// Outcome of decoding one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketOutcome {
    Decoded,
    Skipped,
}

/// Decode a packet and hand the decoded buffer to `on_decoded`.
///
/// Error policy:
/// - `DecodeError` → skip the corrupted frame and keep going
/// - `IoError`     → treat as end of data for this packet
/// - anything else → fatal
pub fn decode_packet_and_then(
    decoder: &mut Box<dyn Decoder>,
    packet: &Packet,
    mut on_decoded: impl FnMut(AudioBufferRef<'_>) -> Result<()>,
) -> Result<PacketOutcome> {
    match decoder.decode(packet) {
        Ok(buf) => {
            on_decoded(buf)?;
            Ok(PacketOutcome::Decoded)
        }
        Err(SymphoniaError::DecodeError(_)) | Err(SymphoniaError::IoError(_)) => {
            Ok(PacketOutcome::Skipped)
        }
        Err(e) => Err(anyhow!(e)).context("decoder failure"),
    }
}
