//! libav-backed media decoding (via `ffmpeg-next`).
//!
//! Two jobs:
//! - [`FfmpegReader`] decodes every video frame to RGB24 for gaze estimation
//! - [`decode_audio_file`] decodes codecs Symphonia lacks (notably Opus in browser WebM) to
//!   mono 16 kHz signed 16-bit PCM

use std::path::Path;
use std::sync::Once;

use anyhow::{Context, Result, anyhow};
use ffmpeg_next::format::Pixel;
use ffmpeg_next::format::sample::{Sample, Type as SampleType};
use ffmpeg_next::media::Type as MediaType;
use ffmpeg_next::software::{resampling, scaling};
use ffmpeg_next::util::channel_layout::ChannelLayout;
use ffmpeg_next::util::frame;

use crate::audio_pipeline::TARGET_SAMPLE_RATE;
use crate::frame::{Frame, FrameIter, VideoReader};

fn init_ffmpeg() -> Result<()> {
    static INIT: Once = Once::new();
    let mut res = Ok(());
    INIT.call_once(|| {
        res = ffmpeg_next::init().map_err(|e| anyhow!(e));
        ffmpeg_next::util::log::set_level(ffmpeg_next::util::log::Level::Error);
    });
    res.context("failed to initialize ffmpeg")
}

/// Opens video files with libavformat and decodes frames lazily.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegReader;

impl FfmpegReader {
    pub fn new() -> crate::Result<Self> {
        init_ffmpeg().map_err(crate::Error::video)?;
        Ok(Self)
    }
}

impl VideoReader for FfmpegReader {
    fn frames<'a>(&'a self, path: &Path) -> crate::Result<FrameIter<'a>> {
        let iter = FfmpegFrameIter::open(path).map_err(crate::Error::video)?;
        Ok(Box::new(iter))
    }
}

/// Decodes one frame at a time; the input context is owned so the iterator is self-contained.
struct FfmpegFrameIter {
    input: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: Option<scaling::Context>,
    stream_index: usize,
    frame_index: usize,
    flushing: bool,
    done: bool,
}

impl FfmpegFrameIter {
    fn open(path: &Path) -> Result<Self> {
        init_ffmpeg()?;

        let input = ffmpeg_next::format::input(path)
            .with_context(|| format!("failed to open video '{}'", path.display()))?;

        let stream = input
            .streams()
            .best(MediaType::Video)
            .ok_or_else(|| anyhow!("no video stream found"))?;
        let stream_index = stream.index();

        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .context("failed to read video codec parameters")?;
        let decoder = codec_ctx
            .decoder()
            .video()
            .context("failed to open video decoder")?;

        Ok(Self {
            input,
            decoder,
            scaler: None,
            stream_index,
            frame_index: 0,
            flushing: false,
            done: false,
        })
    }

    fn try_receive(&mut self) -> Option<crate::Result<Frame>> {
        let mut decoded = frame::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return None;
        }

        Some(self.to_rgb(&decoded).map_err(crate::Error::video))
    }

    fn to_rgb(&mut self, decoded: &frame::Video) -> Result<Frame> {
        let (width, height) = (decoded.width(), decoded.height());

        if self.scaler.is_none() {
            let scaler = scaling::Context::get(
                decoded.format(),
                width,
                height,
                Pixel::RGB24,
                width,
                height,
                scaling::Flags::BILINEAR,
            )
            .context("failed to create RGB scaler")?;
            self.scaler = Some(scaler);
        }
        let scaler = self
            .scaler
            .as_mut()
            .ok_or_else(|| anyhow!("scaler not initialized"))?;

        let mut rgb = frame::Video::empty();
        scaler
            .run(decoded, &mut rgb)
            .context("failed to convert frame to RGB")?;

        let pixels = packed_rgb_pixels(&rgb, width, height);
        let index = self.frame_index;
        self.frame_index += 1;
        Ok(Frame::new(pixels, width, height, index)?)
    }
}

impl Iterator for FfmpegFrameIter {
    type Item = crate::Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if let Some(frame) = self.try_receive() {
            return Some(frame);
        }

        if self.flushing {
            self.done = true;
            return None;
        }

        loop {
            let mut packet = ffmpeg_next::Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {}
                Err(ffmpeg_next::Error::Eof) => {
                    let _ = self.decoder.send_eof();
                    self.flushing = true;
                    let frame = self.try_receive();
                    if frame.is_none() {
                        self.done = true;
                    }
                    return frame;
                }
                // Damaged packets are skipped, matching the "every decodable frame" contract.
                Err(_) => continue,
            }

            if packet.stream() != self.stream_index {
                continue;
            }

            if self.decoder.send_packet(&packet).is_err() {
                continue;
            }

            if let Some(frame) = self.try_receive() {
                return Some(frame);
            }
        }
    }
}

/// Copy pixel rows out of an ffmpeg frame, dropping per-row stride padding.
fn packed_rgb_pixels(rgb: &frame::Video, width: u32, height: u32) -> Vec<u8> {
    let stride = rgb.stride(0);
    let data = rgb.data(0);
    let row_bytes = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_bytes]);
    }
    pixels
}

/// Decode the best audio stream of `path` into mono 16 kHz signed 16-bit PCM.
pub fn decode_audio_file(path: &Path) -> Result<Vec<i16>> {
    init_ffmpeg()?;

    let mut input = ffmpeg_next::format::input(path)
        .with_context(|| format!("failed to open media '{}'", path.display()))?;

    let stream = input
        .streams()
        .best(MediaType::Audio)
        .ok_or_else(|| anyhow!("no audio track found"))?;
    let stream_index = stream.index();

    let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
        .context("failed to read audio codec parameters")?;
    let mut decoder = codec_ctx
        .decoder()
        .audio()
        .context("failed to open audio decoder")?;

    let mut resampler: Option<resampling::Context> = None;
    let mut pcm = Vec::<i16>::new();

    for (stream, packet) in input.packets() {
        if stream.index() != stream_index {
            continue;
        }
        if decoder.send_packet(&packet).is_err() {
            continue;
        }
        drain_audio(&mut decoder, &mut resampler, &mut pcm)?;
    }

    let _ = decoder.send_eof();
    drain_audio(&mut decoder, &mut resampler, &mut pcm)?;

    if let Some(rs) = resampler.as_mut() {
        let mut tail = frame::Audio::empty();
        if rs.flush(&mut tail).is_ok() && tail.samples() > 0 {
            pcm.extend_from_slice(&tail.plane::<i16>(0)[..tail.samples()]);
        }
    }

    Ok(pcm)
}

fn drain_audio(
    decoder: &mut ffmpeg_next::decoder::Audio,
    resampler: &mut Option<resampling::Context>,
    pcm: &mut Vec<i16>,
) -> Result<()> {
    let mut decoded = frame::Audio::empty();
    while decoder.receive_frame(&mut decoded).is_ok() {
        if resampler.is_none() {
            let layout = if decoded.channel_layout().is_empty() {
                ChannelLayout::default(i32::from(decoded.channels()))
            } else {
                decoded.channel_layout()
            };

            let rs = resampling::Context::get(
                decoded.format(),
                layout,
                decoded.rate(),
                Sample::I16(SampleType::Packed),
                ChannelLayout::MONO,
                TARGET_SAMPLE_RATE,
            )
            .context("failed to create audio resampler")?;
            *resampler = Some(rs);
        }

        let rs = resampler
            .as_mut()
            .ok_or_else(|| anyhow!("resampler not initialized"))?;

        let mut resampled = frame::Audio::empty();
        rs.run(&decoded, &mut resampled)
            .context("failed to resample decoded audio")?;

        let n = resampled.samples();
        if n > 0 {
            pcm.extend_from_slice(&resampled.plane::<i16>(0)[..n]);
        }
    }
    Ok(())
}
