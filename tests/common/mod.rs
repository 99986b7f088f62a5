#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::Mutex;

use poise::landmarks::{FACE_MESH_POINTS, FaceLandmarks};
use poise::transcript::Transcript;
use poise::{Error, Opts, Result, Transcriber, Waveform};

/// Twenty-five tokens, two of them fillers ("um", "uh").
pub const ANSWER_25_WORDS_2_FILLERS: &str = " Um, I have spent the last five years building reliable \
    backend services and uh I enjoy mentoring junior engineers on the team every week today. ";

/// A mono or multi-channel 16-bit WAV holding a constant sample value.
pub fn wav_bytes(sample_rate: u32, channels: u16, seconds: f64, value: i16) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut bytes = Vec::new();
    {
        let mut writer = match hound::WavWriter::new(Cursor::new(&mut bytes), spec) {
            Ok(w) => w,
            Err(err) => panic!("failed to create wav writer: {err}"),
        };
        let frames = (sample_rate as f64 * seconds).round() as usize;
        for _ in 0..frames * channels as usize {
            if let Err(err) = writer.write_sample(value) {
                panic!("failed to write wav sample: {err}");
            }
        }
        if let Err(err) = writer.finalize() {
            panic!("failed to finalize wav: {err}");
        }
    }
    bytes
}

/// Options that probe test payloads as WAV.
pub fn wav_opts() -> Opts {
    Opts {
        stream_container_hint: Some("wav".to_owned()),
        ..Opts::default()
    }
}

/// Replays scripted results, one per call, and records the sample counts it was given.
pub struct ScriptedTranscriber {
    script: Mutex<VecDeque<std::result::Result<String, String>>>,
    seen_samples: Mutex<Vec<usize>>,
}

impl ScriptedTranscriber {
    pub fn new(script: impl IntoIterator<Item = std::result::Result<&'static str, &'static str>>) -> Self {
        Self {
            script: Mutex::new(
                script
                    .into_iter()
                    .map(|r| r.map(str::to_owned).map_err(str::to_owned))
                    .collect(),
            ),
            seen_samples: Mutex::new(Vec::new()),
        }
    }

    pub fn always(text: &'static str) -> Self {
        Self::new(std::iter::repeat_n(Ok(text), 64))
    }

    pub fn seen_samples(&self) -> Vec<usize> {
        match self.seen_samples.lock() {
            Ok(seen) => seen.clone(),
            Err(_) => Vec::new(),
        }
    }
}

impl Transcriber for ScriptedTranscriber {
    fn transcribe(&self, waveform: &Waveform, _opts: &Opts) -> Result<Transcript> {
        if let Ok(mut seen) = self.seen_samples.lock() {
            seen.push(waveform.len());
        }

        let next = self
            .script
            .lock()
            .map_err(|_| Error::Transcription("script lock poisoned".into()))?
            .pop_front()
            .ok_or_else(|| Error::Transcription("script exhausted".into()))?;

        next.map(Transcript::from_text)
            .map_err(Error::Transcription)
    }
}

/// A full face mesh whose eyelid gaps are either wide open or nearly shut.
pub fn face(eyes_open: bool) -> FaceLandmarks {
    let gap = if eyes_open { 0.05 } else { 0.005 };
    let mut points = vec![(0.5, 0.5); FACE_MESH_POINTS];
    points[159] = (0.4, 0.4);
    points[145] = (0.4, 0.4 + gap);
    points[386] = (0.6, 0.4);
    points[374] = (0.6, 0.4 + gap);
    FaceLandmarks::new(points)
}
