//! High-level entry point for scoring spoken answers.
//!
//! `Poise` owns the long-lived speech-to-text collaborator and the analysis options:
//! - construct it once (model loading happens here)
//! - share it (it is `Sync`) across streaming sessions and batch requests
//!
//! Per-connection state lives in [`Session`](crate::session::Session); `Poise` itself never
//! mutates after construction.

use std::path::Path;

use tracing::debug;

use crate::Result;
use crate::backends::whisper::{WhisperTranscriber, init_whisper_logging};
use crate::batch::{self, BatchReport};
use crate::gaze::GazeEstimator;
use crate::normalizer::normalize_bytes;
use crate::opts::Opts;
use crate::session::ChunkTranscript;
use crate::transcriber::Transcriber;

pub struct Poise<T: Transcriber = WhisperTranscriber> {
    transcriber: T,
    opts: Opts,
}

impl Poise<WhisperTranscriber> {
    /// Load a whisper.cpp model and use it as the transcriber.
    pub fn new(model_path: impl AsRef<str>, opts: Opts) -> Result<Self> {
        // whisper.cpp logs to stdout by default; keep it quiet so callers control output.
        init_whisper_logging();
        let transcriber = WhisperTranscriber::new(model_path)?;
        Ok(Self::with_transcriber(transcriber, opts))
    }
}

impl<T: Transcriber> Poise<T> {
    /// Use a custom transcriber.
    pub fn with_transcriber(transcriber: T, opts: Opts) -> Self {
        Self { transcriber, opts }
    }

    pub fn transcriber(&self) -> &T {
        &self.transcriber
    }

    pub fn opts(&self) -> &Opts {
        &self.opts
    }

    /// Normalize and transcribe one streamed chunk.
    ///
    /// Each chunk is transcribed on its own; nothing from earlier chunks conditions the decoder.
    /// Blocking: callers on an async runtime should run this off the event loop.
    pub fn transcribe_chunk(&self, bytes: Vec<u8>) -> Result<ChunkTranscript> {
        let waveform = normalize_bytes(bytes, self.opts.stream_container_hint.as_deref())?;
        let transcript = self.transcriber.transcribe(&waveform, &self.opts)?;
        let chunk = ChunkTranscript::new(&transcript, waveform.duration_seconds());

        debug!(
            seconds = chunk.duration_seconds,
            tokens = chunk.tokens.len(),
            "chunk transcribed"
        );
        Ok(chunk)
    }

    /// Score a whole recording on disk. `gaze` is `None` for audio-only analysis.
    ///
    /// Blocking, like [`Poise::transcribe_chunk`].
    pub fn analyze_video(
        &self,
        path: &Path,
        gaze: Option<&GazeEstimator<'_>>,
    ) -> Result<BatchReport> {
        batch::analyze_video(&self.transcriber, &self.opts, path, gaze)
    }
}
