use anyhow::Context;
use tracing::debug;
use whisper_rs::WhisperContext;

use crate::opts::Opts;
use crate::transcriber::Transcriber;
use crate::transcript::Transcript;
use crate::waveform::Waveform;
use crate::{Error, Result};

mod ctx;
mod logging;
mod params;
mod token;

use params::run_whisper_full;
use token::tokens_from_segment;

pub use logging::init_whisper_logging;

/// Built-in transcriber powered by `whisper-rs` / `whisper.cpp`.
///
/// The model is loaded once; every call creates a fresh decoder state, so no context leaks
/// between chunks or between concurrent sessions.
pub struct WhisperTranscriber {
    ctx: WhisperContext,
    model_path: String,
}

impl WhisperTranscriber {
    /// Load a whisper.cpp model (e.g. `ggml-small.bin`) from disk.
    pub fn new(model_path: impl AsRef<str>) -> Result<Self> {
        let model_path = model_path.as_ref();
        if model_path.trim().is_empty() {
            return Err(Error::msg("model path must be provided"));
        }

        let ctx = ctx::get_context(model_path)?;
        Ok(Self {
            ctx,
            model_path: model_path.to_owned(),
        })
    }

    /// Access the underlying Whisper context.
    pub fn context(&self) -> &WhisperContext {
        &self.ctx
    }

    pub fn model_path(&self) -> &str {
        &self.model_path
    }

    fn transcribe_inner(&self, waveform: &Waveform, opts: &Opts) -> anyhow::Result<Transcript> {
        let state = run_whisper_full(&self.ctx, opts, waveform.samples())?;

        let mut text = String::new();
        let mut tokens = Vec::new();
        for segment in state.as_iter() {
            let segment_text = segment.to_str().context("failed to get segment text")?;
            text.push_str(segment_text);
            tokens.extend(tokens_from_segment(&segment)?);
        }

        let words = crate::transcript::words_from_tokens(&tokens);
        debug!(
            samples = waveform.len(),
            words = words.len(),
            "whisper pass complete"
        );

        Ok(Transcript { text, words })
    }
}

impl Transcriber for WhisperTranscriber {
    fn transcribe(&self, waveform: &Waveform, opts: &Opts) -> Result<Transcript> {
        // whisper.cpp rejects very short inputs; an empty chunk simply has nothing to say.
        if waveform.is_empty() {
            return Ok(Transcript::default());
        }

        self.transcribe_inner(waveform, opts)
            .map_err(Error::transcription)
    }
}
