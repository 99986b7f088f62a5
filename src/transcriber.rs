use crate::Result;
use crate::opts::Opts;
use crate::transcript::Transcript;
use crate::waveform::Waveform;

/// Pluggable speech-to-text collaborator used by [`crate::Poise`].
///
/// A transcriber turns one mono waveform at the target sample rate into text (plus word timings
/// when the backend has them). Each call is independent: implementations must not carry decoder
/// context from one call into the next, so every streamed chunk is transcribed on its own.
///
/// Implementations are loaded once and shared read-only across sessions, hence `&self` and the
/// `Send + Sync` bound.
pub trait Transcriber: Send + Sync {
    /// Transcribe one waveform. Failures are reported as [`crate::Error::Transcription`].
    fn transcribe(&self, waveform: &Waveform, opts: &Opts) -> Result<Transcript>;
}

impl<T: Transcriber + ?Sized> Transcriber for Box<T> {
    fn transcribe(&self, waveform: &Waveform, opts: &Opts) -> Result<Transcript> {
        (**self).transcribe(waveform, opts)
    }
}
