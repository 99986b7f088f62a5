//! `poise`: delivery scoring for spoken interview answers.
//!
//! This crate provides:
//! - Audio normalization (any container Symphonia or libav can read, to mono 16 kHz)
//! - Speech-to-text via whisper.cpp behind a pluggable [`Transcriber`]
//! - Filler-word counting, speech rate and a bounded confidence score
//! - Per-connection streaming sessions and one-shot video analysis with eye-contact estimation
//!
//! The library is shared by the CLI and the HTTP/WebSocket server; both load models once and
//! reuse them across requests.

// High-level API (most consumers should start here).
pub mod opts;
pub mod poise;

// Error type shared across the crate.
pub mod error;

// Scoring primitives.
pub mod lexicon;
pub mod scoring;
pub mod snapshot;

// Streaming and batch orchestration.
pub mod batch;
pub mod message;
pub mod session;

// Audio decoding and speech-to-text.
pub mod normalizer;
pub mod transcriber;
pub mod transcript;
pub mod waveform;

// Video frames, landmarks and gaze.
pub mod frame;
pub mod gaze;
pub mod landmarks;

// Built-in collaborators.
pub mod backends;

// Logging configuration.
#[cfg(feature = "logging")]
pub mod logging;

// Internal decode plumbing.
mod audio_pipeline;
mod decode;
mod demux;

pub use batch::BatchReport;
pub use error::{Error, Result};
pub use opts::Opts;
pub use poise::Poise;
pub use session::Session;
pub use snapshot::ScoreSnapshot;
pub use transcriber::Transcriber;
pub use waveform::Waveform;
