use std::error::Error as StdError;

use thiserror::Error;

/// Poise's crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Poise's crate-wide error type.
///
/// Internally we build errors with `anyhow` context chains and classify them into one of these
/// variants at module boundaries, so callers can decide between "skip this chunk" and "abort the
/// request" without string matching.
#[derive(Debug, Error)]
pub enum Error {
    /// The payload was not a decodable audio container.
    #[error("failed to decode audio: {0}")]
    Decode(String),

    /// The speech-to-text collaborator failed.
    #[error("transcription failed: {0}")]
    Transcription(String),

    /// The client channel was closed or broken.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The video container could not be opened or its frames could not be decoded.
    #[error("failed to read video: {0}")]
    Video(String),

    /// The face-landmark collaborator failed.
    #[error("landmark detection failed: {0}")]
    Landmarks(String),

    /// Processing exceeded its deadline.
    #[error("{0} timed out")]
    Timeout(String),

    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(Box<dyn StdError + Send + Sync>),
}

impl Error {
    pub(crate) fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    pub(crate) fn decode(err: anyhow::Error) -> Self {
        Self::Decode(format!("{err:#}"))
    }

    pub(crate) fn transcription(err: anyhow::Error) -> Self {
        Self::Transcription(format!("{err:#}"))
    }

    #[cfg_attr(not(feature = "video"), allow(dead_code))]
    pub(crate) fn video(err: anyhow::Error) -> Self {
        Self::Video(format!("{err:#}"))
    }

    #[cfg_attr(not(feature = "video"), allow(dead_code))]
    pub(crate) fn landmarks(err: anyhow::Error) -> Self {
        Self::Landmarks(format!("{err:#}"))
    }

    /// Build a transport error from any displayable channel failure.
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    /// Build a timeout error naming the operation that ran out of time.
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout(operation.into())
    }

    /// Whether a streaming session can survive this error by skipping the current chunk.
    pub fn is_recoverable_for_chunk(&self) -> bool {
        matches!(
            self,
            Self::Decode(_) | Self::Transcription(_) | Self::Timeout(_)
        )
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Message(format!("{err:#}"))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Other(Box::new(err))
    }
}
