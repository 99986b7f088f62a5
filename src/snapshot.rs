use serde::{Deserialize, Serialize};

use crate::scoring::{DEGRADED_CONFIDENCE, Score};

/// The scored view of an answer at one point in time.
///
/// Snapshots are built fresh for every scoring call and never mutated afterwards; this is the
/// exact payload sent to clients by both the streaming and batch endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSnapshot {
    pub transcript: String,
    pub fillers: usize,
    pub wpm: u32,
    pub confidence: u32,
}

impl ScoreSnapshot {
    pub fn new(transcript: impl Into<String>, fillers: usize, score: Score) -> Self {
        Self {
            transcript: transcript.into(),
            fillers,
            wpm: score.wpm,
            confidence: score.confidence,
        }
    }

    /// A snapshot that reports the accumulated transcript but signals that the latest chunk
    /// could not be scored.
    pub fn degraded(transcript: impl Into<String>, fillers: usize) -> Self {
        Self {
            transcript: transcript.into(),
            fillers,
            wpm: 0,
            confidence: DEGRADED_CONFIDENCE,
        }
    }
}
