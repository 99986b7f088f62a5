//! Per-connection streaming state.
//!
//! A [`Session`] is created when a connection opens, folds in one transcribed chunk at a time,
//! and is consumed by [`Session::close`] when the connection goes away. Nothing is persisted.
//!
//! Chunks must be applied strictly in arrival order: each snapshot is computed from the totals
//! left by the previous chunk.

use tracing::{info, warn};
use uuid::Uuid;

use crate::lexicon::{count_fillers, tokenize};
use crate::scoring::{ScoreInputs, score};
use crate::snapshot::ScoreSnapshot;
use crate::transcript::Transcript;
use crate::{Error, Result};

/// The tokenized result of transcribing one chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkTranscript {
    pub tokens: Vec<String>,
    /// Duration of the chunk's audio.
    pub duration_seconds: f64,
}

impl ChunkTranscript {
    pub fn new(transcript: &Transcript, duration_seconds: f64) -> Self {
        Self {
            tokens: tokenize(&transcript.text),
            duration_seconds,
        }
    }
}

/// What the session produced for one inbound chunk.
#[derive(Debug)]
pub enum ChunkOutcome {
    /// The chunk was folded into the running totals.
    Scored(ScoreSnapshot),
    /// The chunk was skipped; totals are unchanged.
    Degraded { snapshot: ScoreSnapshot, error: Error },
}

impl ChunkOutcome {
    pub fn snapshot(&self) -> &ScoreSnapshot {
        match self {
            Self::Scored(snapshot) | Self::Degraded { snapshot, .. } => snapshot,
        }
    }

    pub fn into_snapshot(self) -> ScoreSnapshot {
        match self {
            Self::Scored(snapshot) | Self::Degraded { snapshot, .. } => snapshot,
        }
    }
}

/// Final counters of a closed session, for logging.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub id: Uuid,
    pub chunks_scored: usize,
    pub chunks_degraded: usize,
    pub speaking_seconds: f64,
    pub last_snapshot: ScoreSnapshot,
}

/// Running totals for one streaming connection.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    transcript_words: Vec<String>,
    filler_count: usize,
    speaking_seconds: f64,
    chunks_scored: usize,
    chunks_degraded: usize,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            transcript_words: Vec::new(),
            filler_count: 0,
            speaking_seconds: 0.0,
            chunks_scored: 0,
            chunks_degraded: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn transcript_words(&self) -> &[String] {
        &self.transcript_words
    }

    pub fn filler_count(&self) -> usize {
        self.filler_count
    }

    pub fn speaking_seconds(&self) -> f64 {
        self.speaking_seconds
    }

    /// Fold the outcome of processing one chunk into the session.
    ///
    /// Recoverable failures (decode, transcription, timeout) leave the totals untouched and
    /// yield a degraded snapshot. Any other error is returned so the caller can end the session.
    pub fn ingest(&mut self, processed: Result<ChunkTranscript>) -> Result<ChunkOutcome> {
        match processed {
            Ok(chunk) => Ok(ChunkOutcome::Scored(self.apply(chunk))),
            Err(error) if error.is_recoverable_for_chunk() => {
                warn!(session = %self.id, error = %error, "chunk skipped");
                Ok(ChunkOutcome::Degraded {
                    snapshot: self.degrade(),
                    error,
                })
            }
            Err(error) => Err(error),
        }
    }

    /// Append a successfully transcribed chunk and score the new totals.
    ///
    /// Chunks that produced no words still emit a snapshot but add no speaking time, so pauses
    /// between answers don't drag the rate down.
    pub fn apply(&mut self, chunk: ChunkTranscript) -> ScoreSnapshot {
        if !chunk.tokens.is_empty() {
            self.filler_count += count_fillers(&chunk.tokens);
            self.speaking_seconds += chunk.duration_seconds.max(0.0);
            self.transcript_words.extend(chunk.tokens);
        }
        self.chunks_scored += 1;
        self.snapshot()
    }

    /// Record a skipped chunk and return the previous totals with rate and confidence forced to
    /// their degraded values.
    pub fn degrade(&mut self) -> ScoreSnapshot {
        self.chunks_degraded += 1;
        ScoreSnapshot::degraded(self.transcript_words.join(" "), self.filler_count)
    }

    /// Score the current totals. Streaming has no video, so gaze never contributes here.
    pub fn snapshot(&self) -> ScoreSnapshot {
        let s = score(&ScoreInputs {
            word_count: self.transcript_words.len(),
            speaking_seconds: self.speaking_seconds,
            filler_count: self.filler_count,
            gaze_ratio: None,
        });
        ScoreSnapshot::new(self.transcript_words.join(" "), self.filler_count, s)
    }

    /// End the session, discarding its state.
    pub fn close(self) -> SessionSummary {
        let summary = SessionSummary {
            id: self.id,
            chunks_scored: self.chunks_scored,
            chunks_degraded: self.chunks_degraded,
            speaking_seconds: self.speaking_seconds,
            last_snapshot: self.snapshot(),
        };
        info!(
            session = %summary.id,
            chunks_scored = summary.chunks_scored,
            chunks_degraded = summary.chunks_degraded,
            confidence = summary.last_snapshot.confidence,
            "session closed"
        );
        summary
    }
}
