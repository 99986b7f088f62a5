//! Deterministic delivery scoring shared by the streaming and batch paths.

/// Speaking rate that earns the full rate bonus.
pub const TARGET_WPM: i64 = 150;

/// Maximum bonus for speaking close to [`TARGET_WPM`].
pub const MAX_WPM_SCORE: i64 = 20;

/// Deviation (in wpm) that costs one point of rate bonus.
pub const WPM_STEP: i64 = 3;

/// Points deducted per filler word.
pub const FILLER_PENALTY: i64 = 2;

/// Points awarded for a perfect eye-contact ratio.
pub const MAX_EYE_SCORE: f64 = 10.0;

/// Starting point before bonuses and penalties.
pub const BASE_CONFIDENCE: i64 = 50;

/// Confidence floor.
pub const MIN_CONFIDENCE: i64 = 40;

/// Confidence ceiling.
pub const MAX_CONFIDENCE: i64 = 100;

/// Confidence reported for a chunk that could not be processed.
pub const DEGRADED_CONFIDENCE: u32 = 50;

/// Raw statistics fed into [`score`].
///
/// Callers are responsible for keeping these inside their documented ranges; the scorer does not
/// re-validate them.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScoreInputs {
    /// Number of transcript tokens (fillers included).
    pub word_count: usize,
    /// Seconds of audio that produced those tokens. Must be `>= 0`.
    pub speaking_seconds: f64,
    /// Number of filler tokens. Never exceeds `word_count`.
    pub filler_count: usize,
    /// Fraction of frames with eye contact, in `[0, 1]`. `None` when no video was analyzed.
    pub gaze_ratio: Option<f64>,
}

/// Output of [`score`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Score {
    pub wpm: u32,
    /// Always within `[MIN_CONFIDENCE, MAX_CONFIDENCE]`.
    pub confidence: u32,
}

/// Score a delivery from its raw statistics.
pub fn score(inputs: &ScoreInputs) -> Score {
    let wpm = words_per_minute(inputs.word_count, inputs.speaking_seconds);

    let filler_penalty = inputs.filler_count as i64 * FILLER_PENALTY;
    let wpm_score = (MAX_WPM_SCORE - (wpm - TARGET_WPM).abs() / WPM_STEP).max(0);
    let eye_score = inputs.gaze_ratio.map_or(0, eye_score);

    let confidence = (BASE_CONFIDENCE + wpm_score - filler_penalty + eye_score)
        .clamp(MIN_CONFIDENCE, MAX_CONFIDENCE);

    Score {
        wpm: u32::try_from(wpm).unwrap_or(u32::MAX),
        confidence: confidence as u32,
    }
}

/// Floor of words per minute, or `0` when no speaking time has been recorded.
fn words_per_minute(word_count: usize, speaking_seconds: f64) -> i64 {
    if speaking_seconds <= 0.0 {
        return 0;
    }

    // `count * 60 / seconds` is the same quantity as `count / (seconds / 60)` but avoids the
    // rounding error of the intermediate division, so exact rates (25 words in 10 s) stay exact.
    (word_count as f64 * 60.0 / speaking_seconds).floor() as i64
}

fn eye_score(ratio: f64) -> i64 {
    (ratio * MAX_EYE_SCORE).floor() as i64
}
