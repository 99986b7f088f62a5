use serde::Serialize;

/// A single token produced by a speech-to-text backend.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Token {
    pub start_seconds: f32,
    pub end_seconds: f32,
    pub text: String,
    pub probability: f32,
}

/// A whole word with its timing, assembled from one or more tokens.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct TimedWord {
    pub start_seconds: f32,
    pub end_seconds: f32,
    pub text: String,
}

/// What the speech-to-text collaborator returns for one waveform.
#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct Transcript {
    pub text: String,
    pub words: Vec<TimedWord>,
}

impl Transcript {
    /// A transcript with text only, for backends that do not report timings.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            words: Vec::new(),
        }
    }
}

pub(crate) fn centiseconds_to_seconds(value: i64) -> f32 {
    if value < 0 { 0.0 } else { value as f32 / 100.0 }
}

/// Merge sub-word tokens into words.
///
/// Whisper-style tokens carry a leading space at word boundaries (`" basic"`, `"ally"`), and
/// control tokens look like `[_BEG_]` or `[_TT_50]`; those are dropped.
pub fn words_from_tokens(tokens: &[Token]) -> Vec<TimedWord> {
    let mut words: Vec<TimedWord> = Vec::new();

    for token in tokens {
        if is_control_token(&token.text) {
            continue;
        }

        let starts_word = token.text.starts_with(char::is_whitespace);
        let piece = token.text.trim();
        if piece.is_empty() {
            continue;
        }

        match words.last_mut() {
            Some(word) if !starts_word => {
                word.text.push_str(piece);
                word.end_seconds = word.end_seconds.max(token.end_seconds);
            }
            _ => words.push(TimedWord {
                start_seconds: token.start_seconds,
                end_seconds: token.end_seconds,
                text: piece.to_owned(),
            }),
        }
    }

    words
}

fn is_control_token(text: &str) -> bool {
    text.starts_with("[_") && text.ends_with(']')
}
