//! Transcript tokenization and filler-word classification.
//!
//! Tokens are lowercase runs of word characters (Unicode alphanumerics and `_`). Everything that
//! is neither a word character nor whitespace is dropped before splitting, so `"Um,"` becomes
//! `"um"` and `"don't"` becomes `"dont"`.

/// The closed set of filler words. Matching is exact on lowercase tokens.
pub const FILLER_WORDS: &[&str] = &[
    "um", "uh", "umm", "uhh", "ah", "aa", "er", "erm", "hmm", "mm", "like", "you", "know", "so",
    "actually", "basically",
];

/// Split raw transcript text into lowercase word tokens, preserving order and duplicates.
pub fn tokenize(text: &str) -> Vec<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .filter(|c| is_word_char(*c) || c.is_whitespace())
        .collect();

    cleaned.split_whitespace().map(str::to_owned).collect()
}

/// Whether `token` is a filler word.
///
/// The comparison is case-insensitive but otherwise exact: no stemming, no prefix matching.
pub fn is_filler(token: &str) -> bool {
    let lowered = token.to_lowercase();
    FILLER_WORDS.contains(&lowered.as_str())
}

/// Count filler tokens in a token sequence.
pub fn count_fillers<S: AsRef<str>>(tokens: &[S]) -> usize {
    tokens.iter().filter(|t| is_filler(t.as_ref())).count()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
