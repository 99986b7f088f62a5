//! One-shot scoring of an uploaded recording.
//!
//! Audio and video are read from the same file: the audio track drives the transcript, filler
//! count and speech rate, and (when a [`GazeEstimator`] is supplied) every video frame feeds the
//! eye-contact ratio. Any failure aborts the whole analysis; partial reports are never produced.

use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::info;

use crate::Result;
use crate::gaze::{GazeAggregate, GazeEstimator};
use crate::lexicon::{count_fillers, tokenize};
use crate::normalizer::normalize_file;
use crate::opts::Opts;
use crate::scoring::{ScoreInputs, score};
use crate::snapshot::ScoreSnapshot;
use crate::transcriber::Transcriber;

/// Result of analyzing one recording.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    #[serde(flatten)]
    pub snapshot: ScoreSnapshot,
    pub duration_seconds: f64,
    pub total_frames: usize,
    pub eye_contact_frames: usize,
    pub eye_contact_ratio: f64,
}

pub(crate) fn analyze_video<T: Transcriber + ?Sized>(
    transcriber: &T,
    opts: &Opts,
    path: &Path,
    gaze: Option<&GazeEstimator<'_>>,
) -> Result<BatchReport> {
    let waveform = normalize_file(path)?;
    let duration_seconds = waveform.duration_seconds();

    let transcript = transcriber.transcribe(&waveform, opts)?;
    let tokens = tokenize(&transcript.text);
    let fillers = count_fillers(&tokens);

    let aggregate = match gaze {
        Some(estimator) => Some(estimator.estimate(path)?),
        None => None,
    };

    let s = score(&ScoreInputs {
        word_count: tokens.len(),
        speaking_seconds: duration_seconds,
        filler_count: fillers,
        gaze_ratio: aggregate.map(|a| a.ratio()),
    });

    let GazeAggregate {
        total_frames,
        eye_contact_frames,
    } = aggregate.unwrap_or_default();

    let report = BatchReport {
        snapshot: ScoreSnapshot::new(transcript.text.trim(), fillers, s),
        duration_seconds,
        total_frames,
        eye_contact_frames,
        eye_contact_ratio: aggregate.map(|a| a.ratio()).unwrap_or(0.0),
    };

    info!(
        duration_seconds,
        words = tokens.len(),
        fillers,
        wpm = report.snapshot.wpm,
        confidence = report.snapshot.confidence,
        total_frames,
        eye_contact_frames,
        "batch analysis complete"
    );
    Ok(report)
}

/// A temporary file holding one upload.
///
/// The file is deleted when this value is dropped, which covers early returns, errors and
/// cancelled tasks alike.
#[derive(Debug)]
pub struct ScopedUpload {
    file: NamedTempFile,
}

impl ScopedUpload {
    /// Create an empty temp file. `suffix` (e.g. `".webm"`) lets container probing see the
    /// original extension.
    pub fn new(suffix: &str) -> io::Result<Self> {
        let file = tempfile::Builder::new()
            .prefix("poise-upload-")
            .suffix(suffix)
            .tempfile()?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// A second handle to the same file, for writers that need ownership (e.g. async I/O).
    pub fn reopen(&self) -> io::Result<std::fs::File> {
        self.file.reopen()
    }

    pub fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.file.write_all(bytes)?;
        self.file.flush()
    }
}

/// File suffix to use for an upload, taken from the client-supplied file name.
pub fn upload_suffix(file_name: Option<&str>) -> String {
    file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_is_removed_on_drop() -> anyhow::Result<()> {
        let mut upload = ScopedUpload::new(".webm")?;
        upload.write_all(b"not really a video")?;
        let path = upload.path().to_path_buf();

        assert!(path.exists());
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("webm"));
        assert_eq!(std::fs::read(&path)?, b"not really a video");

        drop(upload);
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn suffix_comes_from_a_safe_extension() {
        assert_eq!(upload_suffix(Some("answer.WEBM")), ".webm");
        assert_eq!(upload_suffix(Some("clip.mp4")), ".mp4");
        assert_eq!(upload_suffix(Some("noext")), "");
        assert_eq!(upload_suffix(Some("weird.m p4")), "");
        assert_eq!(upload_suffix(None), "");
    }

    #[test]
    fn report_flattens_the_snapshot() -> anyhow::Result<()> {
        let report = BatchReport {
            snapshot: ScoreSnapshot {
                transcript: "hello".into(),
                fillers: 0,
                wpm: 120,
                confidence: 62,
            },
            duration_seconds: 0.5,
            total_frames: 10,
            eye_contact_frames: 5,
            eye_contact_ratio: 0.5,
        };

        let value = serde_json::to_value(&report)?;
        assert_eq!(value["transcript"], "hello");
        assert_eq!(value["confidence"], 62);
        assert_eq!(value["total_frames"], 10);
        assert!(value.get("snapshot").is_none());
        Ok(())
    }
}
