mod common;

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use poise::Error;
use poise::batch::ScopedUpload;
use poise::frame::{Frame, FrameIter, VideoReader};
use poise::gaze::GazeEstimator;
use poise::landmarks::{FaceLandmarks, LandmarkDetector};
use poise::{Poise, Result};

use common::{ANSWER_25_WORDS_2_FILLERS, ScriptedTranscriber, face, wav_bytes, wav_opts};

/// Yields `frames` blank 2x2 frames and remembers which paths it was asked to open.
struct BlankVideo {
    frames: usize,
    opened: Mutex<Vec<PathBuf>>,
}

impl BlankVideo {
    fn new(frames: usize) -> Self {
        Self {
            frames,
            opened: Mutex::new(Vec::new()),
        }
    }
}

impl VideoReader for BlankVideo {
    fn frames<'a>(&'a self, path: &Path) -> Result<FrameIter<'a>> {
        if let Ok(mut opened) = self.opened.lock() {
            opened.push(path.to_path_buf());
        }
        Ok(Box::new(
            (0..self.frames).map(|i| Frame::new(vec![0; 12], 2, 2, i)),
        ))
    }
}

struct UnreadableVideo;

impl VideoReader for UnreadableVideo {
    fn frames<'a>(&'a self, _path: &Path) -> Result<FrameIter<'a>> {
        Err(Error::Video("no video stream found".into()))
    }
}

/// Eyes open on the first `open_frames` frames, shut afterwards.
struct OpenEyesUntil {
    open_frames: usize,
}

impl LandmarkDetector for OpenEyesUntil {
    fn detect(&self, frame: &Frame) -> Result<Option<FaceLandmarks>> {
        Ok(Some(face(frame.index() < self.open_frames)))
    }
}

fn recording(seconds: f64) -> anyhow::Result<ScopedUpload> {
    let mut upload = ScopedUpload::new(".wav")?;
    upload.write_all(&wav_bytes(16_000, 1, seconds, 0))?;
    Ok(upload)
}

#[test]
fn eighty_percent_eye_contact_scores_74() -> anyhow::Result<()> {
    let poise = Poise::with_transcriber(
        ScriptedTranscriber::always(ANSWER_25_WORDS_2_FILLERS),
        wav_opts(),
    );
    let upload = recording(10.0)?;
    let reader = BlankVideo::new(100);
    let detector = OpenEyesUntil { open_frames: 80 };
    let estimator = GazeEstimator::new(&reader, &detector, poise.opts().eye_openness_threshold);

    let report = poise.analyze_video(upload.path(), Some(&estimator))?;

    assert_eq!(report.snapshot.wpm, 150);
    assert_eq!(report.snapshot.fillers, 2);
    assert_eq!(report.snapshot.confidence, 74);
    assert_eq!(report.snapshot.transcript, ANSWER_25_WORDS_2_FILLERS.trim());
    assert_eq!(report.duration_seconds, 10.0);
    assert_eq!(report.total_frames, 100);
    assert_eq!(report.eye_contact_frames, 80);
    assert_eq!(report.eye_contact_ratio, 0.8);

    // Gaze reads the very same file the audio came from.
    let opened = reader.opened.lock().map(|o| o.clone()).unwrap_or_default();
    assert_eq!(opened, vec![upload.path().to_path_buf()]);
    Ok(())
}

#[test]
fn audio_only_analysis_matches_the_streaming_score() -> anyhow::Result<()> {
    let poise = Poise::with_transcriber(
        ScriptedTranscriber::always(ANSWER_25_WORDS_2_FILLERS),
        wav_opts(),
    );
    let upload = recording(10.0)?;

    let report = poise.analyze_video(upload.path(), None)?;
    assert_eq!(report.snapshot.confidence, 66);
    assert_eq!(report.total_frames, 0);
    assert_eq!(report.eye_contact_ratio, 0.0);
    Ok(())
}

#[test]
fn zero_frame_video_has_zero_ratio() -> anyhow::Result<()> {
    let poise = Poise::with_transcriber(
        ScriptedTranscriber::always(ANSWER_25_WORDS_2_FILLERS),
        wav_opts(),
    );
    let upload = recording(10.0)?;
    let reader = BlankVideo::new(0);
    let detector = OpenEyesUntil { open_frames: 0 };
    let estimator = GazeEstimator::new(&reader, &detector, 0.02);

    let report = poise.analyze_video(upload.path(), Some(&estimator))?;
    assert_eq!(report.total_frames, 0);
    assert_eq!(report.eye_contact_ratio, 0.0);
    assert_eq!(report.snapshot.confidence, 66);
    Ok(())
}

#[test]
fn wpm_uses_the_whole_recording() -> anyhow::Result<()> {
    let poise = Poise::with_transcriber(
        ScriptedTranscriber::always(ANSWER_25_WORDS_2_FILLERS),
        wav_opts(),
    );
    let upload = recording(20.0)?;

    let report = poise.analyze_video(upload.path(), None)?;
    assert_eq!(report.snapshot.wpm, 75);
    // 20 - 75/3 < 0, so the rate bonus bottoms out at zero.
    assert_eq!(report.snapshot.confidence, 50 - 4);
    Ok(())
}

#[test]
fn undecodable_upload_aborts_and_is_cleaned_up() -> anyhow::Result<()> {
    let poise = Poise::with_transcriber(ScriptedTranscriber::always("unused"), wav_opts());
    let mut upload = ScopedUpload::new(".wav")?;
    upload.write_all(b"this is not a recording")?;
    let path = upload.path().to_path_buf();

    let res = poise.analyze_video(&path, None);
    assert!(matches!(res, Err(Error::Decode(_))), "{res:?}");
    assert!(poise.transcriber().seen_samples().is_empty());

    drop(upload);
    assert!(!path.exists());
    Ok(())
}

#[test]
fn video_failure_aborts_without_partial_results() -> anyhow::Result<()> {
    let poise = Poise::with_transcriber(
        ScriptedTranscriber::always(ANSWER_25_WORDS_2_FILLERS),
        wav_opts(),
    );
    let upload = recording(1.0)?;
    let detector = OpenEyesUntil { open_frames: 0 };
    let estimator = GazeEstimator::new(&UnreadableVideo, &detector, 0.02);

    let res = poise.analyze_video(upload.path(), Some(&estimator));
    assert!(matches!(res, Err(Error::Video(_))), "{res:?}");
    Ok(())
}

#[test]
fn transcription_failure_aborts() -> anyhow::Result<()> {
    let poise = Poise::with_transcriber(ScriptedTranscriber::new([Err("oom")]), wav_opts());
    let upload = recording(1.0)?;

    let res = poise.analyze_video(upload.path(), None);
    assert!(matches!(res, Err(Error::Transcription(_))), "{res:?}");
    Ok(())
}
