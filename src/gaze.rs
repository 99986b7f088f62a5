//! Per-video eye-contact estimation.
//!
//! Every decodable frame is visited in order (no sampling) and handed to the landmark detector
//! once. A frame with no detected face still counts toward the total.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use crate::Result;
use crate::frame::{Frame, VideoReader};
use crate::landmarks::LandmarkDetector;

/// Frame counts accumulated over one pass of a video.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GazeAggregate {
    pub total_frames: usize,
    pub eye_contact_frames: usize,
}

impl GazeAggregate {
    /// Fraction of frames with eye contact, in `[0, 1]`; `0` for a video without frames.
    pub fn ratio(&self) -> f64 {
        if self.total_frames == 0 {
            return 0.0;
        }
        self.eye_contact_frames as f64 / self.total_frames as f64
    }

    fn record(&mut self, eye_contact: bool) {
        self.total_frames += 1;
        if eye_contact {
            self.eye_contact_frames += 1;
        }
    }
}

/// Pairs a frame source with a landmark detector.
pub struct GazeEstimator<'a> {
    reader: &'a dyn VideoReader,
    detector: &'a dyn LandmarkDetector,
    eye_openness_threshold: f32,
}

impl<'a> GazeEstimator<'a> {
    pub fn new(
        reader: &'a dyn VideoReader,
        detector: &'a dyn LandmarkDetector,
        eye_openness_threshold: f32,
    ) -> Self {
        Self {
            reader,
            detector,
            eye_openness_threshold,
        }
    }

    /// Run one full pass over the video at `path`.
    pub fn estimate(&self, path: &Path) -> Result<GazeAggregate> {
        let frames = self.reader.frames(path)?;
        let aggregate = aggregate_frames(frames, self.detector, self.eye_openness_threshold)?;

        info!(
            total_frames = aggregate.total_frames,
            eye_contact_frames = aggregate.eye_contact_frames,
            "gaze estimation complete"
        );
        Ok(aggregate)
    }
}

/// Fold a frame sequence into a [`GazeAggregate`]. The first frame or detector error aborts.
pub fn aggregate_frames(
    frames: impl Iterator<Item = Result<Frame>>,
    detector: &dyn LandmarkDetector,
    eye_openness_threshold: f32,
) -> Result<GazeAggregate> {
    let mut aggregate = GazeAggregate::default();

    for frame in frames {
        let frame = frame?;
        let eye_contact = detector
            .detect(&frame)?
            .is_some_and(|face| face.has_eye_contact(eye_openness_threshold));
        aggregate.record(eye_contact);

        if aggregate.total_frames % 300 == 0 {
            debug!(
                frames = aggregate.total_frames,
                eye_contact_frames = aggregate.eye_contact_frames,
                "gaze progress"
            );
        }
    }

    Ok(aggregate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::landmarks::FaceLandmarks;
    use crate::landmarks::test_support::mesh_with_eye_gaps;

    /// Decides per frame index: `Some(true)` open eyes, `Some(false)` closed, `None` no face.
    struct ScriptedDetector(fn(usize) -> Option<bool>);

    impl LandmarkDetector for ScriptedDetector {
        fn detect(&self, frame: &Frame) -> Result<Option<FaceLandmarks>> {
            Ok((self.0)(frame.index()).map(|open| {
                if open {
                    mesh_with_eye_gaps(0.05, 0.05)
                } else {
                    mesh_with_eye_gaps(0.005, 0.005)
                }
            }))
        }
    }

    fn frames(n: usize) -> impl Iterator<Item = Result<Frame>> {
        (0..n).map(|i| Frame::new(vec![0; 3], 1, 1, i))
    }

    #[test]
    fn zero_frames_gives_zero_ratio() -> anyhow::Result<()> {
        let agg = aggregate_frames(frames(0), &ScriptedDetector(|_| Some(true)), 0.02)?;
        assert_eq!(agg, GazeAggregate::default());
        assert_eq!(agg.ratio(), 0.0);
        Ok(())
    }

    #[test]
    fn counts_every_frame_including_faceless_ones() -> anyhow::Result<()> {
        // 80 open, 10 closed, 10 without a face.
        let detector = ScriptedDetector(|i| match i {
            0..80 => Some(true),
            80..90 => Some(false),
            _ => None,
        });

        let agg = aggregate_frames(frames(100), &detector, 0.02)?;
        assert_eq!(agg.total_frames, 100);
        assert_eq!(agg.eye_contact_frames, 80);
        assert_eq!(agg.ratio(), 0.8);
        Ok(())
    }

    #[test]
    fn frame_errors_abort_the_pass() {
        let broken = (0..3).map(|i| {
            if i == 1 {
                Err(Error::Video("corrupt frame".into()))
            } else {
                Frame::new(vec![0; 3], 1, 1, i)
            }
        });

        let res = aggregate_frames(broken, &ScriptedDetector(|_| Some(true)), 0.02);
        assert!(matches!(res, Err(Error::Video(_))));
    }
}
