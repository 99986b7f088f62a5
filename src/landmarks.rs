//! Face-mesh landmarks and the eye-openness test used as an eye-contact proxy.
//!
//! Indices follow the 468-point face-mesh topology (478 with iris refinement). Coordinates are
//! normalized to the frame: `(0, 0)` is the top-left corner and `(1, 1)` the bottom-right.
//!
//! "Eye contact" here means both eyelids are open wider than a threshold. That is a cheap stand-in
//! for real gaze direction: someone looking sideways with wide eyes still passes, and a squint
//! straight at the camera still fails.

use crate::Result;
use crate::frame::Frame;

/// Number of points in the base face-mesh topology.
pub const FACE_MESH_POINTS: usize = 468;

const LEFT_UPPER_LID: usize = 159;
const LEFT_LOWER_LID: usize = 145;
const RIGHT_UPPER_LID: usize = 386;
const RIGHT_LOWER_LID: usize = 374;

/// Landmarks for one detected face.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceLandmarks {
    points: Vec<(f32, f32)>,
}

impl FaceLandmarks {
    pub fn new(points: Vec<(f32, f32)>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[(f32, f32)] {
        &self.points
    }

    /// Vertical gap between two eyelid landmarks, or `None` if the mesh is too small.
    fn eyelid_gap(&self, upper: usize, lower: usize) -> Option<f32> {
        let upper = self.points.get(upper)?;
        let lower = self.points.get(lower)?;
        Some((upper.1 - lower.1).abs())
    }

    pub fn left_eye_gap(&self) -> Option<f32> {
        self.eyelid_gap(LEFT_UPPER_LID, LEFT_LOWER_LID)
    }

    pub fn right_eye_gap(&self) -> Option<f32> {
        self.eyelid_gap(RIGHT_UPPER_LID, RIGHT_LOWER_LID)
    }

    /// Both eyelid gaps strictly exceed `threshold`.
    pub fn has_eye_contact(&self, threshold: f32) -> bool {
        matches!(
            (self.left_eye_gap(), self.right_eye_gap()),
            (Some(left), Some(right)) if left > threshold && right > threshold
        )
    }
}

/// Detects at most one face per frame.
///
/// Detectors are loaded once and shared across requests, so detection takes `&self`;
/// implementations that need mutable runtime state guard it internally.
pub trait LandmarkDetector: Send + Sync {
    fn detect(&self, frame: &Frame) -> Result<Option<FaceLandmarks>>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// A full-size mesh with every point at the origin except the four eyelid landmarks.
    pub(crate) fn mesh_with_eye_gaps(left: f32, right: f32) -> FaceLandmarks {
        let mut points = vec![(0.0, 0.0); FACE_MESH_POINTS];
        points[LEFT_UPPER_LID] = (0.40, 0.5);
        points[LEFT_LOWER_LID] = (0.40, 0.5 + left);
        points[RIGHT_UPPER_LID] = (0.60, 0.5);
        points[RIGHT_LOWER_LID] = (0.60, 0.5 + right);
        FaceLandmarks::new(points)
    }
}
