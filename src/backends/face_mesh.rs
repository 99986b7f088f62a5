//! Face-mesh landmark regression on ONNX Runtime (via `ort`).
//!
//! Expects the single-face 468-point mesh model: a 192x192 RGB input, a `[1, 1404]`-shaped
//! landmark output (x, y, z in input pixels) and a face-presence logit as the second output.
//! The model has no detector stage, so frames are center-cropped to a square first, which suits
//! webcam recordings where the speaker sits in the middle of the shot.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use ndarray::Array4;
use tracing::debug;

use crate::frame::Frame;
use crate::landmarks::{FACE_MESH_POINTS, FaceLandmarks, LandmarkDetector};

/// Side of the square model input.
pub const INPUT_SIZE: usize = 192;

/// Face-presence probability below which a frame is treated as faceless.
pub const DEFAULT_PRESENCE_THRESHOLD: f32 = 0.5;

/// Memory layout of the model's image input.
///
/// With the `cli` feature this doubles as a `clap` flag value (`nchw` / `nhwc`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum InputLayout {
    /// `[1, 3, H, W]`
    #[default]
    Nchw,
    /// `[1, H, W, 3]`
    Nhwc,
}

/// Square region of a frame fed to the model, in source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Crop {
    x0: u32,
    y0: u32,
    side: u32,
}

impl Crop {
    fn centered(width: u32, height: u32) -> Self {
        let side = width.min(height);
        Self {
            x0: (width - side) / 2,
            y0: (height - side) / 2,
            side,
        }
    }

    /// Map a point in model-input pixels back to frame-normalized coordinates.
    fn to_frame(self, x: f32, y: f32, width: u32, height: u32) -> (f32, f32) {
        let scale = self.side as f32 / INPUT_SIZE as f32;
        (
            (self.x0 as f32 + x * scale) / width as f32,
            (self.y0 as f32 + y * scale) / height as f32,
        )
    }
}

pub struct OnnxFaceMesh {
    session: Mutex<ort::session::Session>,
    layout: InputLayout,
    presence_threshold: f32,
    model_path: PathBuf,
}

impl OnnxFaceMesh {
    /// Load a face-mesh model with an NCHW input.
    pub fn new(model_path: impl AsRef<Path>) -> crate::Result<Self> {
        Self::with_layout(model_path, InputLayout::default())
    }

    pub fn with_layout(model_path: impl AsRef<Path>, layout: InputLayout) -> crate::Result<Self> {
        let model_path = model_path.as_ref();
        let session = load_session(model_path).map_err(crate::Error::landmarks)?;

        Ok(Self {
            session: Mutex::new(session),
            layout,
            presence_threshold: DEFAULT_PRESENCE_THRESHOLD,
            model_path: model_path.to_path_buf(),
        })
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn layout(&self) -> InputLayout {
        self.layout
    }

    fn detect_inner(&self, frame: &Frame) -> Result<Option<FaceLandmarks>> {
        if frame.width() == 0 || frame.height() == 0 {
            return Ok(None);
        }

        let crop = Crop::centered(frame.width(), frame.height());
        let input = preprocess(frame, crop, self.layout);
        let input_value = ort::value::Tensor::from_array(input).map_err(ort_err)?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow!("face mesh session lock poisoned: {e}"))?;
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(ort_err)?;

        if outputs.len() > 1 {
            let presence = outputs[1].try_extract_array::<f32>().map_err(ort_err)?;
            let logit = presence
                .iter()
                .next()
                .copied()
                .ok_or_else(|| anyhow!("empty face presence output"))?;
            if sigmoid(logit) < self.presence_threshold {
                debug!(frame = frame.index(), "no face detected");
                return Ok(None);
            }
        }

        let raw = outputs[0].try_extract_array::<f32>().map_err(ort_err)?;
        let values: Vec<f32> = raw.iter().copied().collect();
        let points = decode_landmarks(&values, crop, frame.width(), frame.height())?;
        Ok(Some(FaceLandmarks::new(points)))
    }
}

impl LandmarkDetector for OnnxFaceMesh {
    fn detect(&self, frame: &Frame) -> crate::Result<Option<FaceLandmarks>> {
        self.detect_inner(frame).map_err(crate::Error::landmarks)
    }
}

fn load_session(model_path: &Path) -> Result<ort::session::Session> {
    if !model_path.exists() {
        return Err(anyhow!(
            "face mesh model not found: {}",
            model_path.display()
        ));
    }

    let session = ort::session::Session::builder()
        .map_err(ort_err)?
        .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)
        .map_err(ort_err)?
        .with_intra_threads(num_cpus::get())
        .map_err(ort_err)?
        .commit_from_file(model_path)
        .map_err(ort_err)
        .with_context(|| format!("failed to load face mesh model '{}'", model_path.display()))?;
    Ok(session)
}

// Builder errors carry the builder itself; keep only the message.
fn ort_err(err: impl std::fmt::Display) -> anyhow::Error {
    anyhow!("{err}")
}

/// Nearest-neighbour resize of the crop to `INPUT_SIZE`, scaled to `[0, 1]`.
fn preprocess(frame: &Frame, crop: Crop, layout: InputLayout) -> Array4<f32> {
    let s = INPUT_SIZE;
    let mut tensor = match layout {
        InputLayout::Nchw => Array4::<f32>::zeros((1, 3, s, s)),
        InputLayout::Nhwc => Array4::<f32>::zeros((1, s, s, 3)),
    };

    let side = crop.side as f64;
    for y in 0..s {
        let src_y = crop.y0 + (((y as f64 + 0.5) * side / s as f64) as u32).min(crop.side - 1);
        for x in 0..s {
            let src_x =
                crop.x0 + (((x as f64 + 0.5) * side / s as f64) as u32).min(crop.side - 1);
            let rgb = frame.pixel(src_x, src_y);
            for (c, value) in rgb.iter().enumerate() {
                let v = *value as f32 / 255.0;
                match layout {
                    InputLayout::Nchw => tensor[[0, c, y, x]] = v,
                    InputLayout::Nhwc => tensor[[0, y, x, c]] = v,
                }
            }
        }
    }

    tensor
}

/// Turn the flat `x, y, z` landmark output into frame-normalized `(x, y)` points.
fn decode_landmarks(values: &[f32], crop: Crop, width: u32, height: u32) -> Result<Vec<(f32, f32)>> {
    if values.len() < FACE_MESH_POINTS * 3 {
        return Err(anyhow!(
            "face mesh output has {} values, expected at least {}",
            values.len(),
            FACE_MESH_POINTS * 3
        ));
    }

    Ok(values
        .chunks_exact(3)
        .take(FACE_MESH_POINTS)
        .map(|p| crop.to_frame(p[0], p[1], width, height))
        .collect())
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
