/// Built-in speech-to-text backend.
pub mod whisper;

/// libav frame reader and audio fallback decoder.
#[cfg(feature = "video")]
pub mod ffmpeg;

/// ONNX face-mesh landmark detector.
#[cfg(feature = "video")]
pub mod face_mesh;
