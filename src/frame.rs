use std::path::Path;

use crate::Result;

/// A single decoded video frame: tightly packed RGB24 bytes in row-major order.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    index: usize,
}

impl Frame {
    /// Wrap RGB24 pixels. Fails when the buffer does not match `width * height * 3`.
    pub fn new(data: Vec<u8>, width: u32, height: u32, index: usize) -> Result<Self> {
        let expected = (width as usize) * (height as usize) * 3;
        if data.len() != expected {
            return Err(crate::Error::Video(format!(
                "frame {index}: expected {expected} RGB bytes for {width}x{height}, got {}",
                data.len()
            )));
        }

        Ok(Self {
            data,
            width,
            height,
            index,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Position of this frame in decode order, starting at 0.
    pub fn index(&self) -> usize {
        self.index
    }

    /// RGB value at `(x, y)`. Callers keep coordinates in bounds.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let offset = ((y as usize) * (self.width as usize) + x as usize) * 3;
        [
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
        ]
    }
}

/// Lazily decoded frames, in sequence order.
pub type FrameIter<'a> = Box<dyn Iterator<Item = Result<Frame>> + 'a>;

/// Reads every decodable frame of a video file.
///
/// Implementations handle container and codec details; gaze estimation only sees [`Frame`]s.
/// Failures to open the file are reported as [`crate::Error::Video`].
pub trait VideoReader: Send + Sync {
    fn frames<'a>(&'a self, path: &Path) -> Result<FrameIter<'a>>;
}
