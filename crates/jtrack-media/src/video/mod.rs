//! Sequential video decode and encode.
//!
//! The pipeline only ever reads a video front to back and writes one back
//! front to back, so the backend surface is two iterator-like handles.

use std::path::Path;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::error::MediaResult;
use crate::overlay::OverlayPlan;

pub mod memory;
#[cfg(feature = "opencv")]
pub mod opencv;

pub use memory::{MemoryClip, MemoryVideoBackend, RecordedFrame, RecordedVideo};
#[cfg(feature = "opencv")]
pub use self::opencv::OpenCvBackend;

/// Geometry and rate of a video stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoSpec {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

impl VideoSpec {
    pub fn new(width: u32, height: u32, fps: f64) -> Self {
        Self { width, height, fps }
    }

    /// Same geometry at another frame rate.
    pub fn with_fps(self, fps: f64) -> Self {
        Self { fps, ..self }
    }
}

/// One decoded frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// 0-based position in the source stream
    pub index: u64,
    pub image: RgbImage,
}

impl Frame {
    pub fn new(index: u64, image: RgbImage) -> Self {
        Self { index, image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Sequential reader over decoded frames.
pub trait FrameSource: Send {
    fn spec(&self) -> VideoSpec;

    /// Next frame, or `None` at end of stream.
    fn read_frame(&mut self) -> MediaResult<Option<Frame>>;
}

/// Sequential writer. The sink draws `plan` onto the frame before encoding.
pub trait FrameSink: Send {
    fn write(&mut self, frame: &Frame, plan: &OverlayPlan) -> MediaResult<()>;

    /// Flush and close the container.
    fn finish(self: Box<Self>) -> MediaResult<()>;
}

/// Factory for sources and sinks.
pub trait VideoBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Open `path` for decoding. Fails with an input error when the file is
    /// missing or cannot be decoded.
    fn open_source(&self, path: &Path) -> MediaResult<Box<dyn FrameSource>>;

    /// Create an encoder writing to `path` at `spec`.
    fn create_sink(&self, path: &Path, spec: VideoSpec) -> MediaResult<Box<dyn FrameSink>>;
}
