//! In-process video backend.
//!
//! Sources are frame lists held in memory. Sinks write a JSON recording of
//! what was encoded (geometry, rate and the overlay drawn on each frame) to
//! the sink path, so the file-level caching in the pipeline behaves the same
//! as with a real container.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use super::{Frame, FrameSink, FrameSource, VideoBackend, VideoSpec};
use crate::error::{MediaError, MediaResult};
use crate::overlay::OverlayPlan;

/// Decodable content for a memory source.
#[derive(Debug, Clone)]
pub struct MemoryClip {
    pub fps: f64,
    pub frames: Vec<RgbImage>,
}

impl MemoryClip {
    pub fn new(fps: f64, frames: Vec<RgbImage>) -> Self {
        Self { fps, frames }
    }

    /// `count` mid-grey frames.
    pub fn blank(width: u32, height: u32, fps: f64, count: usize) -> Self {
        let frame = RgbImage::from_pixel(width, height, Rgb([128, 128, 128]));
        Self::new(fps, vec![frame; count])
    }

    pub fn spec(&self) -> VideoSpec {
        let (width, height) = self
            .frames
            .first()
            .map(|f| f.dimensions())
            .unwrap_or((0, 0));
        VideoSpec::new(width, height, self.fps)
    }
}

/// One encoded frame as seen by a memory sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedFrame {
    pub index: u64,
    pub label: Option<String>,
    pub markers: usize,
    pub lines: usize,
    /// Pixels changed by rasterizing the overlay
    pub drawn_pixels: usize,
}

/// Contents of a file written by a memory sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedVideo {
    pub spec: VideoSpec,
    pub frames: Vec<RecordedFrame>,
}

impl RecordedVideo {
    pub fn load(path: &Path) -> MediaResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => MediaError::FileNotFound(path.to_path_buf()),
            _ => MediaError::Io(e),
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Frames that carry any skeleton drawing.
    pub fn annotated_frames(&self) -> usize {
        self.frames
            .iter()
            .filter(|f| f.markers > 0 || f.lines > 0)
            .count()
    }
}

#[derive(Default)]
struct Counters {
    sources_opened: AtomicUsize,
    sinks_created: AtomicUsize,
}

/// Video backend backed by in-memory clips.
#[derive(Default, Clone)]
pub struct MemoryVideoBackend {
    clips: Arc<Mutex<HashMap<PathBuf, MemoryClip>>>,
    default_clip: Option<MemoryClip>,
    counters: Arc<Counters>,
}

impl MemoryVideoBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode every existing path without a registered clip as `clip`.
    pub fn with_default_clip(mut self, clip: MemoryClip) -> Self {
        self.default_clip = Some(clip);
        self
    }

    /// Decode `path` as `clip`.
    pub fn register(&self, path: impl Into<PathBuf>, clip: MemoryClip) {
        if let Ok(mut clips) = self.clips.lock() {
            clips.insert(path.into(), clip);
        }
    }

    pub fn sources_opened(&self) -> usize {
        self.counters.sources_opened.load(Ordering::SeqCst)
    }

    pub fn sinks_created(&self) -> usize {
        self.counters.sinks_created.load(Ordering::SeqCst)
    }
}

impl VideoBackend for MemoryVideoBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn open_source(&self, path: &Path) -> MediaResult<Box<dyn FrameSource>> {
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }

        let registered = self
            .clips
            .lock()
            .map_err(|_| MediaError::video_backend("clip registry poisoned"))?
            .get(path)
            .cloned();

        let clip = registered
            .or_else(|| self.default_clip.clone())
            .ok_or_else(|| MediaError::source_unreadable(path, "no decodable video stream"))?;

        self.counters.sources_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySource {
            spec: clip.spec(),
            frames: clip.frames.into_iter(),
            next_index: 0,
        }))
    }

    fn create_sink(&self, path: &Path, spec: VideoSpec) -> MediaResult<Box<dyn FrameSink>> {
        self.counters.sinks_created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySink {
            path: path.to_path_buf(),
            recording: RecordedVideo {
                spec,
                frames: Vec::new(),
            },
        }))
    }
}

struct MemorySource {
    spec: VideoSpec,
    frames: std::vec::IntoIter<RgbImage>,
    next_index: u64,
}

impl FrameSource for MemorySource {
    fn spec(&self) -> VideoSpec {
        self.spec
    }

    fn read_frame(&mut self) -> MediaResult<Option<Frame>> {
        Ok(self.frames.next().map(|image| {
            let frame = Frame::new(self.next_index, image);
            self.next_index += 1;
            frame
        }))
    }
}

struct MemorySink {
    path: PathBuf,
    recording: RecordedVideo,
}

impl FrameSink for MemorySink {
    fn write(&mut self, frame: &Frame, plan: &OverlayPlan) -> MediaResult<()> {
        let spec = self.recording.spec;
        if frame.width() != spec.width || frame.height() != spec.height {
            return Err(MediaError::video_backend(format!(
                "frame {}x{} does not match sink {}x{}",
                frame.width(),
                frame.height(),
                spec.width,
                spec.height
            )));
        }

        let mut image = frame.image.clone();
        plan.rasterize(&mut image);
        let drawn_pixels = image
            .pixels()
            .zip(frame.image.pixels())
            .filter(|(a, b)| a != b)
            .count();

        self.recording.frames.push(RecordedFrame {
            index: frame.index,
            label: plan.label().map(str::to_string),
            markers: plan.markers(),
            lines: plan.lines(),
            drawn_pixels,
        });
        Ok(())
    }

    fn finish(self: Box<Self>) -> MediaResult<()> {
        let bytes = serde_json::to_vec(&self.recording)?;
        std::fs::write(&self.path, bytes)?;
        Ok(())
    }
}
