//! Pose detection.
//!
//! The detector is a black box: one frame in, 33 normalized landmarks or
//! nothing out.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use jtrack_models::NormalizedPose;

use crate::error::{MediaError, MediaResult};
use crate::video::Frame;

mod service;

pub use service::{PoseServiceClient, PoseServiceConfig, PoseServiceError};

/// Per-frame pose detector.
#[async_trait]
pub trait PoseDetector: Send + Sync {
    /// Detect a pose in `frame`. `Ok(None)` means no person was found.
    async fn detect(&self, frame: &Frame) -> MediaResult<Option<NormalizedPose>>;
}

/// Detector that answers from a fixed table keyed by frame index.
///
/// Frames absent from the table yield no detection.
#[derive(Debug, Default)]
pub struct ScriptedPoseDetector {
    poses: HashMap<u64, NormalizedPose>,
    fail_at: Option<u64>,
    calls: AtomicUsize,
}

impl ScriptedPoseDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Detect `pose` on every frame in `indices`.
    pub fn with_detections(mut self, indices: impl IntoIterator<Item = u64>, pose: &NormalizedPose) -> Self {
        for index in indices {
            self.poses.insert(index, pose.clone());
        }
        self
    }

    /// Return an error when asked about frame `index`.
    pub fn failing_at(mut self, index: u64) -> Self {
        self.fail_at = Some(index);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PoseDetector for ScriptedPoseDetector {
    async fn detect(&self, frame: &Frame) -> MediaResult<Option<NormalizedPose>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_at == Some(frame.index) {
            return Err(MediaError::detector_failed(format!(
                "scripted failure at frame {}",
                frame.index
            )));
        }
        Ok(self.poses.get(&frame.index).cloned())
    }
}
