//! Run manifest written after a pipeline run completes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::artifact::{ArtifactKey, ArtifactPaths};
use crate::trajectory::GapPolicy;

/// Summary of a completed run and the artifacts it left behind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub key: ArtifactKey,
    /// Name the upload was submitted under
    pub base_name: String,
    pub source: PathBuf,
    pub raw_annotated: PathBuf,
    pub raw_annotated_delivery: PathBuf,
    pub trajectory: PathBuf,
    pub filtered_annotated: PathBuf,
    pub filtered_annotated_delivery: PathBuf,
    /// Rows in the trajectory table
    pub rows: usize,
    /// Rows that carry a detection
    pub detected_frames: usize,
    pub frame_width: u32,
    pub frame_height: u32,
    pub output_fps: f64,
    pub gap_policy: GapPolicy,
    pub completed_at: DateTime<Utc>,
}

impl RunManifest {
    /// Manifest stamped with the current time.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        base_name: impl Into<String>,
        paths: &ArtifactPaths,
        rows: usize,
        detected_frames: usize,
        frame_width: u32,
        frame_height: u32,
        output_fps: f64,
        gap_policy: GapPolicy,
    ) -> Self {
        Self {
            key: paths.key.clone(),
            base_name: base_name.into(),
            source: paths.upload.clone(),
            raw_annotated: paths.raw_annotated.clone(),
            raw_annotated_delivery: paths.raw_annotated_delivery.clone(),
            trajectory: paths.trajectory.clone(),
            filtered_annotated: paths.filtered_annotated.clone(),
            filtered_annotated_delivery: paths.filtered_annotated_delivery.clone(),
            rows,
            detected_frames,
            frame_width,
            frame_height,
            output_fps,
            gap_policy,
            completed_at: Utc::now(),
        }
    }
}
