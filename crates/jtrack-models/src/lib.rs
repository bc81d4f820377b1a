//! Shared schema models for the jtrack pipeline.
//!
//! This crate provides:
//! - The fixed 33-joint ordering and column naming
//! - The skeleton connectivity graph
//! - Per-frame landmark records and the per-video trajectory
//! - Artifact keys, kinds and on-disk layout
//! - Encoding settings and the run manifest

pub mod artifact;
pub mod encoding;
pub mod error;
pub mod joint;
pub mod landmarks;
pub mod manifest;
pub mod skeleton;
pub mod trajectory;

// Re-export common types
pub use artifact::{ArtifactKey, ArtifactKind, ArtifactPaths};
pub use encoding::EncodingConfig;
pub use error::{ModelError, ModelResult};
pub use joint::{
    filtered_column_name, is_vertical_column, raw_columns, Axis, Joint, FILTERED_SUFFIX,
    FRAMES_COLUMN, JOINT_COUNT, RAW_COLUMN_COUNT,
};
pub use landmarks::{FrameLandmarks, JointPosition, NormalizedLandmark, NormalizedPose};
pub use manifest::RunManifest;
pub use skeleton::POSE_CONNECTIONS;
pub use trajectory::{GapPolicy, Trajectory};
