//! Artifact naming and on-disk layout.
//!
//! Every file a run produces lives under one of four stage directories and is
//! named after the run's [`ArtifactKey`].

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{ModelError, ModelResult};

/// Directory holding uploaded source videos.
pub const UPLOADED_VIDEOS_DIR: &str = "uploaded_videos";
/// Directory holding raw annotated videos.
pub const RAW_ANNOTATED_DIR: &str = "mediapose_mks";
/// Directory holding serialized trajectories.
pub const TRAJECTORY_DIR: &str = "tracker_csvs";
/// Directory holding filtered annotated videos.
pub const FILTERED_ANNOTATED_DIR: &str = "filtered_mks";

/// Container written by the frame writer.
pub const NATIVE_VIDEO_EXTENSION: &str = "avi";
/// Container produced by the transcoder for delivery.
pub const DELIVERY_VIDEO_EXTENSION: &str = "mp4";

/// Hex characters of the content hash kept in a key.
const CONTENT_HASH_LEN: usize = 12;

/// Namespace for every artifact of one logical upload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactKey(String);

impl ArtifactKey {
    /// Key scoped to both the upload name and its content.
    ///
    /// Re-uploading the same bytes under the same name yields the same key;
    /// different bytes under the same name do not collide.
    pub fn for_upload(base_name: &str, bytes: &[u8]) -> ModelResult<Self> {
        let stem = sanitized_stem(base_name)?;
        let digest = Sha256::digest(bytes);
        let hash: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        Ok(Self(format!("{}-{}", stem, &hash[..CONTENT_HASH_LEN])))
    }

    /// Key taken from the base name alone.
    pub fn from_base_name(base_name: &str) -> ModelResult<Self> {
        Ok(Self(sanitized_stem(base_name)?))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// File stem of an upload name: the part before the first dot, restricted
/// to `[A-Za-z0-9_-]`.
pub fn sanitized_stem(base_name: &str) -> ModelResult<String> {
    let file_name = Path::new(base_name.trim())
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");
    let stem = file_name.split('.').next().unwrap_or("");
    let sanitized: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.is_empty() {
        return Err(ModelError::InvalidArtifactName(base_name.to_string()));
    }
    Ok(sanitized)
}

/// Extension of an upload name, lowercased; defaults to `mp4`.
pub fn upload_extension(base_name: &str) -> String {
    Path::new(base_name.trim())
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| DELIVERY_VIDEO_EXTENSION.to_string())
}

/// Kinds of artifact a run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Upload,
    RawAnnotated,
    RawAnnotatedDelivery,
    Trajectory,
    FilteredAnnotated,
    FilteredAnnotatedDelivery,
    Manifest,
}

impl ArtifactKind {
    pub fn directory(&self) -> &'static str {
        match self {
            ArtifactKind::Upload => UPLOADED_VIDEOS_DIR,
            ArtifactKind::RawAnnotated | ArtifactKind::RawAnnotatedDelivery => RAW_ANNOTATED_DIR,
            ArtifactKind::Trajectory => TRAJECTORY_DIR,
            ArtifactKind::FilteredAnnotated
            | ArtifactKind::FilteredAnnotatedDelivery
            | ArtifactKind::Manifest => FILTERED_ANNOTATED_DIR,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Upload => "upload",
            ArtifactKind::RawAnnotated => "raw_annotated",
            ArtifactKind::RawAnnotatedDelivery => "raw_annotated_delivery",
            ArtifactKind::Trajectory => "trajectory",
            ArtifactKind::FilteredAnnotated => "filtered_annotated",
            ArtifactKind::FilteredAnnotatedDelivery => "filtered_annotated_delivery",
            ArtifactKind::Manifest => "manifest",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved paths for every artifact of one key under a work directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    pub key: ArtifactKey,
    pub upload: PathBuf,
    pub raw_annotated: PathBuf,
    pub raw_annotated_delivery: PathBuf,
    pub trajectory: PathBuf,
    pub filtered_annotated: PathBuf,
    pub filtered_annotated_delivery: PathBuf,
    pub manifest: PathBuf,
}

impl ArtifactPaths {
    /// Lay out artifact paths for `key`; `upload_extension` names the
    /// container of the uploaded source.
    pub fn new(work_dir: impl AsRef<Path>, key: &ArtifactKey, upload_extension: &str) -> Self {
        let root = work_dir.as_ref();
        let k = key.as_str();
        let at = |kind: ArtifactKind, file: String| root.join(kind.directory()).join(file);

        Self {
            key: key.clone(),
            upload: at(ArtifactKind::Upload, format!("{}.{}", k, upload_extension)),
            raw_annotated: at(
                ArtifactKind::RawAnnotated,
                format!("{}_joint_tracker.{}", k, NATIVE_VIDEO_EXTENSION),
            ),
            raw_annotated_delivery: at(
                ArtifactKind::RawAnnotatedDelivery,
                format!("{}_joint_tracker.{}", k, DELIVERY_VIDEO_EXTENSION),
            ),
            trajectory: at(ArtifactKind::Trajectory, format!("{}_joint_tracker.csv", k)),
            filtered_annotated: at(
                ArtifactKind::FilteredAnnotated,
                format!("{}_joint_tracker_filtered.{}", k, NATIVE_VIDEO_EXTENSION),
            ),
            filtered_annotated_delivery: at(
                ArtifactKind::FilteredAnnotatedDelivery,
                format!("{}_joint_tracker_filtered.{}", k, DELIVERY_VIDEO_EXTENSION),
            ),
            manifest: at(ArtifactKind::Manifest, format!("{}_manifest.json", k)),
        }
    }

    pub fn path(&self, kind: ArtifactKind) -> &Path {
        match kind {
            ArtifactKind::Upload => &self.upload,
            ArtifactKind::RawAnnotated => &self.raw_annotated,
            ArtifactKind::RawAnnotatedDelivery => &self.raw_annotated_delivery,
            ArtifactKind::Trajectory => &self.trajectory,
            ArtifactKind::FilteredAnnotated => &self.filtered_annotated,
            ArtifactKind::FilteredAnnotatedDelivery => &self.filtered_annotated_delivery,
            ArtifactKind::Manifest => &self.manifest,
        }
    }

    /// The four stage directories, deduplicated.
    pub fn directories(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = [
            &self.upload,
            &self.raw_annotated,
            &self.trajectory,
            &self.filtered_annotated,
        ]
        .iter()
        .filter_map(|p| p.parent().map(Path::to_path_buf))
        .collect();
        dirs.dedup();
        dirs
    }
}
