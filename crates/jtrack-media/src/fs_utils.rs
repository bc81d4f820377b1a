//! Atomic artifact writes.
//!
//! Every artifact is produced at a staging path next to its final location
//! and renamed into place once complete, so a final path never holds a
//! partially written file.

use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::MediaResult;

/// Staging path for `target`: a hidden sibling that keeps the extension, so
/// container-sniffing writers still pick the right format.
///
/// `out/a_joint_tracker.avi` stages at `out/.a_joint_tracker.partial.avi`.
pub fn staging_path(target: &Path) -> PathBuf {
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = match target.extension() {
        Some(ext) => format!(".{}.partial.{}", stem, ext.to_string_lossy()),
        None => format!(".{}.partial", stem),
    };
    target.with_file_name(name)
}

/// Make sure the parent directory of `path` exists.
pub async fn ensure_parent(path: &Path) -> MediaResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}

/// Promote a finished staging file to its final path.
///
/// The staging file is a sibling of `target`, so this is a same-directory
/// rename and replaces any existing file.
pub async fn commit_file(staging: &Path, target: &Path) -> MediaResult<()> {
    fs::rename(staging, target).await?;
    tracing::debug!(path = %target.display(), "Committed artifact");
    Ok(())
}

/// Remove a staging file left behind by a failed stage. Best effort.
pub async fn discard_staging(staging: &Path) {
    if let Err(e) = fs::remove_file(staging).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(
                path = %staging.display(),
                error = %e,
                "Failed to remove staging file"
            );
        }
    }
}

/// Write `bytes` to `target` through a staging file.
pub async fn write_atomic(target: &Path, bytes: &[u8]) -> MediaResult<()> {
    ensure_parent(target).await?;
    let staging = staging_path(target);
    if let Err(e) = fs::write(&staging, bytes).await {
        discard_staging(&staging).await;
        return Err(e.into());
    }
    commit_file(&staging, target).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_staging_path_keeps_extension() {
        let staged = staging_path(Path::new("out/run_joint_tracker.avi"));
        assert_eq!(staged, PathBuf::from("out/.run_joint_tracker.partial.avi"));

        let bare = staging_path(Path::new("out/manifest"));
        assert_eq!(bare, PathBuf::from("out/.manifest.partial"));
    }

    #[tokio::test]
    async fn test_write_atomic_creates_parent() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("tracker_csvs").join("a.csv");

        write_atomic(&target, b"nose_x\n1\n").await.unwrap();

        assert_eq!(fs::read_to_string(&target).await.unwrap(), "nose_x\n1\n");
        assert!(!staging_path(&target).exists());
    }

    #[tokio::test]
    async fn test_commit_overwrites_destination() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("dest.txt");
        let staging = staging_path(&target);

        fs::write(&staging, b"new content").await.unwrap();
        fs::write(&target, b"old content").await.unwrap();

        commit_file(&staging, &target).await.unwrap();

        assert!(!staging.exists());
        assert_eq!(fs::read_to_string(&target).await.unwrap(), "new content");
    }

    #[tokio::test]
    async fn test_discard_missing_staging_is_quiet() {
        let dir = TempDir::new().unwrap();
        discard_staging(&dir.path().join(".nothing.partial")).await;
    }
}
