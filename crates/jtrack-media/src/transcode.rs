//! Delivery transcoding of annotated videos.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use jtrack_models::EncodingConfig;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{commit_file, discard_staging, ensure_parent, staging_path};
use crate::probe::probe_video;

/// Whether a transcode produced a new file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscodeOutcome {
    Transcoded,
    /// Target already existed
    Skipped,
}

/// Converts a native annotated video into its delivery format.
///
/// Implementations skip when `dst` exists, never leave a partial file at
/// `dst` and leave `src` untouched.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(&self, src: &Path, dst: &Path) -> MediaResult<TranscodeOutcome>;
}

/// FFmpeg CLI transcoder (H.264, yuv420p, no audio).
#[derive(Debug, Clone, Default)]
pub struct FfmpegTranscoder {
    runner: FfmpegRunner,
    encoding: EncodingConfig,
}

impl FfmpegTranscoder {
    pub fn new(encoding: EncodingConfig) -> Self {
        Self {
            runner: FfmpegRunner::new(),
            encoding,
        }
    }

    /// Kill FFmpeg after `secs`.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.runner = self.runner.with_timeout(secs);
        self
    }

    pub fn command(&self, src: &Path, dst: &Path) -> FfmpegCommand {
        FfmpegCommand::new(src, dst).encoding(&self.encoding)
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, src: &Path, dst: &Path) -> MediaResult<TranscodeOutcome> {
        if dst.exists() {
            info!(dst = %dst.display(), "Reusing existing delivery video");
            return Ok(TranscodeOutcome::Skipped);
        }
        if !src.exists() {
            return Err(MediaError::FileNotFound(src.to_path_buf()));
        }

        // Only used for progress reporting
        let duration = probe_video(src)
            .await
            .ok()
            .map(|info| info.duration)
            .filter(|d| *d > 0.0);

        ensure_parent(dst).await?;
        let staging = staging_path(dst);
        let cmd = self.command(src, &staging);

        info!(src = %src.display(), dst = %dst.display(), "Transcoding");

        let reported = Arc::new(AtomicU64::new(0));
        let result = self
            .runner
            .run_with_progress(&cmd, move |progress| {
                let Some(pct) = progress.percentage(duration) else {
                    debug!(frame = progress.frame, "Transcode progress");
                    return;
                };
                // Log every 25%
                let step = (pct / 25.0).floor() as u64;
                if step > reported.fetch_max(step, Ordering::Relaxed) {
                    info!(percent = pct.round() as u64, "Transcode progress");
                }
            })
            .await;

        match result {
            Ok(()) => {
                commit_file(&staging, dst).await?;
                Ok(TranscodeOutcome::Transcoded)
            }
            Err(e) => {
                discard_staging(&staging).await;
                Err(e)
            }
        }
    }
}

/// Transcoder that copies bytes unchanged. For callers whose native format
/// is already deliverable, and for tests without FFmpeg.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyTranscoder;

#[async_trait]
impl Transcoder for CopyTranscoder {
    async fn transcode(&self, src: &Path, dst: &Path) -> MediaResult<TranscodeOutcome> {
        if dst.exists() {
            return Ok(TranscodeOutcome::Skipped);
        }
        let bytes = tokio::fs::read(src).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => MediaError::FileNotFound(src.to_path_buf()),
            _ => MediaError::Io(e),
        })?;
        crate::fs_utils::write_atomic(dst, &bytes).await?;
        Ok(TranscodeOutcome::Transcoded)
    }
}
