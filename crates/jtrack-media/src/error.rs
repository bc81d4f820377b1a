//! Error types for media and trajectory operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while extracting, filtering or rendering.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Source video unreadable: {path}: {reason}")]
    SourceUnreadable { path: PathBuf, reason: String },

    #[error("Video backend error: {0}")]
    VideoBackend(String),

    #[error("Pose detection failed: {0}")]
    DetectorFailed(String),

    #[error("Trajectory has {rows} rows, filter needs at least {required}")]
    TrajectoryTooShort { rows: usize, required: usize },

    #[error("Invalid filter design: {0}")]
    InvalidFilter(String),

    #[error("Table schema error: {0}")]
    Schema(String),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Model error: {0}")]
    Model(#[from] jtrack_models::ModelError),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create an unreadable-source error.
    pub fn source_unreadable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::SourceUnreadable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn video_backend(message: impl Into<String>) -> Self {
        Self::VideoBackend(message.into())
    }

    pub fn detector_failed(message: impl Into<String>) -> Self {
        Self::DetectorFailed(message.into())
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }

    /// Input errors: the source cannot be decoded at all.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            MediaError::SourceUnreadable { .. } | MediaError::FileNotFound(_)
        )
    }

    /// External process errors from the transcoder.
    pub fn is_external_process_error(&self) -> bool {
        matches!(
            self,
            MediaError::FfmpegFailed { .. }
                | MediaError::FfmpegNotFound
                | MediaError::FfprobeFailed { .. }
                | MediaError::FfprobeNotFound
                | MediaError::Timeout(_)
        )
    }
}
