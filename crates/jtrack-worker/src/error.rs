//! Worker error types.

use thiserror::Error;

use jtrack_media::MediaError;

use crate::processor::Stage;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("{stage} stage failed: {source}")]
    StageFailed {
        stage: Stage,
        #[source]
        source: MediaError,
    },

    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Model error: {0}")]
    Model(#[from] jtrack_models::ModelError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn stage_failed(stage: Stage, source: MediaError) -> Self {
        Self::StageFailed { stage, source }
    }

    pub fn invalid_upload(msg: impl Into<String>) -> Self {
        Self::InvalidUpload(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// The stage that failed, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            WorkerError::StageFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Check if error is retryable.
    ///
    /// Transcoder failures and IO leave earlier artifacts intact, so a rerun
    /// resumes at the failed stage. Unreadable input and filter
    /// preconditions fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::StageFailed { source, .. } | WorkerError::Media(source) => {
                media_retryable(source)
            }
            WorkerError::Io(_) => true,
            _ => false,
        }
    }
}

fn media_retryable(err: &MediaError) -> bool {
    if err.is_input_error() {
        return false;
    }
    err.is_external_process_error()
        || matches!(err, MediaError::Io(_) | MediaError::DetectorFailed(_))
}
