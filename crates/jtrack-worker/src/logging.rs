//! Structured run logging.

use tracing::{error, info, warn, Span};

use jtrack_models::ArtifactKey;

use crate::processor::Stage;

/// Logger carrying the artifact key of one pipeline run.
#[derive(Debug, Clone)]
pub struct RunLogger {
    key: String,
}

impl RunLogger {
    pub fn new(key: &ArtifactKey) -> Self {
        Self {
            key: key.to_string(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn log_start(&self, source: &str) {
        info!(key = %self.key, source, "Run started");
    }

    /// A stage produced its artifact.
    pub fn log_computed(&self, stage: Stage, elapsed_ms: u64) {
        info!(key = %self.key, stage = %stage, elapsed_ms, "Stage computed");
    }

    /// A stage found its artifact on disk.
    pub fn log_reused(&self, stage: Stage) {
        info!(key = %self.key, stage = %stage, "Reusing existing artifact");
    }

    pub fn log_warning(&self, stage: Stage, message: &str) {
        warn!(key = %self.key, stage = %stage, "{}", message);
    }

    pub fn log_failure(&self, stage: Stage, message: &str) {
        error!(key = %self.key, stage = %stage, "Stage failed: {}", message);
    }

    pub fn log_completion(&self, computed: usize, reused: usize) {
        info!(key = %self.key, computed, reused, "Run completed");
    }

    /// Span wrapping every stage of the run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("run", key = %self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_logger_key() {
        let key = ArtifactKey::for_upload("swing.mp4", b"bytes").unwrap();
        let logger = RunLogger::new(&key);
        assert_eq!(logger.key(), key.as_str());
        assert!(logger.key().starts_with("swing-"));
    }
}
