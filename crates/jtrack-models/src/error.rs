//! Error types for schema models.

use thiserror::Error;

/// Result type for model construction.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised when building schema values from untrusted input.
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("Unknown joint name: {0}")]
    UnknownJoint(String),

    #[error("Joint index {0} out of range")]
    JointIndexOutOfRange(usize),

    #[error("Expected {expected} landmarks, got {actual}")]
    LandmarkCount { expected: usize, actual: usize },

    #[error("Invalid artifact name: {0}")]
    InvalidArtifactName(String),
}
