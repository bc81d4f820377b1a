//! Joint-tracking pipeline worker.
//!
//! This crate provides:
//! - Sequential stage orchestration with per-stage artifact reuse
//! - Content-scoped upload storage
//! - Pipeline configuration from the environment
//! - Structured run logging and stage metrics

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod processor;

pub use config::PipelineConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::RunLogger;
pub use processor::{
    PipelineOutput, PipelineProcessor, Stage, StageOutcome, StageReport, UploadedVideo,
};
