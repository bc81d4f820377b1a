//! Pipeline metrics.
//!
//! Recorded through the `metrics` facade. No recorder is installed here, so
//! these are no-ops unless the host process installs one.

use metrics::{counter, histogram};

use crate::processor::{Stage, StageOutcome};

/// Metric names as constants for consistency.
pub mod names {
    pub const STAGE_TOTAL: &str = "jtrack_stage_total";
    pub const STAGE_DURATION_SECONDS: &str = "jtrack_stage_duration_seconds";
    pub const RUNS_FAILED_TOTAL: &str = "jtrack_runs_failed_total";
}

/// Record one stage result.
pub fn record_stage(stage: Stage, outcome: StageOutcome, duration_secs: f64) {
    let labels = [
        ("stage", stage.as_str().to_string()),
        ("outcome", outcome.as_str().to_string()),
    ];
    counter!(names::STAGE_TOTAL, &labels).increment(1);

    if outcome == StageOutcome::Computed {
        let labels = [("stage", stage.as_str().to_string())];
        histogram!(names::STAGE_DURATION_SECONDS, &labels).record(duration_secs);
    }
}

/// Record a failed run.
pub fn record_run_failed(stage: Stage) {
    let labels = [("stage", stage.as_str().to_string())];
    counter!(names::RUNS_FAILED_TOTAL, &labels).increment(1);
}
