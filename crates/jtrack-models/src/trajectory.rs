//! Per-video joint trajectory.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::landmarks::FrameLandmarks;

/// How frames without a detection are represented in the trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GapPolicy {
    /// Frames without a subject contribute no row (sparse trajectory).
    #[default]
    Skip,
    /// Every decoded frame contributes a row; undetected frames are marked
    /// missing so row index equals frame index.
    MarkMissing,
}

impl GapPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            GapPolicy::Skip => "skip",
            GapPolicy::MarkMissing => "mark_missing",
        }
    }
}

impl fmt::Display for GapPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GapPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "skip" => Ok(GapPolicy::Skip),
            "mark" | "mark_missing" | "missing" => Ok(GapPolicy::MarkMissing),
            other => Err(format!("unknown gap policy: {}", other)),
        }
    }
}

/// Ordered per-frame records for one video.
///
/// A `None` row is an explicit missing-data marker and only appears under
/// [`GapPolicy::MarkMissing`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Trajectory {
    rows: Vec<Option<FrameLandmarks>>,
}

impl Trajectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<Option<FrameLandmarks>>) -> Self {
        Self { rows }
    }

    pub fn push_detected(&mut self, frame: FrameLandmarks) {
        self.rows.push(Some(frame));
    }

    pub fn push_missing(&mut self) {
        self.rows.push(None);
    }

    /// Record the outcome of one decoded frame under the given policy.
    pub fn record(&mut self, detection: Option<FrameLandmarks>, policy: GapPolicy) {
        match (detection, policy) {
            (Some(frame), _) => self.push_detected(frame),
            (None, GapPolicy::MarkMissing) => self.push_missing(),
            (None, GapPolicy::Skip) => {}
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of rows that carry a detection.
    pub fn detected_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_some()).count()
    }

    pub fn rows(&self) -> &[Option<FrameLandmarks>] {
        &self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joint::JOINT_COUNT;
    use crate::landmarks::JointPosition;

    fn frame() -> FrameLandmarks {
        FrameLandmarks::new([JointPosition::new(1.0, 2.0, 0.0); JOINT_COUNT])
    }

    #[test]
    fn test_skip_policy_drops_gaps() {
        let mut t = Trajectory::new();
        t.record(Some(frame()), GapPolicy::Skip);
        t.record(None, GapPolicy::Skip);
        t.record(Some(frame()), GapPolicy::Skip);
        assert_eq!(t.len(), 2);
        assert_eq!(t.detected_count(), 2);
    }

    #[test]
    fn test_mark_missing_keeps_alignment() {
        let mut t = Trajectory::new();
        t.record(Some(frame()), GapPolicy::MarkMissing);
        t.record(None, GapPolicy::MarkMissing);
        assert_eq!(t.len(), 2);
        assert_eq!(t.detected_count(), 1);
        assert!(t.rows()[1].is_none());
    }

    #[test]
    fn test_gap_policy_parsing() {
        assert_eq!("skip".parse::<GapPolicy>().unwrap(), GapPolicy::Skip);
        assert_eq!("MARK".parse::<GapPolicy>().unwrap(), GapPolicy::MarkMissing);
        assert!("zero".parse::<GapPolicy>().is_err());
    }
}
