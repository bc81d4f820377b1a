//! FFmpeg progress parsing.

use serde::{Deserialize, Serialize};

/// Progress information from FFmpeg.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Frames written so far
    pub frame: u64,
    /// Current encode FPS
    pub fps: f64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Output time as string (HH:MM:SS.microseconds)
    pub out_time: String,
    /// Encoding speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Progress percentage against a known total duration in seconds.
    ///
    /// Returns `None` when the duration is unknown.
    pub fn percentage(&self, total_duration_secs: Option<f64>) -> Option<f64> {
        let total_ms = total_duration_secs? * 1000.0;
        if total_ms <= 0.0 {
            return None;
        }
        if self.is_complete {
            return Some(100.0);
        }
        Some(((self.out_time_ms as f64 / total_ms) * 100.0).clamp(0.0, 100.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_percentage() {
        let progress = FfmpegProgress {
            out_time_ms: 5000,
            ..Default::default()
        };

        assert!((progress.percentage(Some(10.0)).unwrap() - 50.0).abs() < 0.01);
        assert!((progress.percentage(Some(2.0)).unwrap() - 100.0).abs() < 0.01);
        assert!(progress.percentage(None).is_none());
        assert!(progress.percentage(Some(0.0)).is_none());
    }

    #[test]
    fn test_complete_is_full() {
        let progress = FfmpegProgress {
            is_complete: true,
            ..Default::default()
        };
        assert_eq!(progress.percentage(Some(30.0)), Some(100.0));
    }
}
