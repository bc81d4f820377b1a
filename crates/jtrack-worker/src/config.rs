//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use jtrack_media::trajectory::{
    ButterworthLowPass, FilterConfig, PostProcessOptions, ShortTrajectoryPolicy,
};
use jtrack_media::ExtractOptions;
use jtrack_models::{EncodingConfig, GapPolicy};

use crate::error::{WorkerError, WorkerResult};

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root of the four artifact directories
    pub work_dir: PathBuf,
    /// Annotated output rate. `None` keeps the source rate.
    pub output_fps: Option<f64>,
    pub gap_policy: GapPolicy,
    pub filter: FilterConfig,
    pub short_policy: ShortTrajectoryPolicy,
    /// Delivery encoding
    pub encoding: EncodingConfig,
    /// Kill the transcoder after this long
    pub transcode_timeout: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            output_fps: None,
            gap_policy: GapPolicy::Skip,
            filter: FilterConfig::default(),
            short_policy: ShortTrajectoryPolicy::Passthrough,
            encoding: EncodingConfig::default(),
            transcode_timeout: None,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    ///
    /// Unset or unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let filter_defaults = FilterConfig::default();

        Self {
            work_dir: std::env::var("JTRACK_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            output_fps: env_parse::<f64>("JTRACK_OUTPUT_FPS").filter(|fps| *fps > 0.0),
            gap_policy: env_parse("JTRACK_GAP_POLICY").unwrap_or(defaults.gap_policy),
            filter: FilterConfig {
                cutoff_hz: env_parse("JTRACK_FILTER_CUTOFF_HZ").unwrap_or(filter_defaults.cutoff_hz),
                sample_rate_hz: env_parse("JTRACK_FILTER_SAMPLE_HZ")
                    .unwrap_or(filter_defaults.sample_rate_hz),
            },
            short_policy: env_parse("JTRACK_SHORT_POLICY").unwrap_or(defaults.short_policy),
            encoding: defaults.encoding,
            transcode_timeout: env_parse::<u64>("JTRACK_TRANSCODE_TIMEOUT")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        }
    }

    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    pub fn with_output_fps(mut self, fps: f64) -> Self {
        self.output_fps = Some(fps);
        self
    }

    pub fn with_gap_policy(mut self, policy: GapPolicy) -> Self {
        self.gap_policy = policy;
        self
    }

    pub fn with_short_policy(mut self, policy: ShortTrajectoryPolicy) -> Self {
        self.short_policy = policy;
        self
    }

    /// Reject settings no run could succeed with.
    pub fn validate(&self) -> WorkerResult<()> {
        if let Some(fps) = self.output_fps {
            if !fps.is_finite() || fps <= 0.0 {
                return Err(WorkerError::config_error(format!(
                    "output fps must be positive, got {}",
                    fps
                )));
            }
        }
        ButterworthLowPass::design(self.filter)
            .map_err(|e| WorkerError::config_error(e.to_string()))?;
        Ok(())
    }

    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            output_fps: self.output_fps,
            gap_policy: self.gap_policy,
        }
    }

    pub fn postprocess_options(&self) -> PostProcessOptions {
        PostProcessOptions {
            filter: self.filter,
            short_policy: self.short_policy,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}
