#![deny(unreachable_patterns)]
//! Video and trajectory processing for the jtrack pipeline.
//!
//! This crate provides:
//! - Sequential video decode/encode behind [`VideoBackend`] (OpenCV or in-memory)
//! - Pose detection behind [`PoseDetector`], with an HTTP service client
//! - Landmark extraction with a raw skeleton overlay
//! - Trajectory tables, CSV persistence and zero-phase filtering
//! - Filtered-overlay rendering
//! - FFmpeg delivery transcoding with progress parsing
//! - Atomic artifact writes

pub mod command;
pub mod detector;
pub mod error;
pub mod extract;
pub mod fs_utils;
pub mod overlay;
pub mod probe;
pub mod progress;
pub mod render;
pub mod trajectory;
pub mod transcode;
pub mod video;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use detector::{PoseDetector, PoseServiceClient, PoseServiceConfig, ScriptedPoseDetector};
pub use error::{MediaError, MediaResult};
pub use extract::{extract_landmarks, ExtractOptions, Extraction};
pub use overlay::{DrawOp, OverlayPlan};
pub use probe::{probe_video, VideoInfo};
pub use progress::FfmpegProgress;
pub use render::render_filtered;
pub use trajectory::{
    FilterConfig, PostProcessOptions, ShortTrajectoryPolicy, Table,
};
pub use transcode::{CopyTranscoder, FfmpegTranscoder, TranscodeOutcome, Transcoder};
pub use video::{Frame, FrameSink, FrameSource, MemoryClip, MemoryVideoBackend, VideoBackend, VideoSpec};
#[cfg(feature = "opencv")]
pub use video::OpenCvBackend;
