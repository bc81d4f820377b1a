//! Frame-landmark extraction.
//!
//! Decodes the source front to back, runs the detector on each frame,
//! accumulates the trajectory and writes an annotated copy of every frame.

use std::path::Path;
use std::time::Instant;

use tracing::{debug, info, warn};

use jtrack_models::{FrameLandmarks, GapPolicy, Trajectory};

use crate::detector::PoseDetector;
use crate::error::MediaResult;
use crate::fs_utils::{commit_file, discard_staging, ensure_parent, staging_path};
use crate::overlay::OverlayPlan;
use crate::video::{FrameSink, VideoBackend, VideoSpec};

/// Extraction settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    /// Annotated output rate; `None` keeps the source rate
    pub output_fps: Option<f64>,
    pub gap_policy: GapPolicy,
}

/// Result of an extraction pass.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub trajectory: Trajectory,
    pub frame_width: u32,
    pub frame_height: u32,
    /// Frames decoded and written to the annotated video
    pub frames: u64,
    /// Rate the annotated video was written at
    pub output_fps: f64,
}

/// Extract landmarks from `source` and write the raw-annotated video to
/// `annotated`.
///
/// An unreadable source fails before anything is written. Any later failure
/// discards the partial annotated video.
pub async fn extract_landmarks(
    backend: &dyn VideoBackend,
    detector: &dyn PoseDetector,
    source: &Path,
    annotated: &Path,
    options: ExtractOptions,
) -> MediaResult<Extraction> {
    let start = Instant::now();
    let mut frames = backend.open_source(source)?;
    let source_spec = frames.spec();
    let output_spec = source_spec.with_fps(options.output_fps.unwrap_or(source_spec.fps));

    info!(
        source = %source.display(),
        width = source_spec.width,
        height = source_spec.height,
        source_fps = source_spec.fps,
        output_fps = output_spec.fps,
        backend = backend.name(),
        "Extracting landmarks"
    );

    ensure_parent(annotated).await?;
    let staging = staging_path(annotated);
    let sink = backend.create_sink(&staging, output_spec)?;

    let result = run_extraction(frames.as_mut(), sink, detector, output_spec, options.gap_policy).await;

    match result {
        Ok((trajectory, count)) => {
            commit_file(&staging, annotated).await?;
            info!(
                frames = count,
                rows = trajectory.len(),
                detected = trajectory.detected_count(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Extraction complete"
            );
            if trajectory.detected_count() == 0 {
                warn!(source = %source.display(), "No pose detected in any frame");
            }
            Ok(Extraction {
                trajectory,
                frame_width: source_spec.width,
                frame_height: source_spec.height,
                frames: count,
                output_fps: output_spec.fps,
            })
        }
        Err(e) => {
            discard_staging(&staging).await;
            Err(e)
        }
    }
}

async fn run_extraction(
    frames: &mut dyn crate::video::FrameSource,
    mut sink: Box<dyn FrameSink>,
    detector: &dyn PoseDetector,
    spec: VideoSpec,
    gap_policy: GapPolicy,
) -> MediaResult<(Trajectory, u64)> {
    let mut trajectory = Trajectory::new();
    let mut count = 0u64;

    while let Some(frame) = frames.read_frame()? {
        let detection = detector
            .detect(&frame)
            .await?
            .map(|pose| FrameLandmarks::from_normalized(&pose, spec.width, spec.height));

        let mut plan = OverlayPlan::new();
        match &detection {
            Some(landmarks) => plan.raw_skeleton(landmarks),
            None => debug!(frame = frame.index, "No detection"),
        }
        plan.frame_label(frame.index, spec.width, spec.height);

        trajectory.record(detection, gap_policy);
        sink.write(&frame, &plan)?;
        count += 1;
    }

    sink.finish()?;
    Ok((trajectory, count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::ScriptedPoseDetector;
    use crate::error::MediaError;
    use crate::video::{MemoryClip, MemoryVideoBackend, RecordedVideo};
    use jtrack_models::{Joint, NormalizedLandmark, NormalizedPose, JOINT_COUNT};
    use tempfile::TempDir;

    fn pose() -> NormalizedPose {
        NormalizedPose::new(vec![NormalizedLandmark::new(0.25, 0.5, -0.2); JOINT_COUNT]).unwrap()
    }

    fn setup(frames: usize) -> (TempDir, MemoryVideoBackend, std::path::PathBuf) {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("clip.mp4");
        std::fs::write(&source, b"clip").unwrap();
        let backend = MemoryVideoBackend::new();
        backend.register(&source, MemoryClip::blank(400, 200, 30.0, frames));
        (dir, backend, source)
    }

    #[tokio::test]
    async fn test_denormalizes_detections() {
        let (dir, backend, source) = setup(2);
        let detector = ScriptedPoseDetector::new().with_detections([0, 1], &pose());
        let out = dir.path().join("raw.avi");

        let result = extract_landmarks(&backend, &detector, &source, &out, ExtractOptions::default())
            .await
            .unwrap();

        assert_eq!(result.trajectory.len(), 2);
        let first = result.trajectory.rows()[0].unwrap();
        let nose = first.get(Joint::Nose);
        assert_eq!((nose.x, nose.y, nose.z), (100.0, 100.0, -0.2));
        assert_eq!((result.frame_width, result.frame_height), (400, 200));
        assert_eq!(result.output_fps, 30.0);
    }

    #[tokio::test]
    async fn test_gaps_skip_or_mark() {
        let (dir, backend, source) = setup(5);
        let detector = ScriptedPoseDetector::new().with_detections([1, 3], &pose());
        let out = dir.path().join("raw.avi");

        let skipped = extract_landmarks(&backend, &detector, &source, &out, ExtractOptions::default())
            .await
            .unwrap();
        assert_eq!(skipped.trajectory.len(), 2);
        assert_eq!(skipped.frames, 5);

        let options = ExtractOptions {
            gap_policy: GapPolicy::MarkMissing,
            ..Default::default()
        };
        let marked = extract_landmarks(&backend, &detector, &source, &out, options)
            .await
            .unwrap();
        assert_eq!(marked.trajectory.len(), 5);
        assert_eq!(marked.trajectory.detected_count(), 2);
        assert!(marked.trajectory.rows()[0].is_none());
    }

    #[tokio::test]
    async fn test_annotated_video_has_every_frame() {
        let (dir, backend, source) = setup(3);
        let detector = ScriptedPoseDetector::new().with_detections([2], &pose());
        let out = dir.path().join("mediapose_mks").join("raw.avi");

        let options = ExtractOptions {
            output_fps: Some(10.0),
            ..Default::default()
        };
        extract_landmarks(&backend, &detector, &source, &out, options)
            .await
            .unwrap();

        let recorded = RecordedVideo::load(&out).unwrap();
        assert_eq!(recorded.spec.fps, 10.0);
        assert_eq!(recorded.frames.len(), 3);
        assert_eq!(recorded.annotated_frames(), 1);
        assert_eq!(recorded.frames[1].label.as_deref(), Some("Frame-1"));
        assert!(recorded.frames[2].drawn_pixels > 0);
        assert!(!staging_path(&out).exists());
    }

    #[tokio::test]
    async fn test_unreadable_source_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("broken.mp4");
        std::fs::write(&source, b"junk").unwrap();
        let out = dir.path().join("raw.avi");

        let err = extract_landmarks(
            &MemoryVideoBackend::new(),
            &ScriptedPoseDetector::new(),
            &source,
            &out,
            ExtractOptions::default(),
        )
        .await
        .unwrap_err();

        assert!(err.is_input_error());
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn test_detector_failure_discards_output() {
        let (dir, backend, source) = setup(4);
        let detector = ScriptedPoseDetector::new().failing_at(2);
        let out = dir.path().join("raw.avi");

        let err = extract_landmarks(&backend, &detector, &source, &out, ExtractOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::DetectorFailed(_)));
        assert!(!out.exists());
        assert!(!staging_path(&out).exists());
    }
}
