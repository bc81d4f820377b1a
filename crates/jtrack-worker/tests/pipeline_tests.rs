//! End-to-end pipeline runs against the in-memory video backend.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use jtrack_media::trajectory::{read_table, ShortTrajectoryPolicy};
use jtrack_media::video::RecordedVideo;
use jtrack_media::{
    CopyTranscoder, MediaError, MediaResult, MemoryClip, MemoryVideoBackend, ScriptedPoseDetector,
    TranscodeOutcome, Transcoder,
};
use jtrack_models::{
    raw_columns, GapPolicy, NormalizedLandmark, NormalizedPose, FRAMES_COLUMN, JOINT_COUNT,
    POSE_CONNECTIONS,
};
use jtrack_worker::{PipelineConfig, PipelineProcessor, Stage, StageOutcome, WorkerError};

const WIDTH: u32 = 160;
const HEIGHT: u32 = 120;

fn standing_pose() -> NormalizedPose {
    let landmarks = (0..JOINT_COUNT)
        .map(|j| NormalizedLandmark::new(0.2 + 0.015 * j as f64, 0.1 + 0.02 * j as f64, -0.1))
        .collect();
    NormalizedPose::new(landmarks).unwrap()
}

/// Fails its first call the way a crashed ffmpeg would, then copies.
#[derive(Default)]
struct FlakyTranscoder {
    failed: AtomicBool,
}

#[async_trait]
impl Transcoder for FlakyTranscoder {
    async fn transcode(&self, src: &Path, dst: &Path) -> MediaResult<TranscodeOutcome> {
        if !self.failed.swap(true, Ordering::SeqCst) {
            return Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                None,
                Some(1),
            ));
        }
        CopyTranscoder.transcode(src, dst).await
    }
}

struct Harness {
    dir: TempDir,
    backend: MemoryVideoBackend,
    processor: PipelineProcessor,
}

fn harness(frames: usize, detected: &[u64], config: PipelineConfig) -> Harness {
    let dir = TempDir::new().unwrap();
    let backend =
        MemoryVideoBackend::new().with_default_clip(MemoryClip::blank(WIDTH, HEIGHT, 30.0, frames));
    let detector =
        ScriptedPoseDetector::new().with_detections(detected.iter().copied(), &standing_pose());
    let processor = PipelineProcessor::new(
        config.with_work_dir(dir.path()),
        Arc::new(backend.clone()),
        Arc::new(detector),
    )
    .with_transcoder(Arc::new(CopyTranscoder));

    Harness {
        dir,
        backend,
        processor,
    }
}

#[tokio::test]
async fn test_no_detection_produces_empty_trajectory() {
    let h = harness(30, &[], PipelineConfig::default());

    let output = h.processor.run_upload(b"empty swing", "swing.mp4").await.unwrap();

    let raw = RecordedVideo::load(&output.paths.raw_annotated).unwrap();
    assert_eq!(raw.frames.len(), 30);
    assert_eq!(raw.annotated_frames(), 0);
    assert_eq!(raw.frames[29].label.as_deref(), Some("Frame-29"));

    let table = read_table(output.trajectory()).await.unwrap();
    assert_eq!(table.row_count(), 0);
    assert!(table.has_column(FRAMES_COLUMN));

    let filtered = RecordedVideo::load(output.delivery_video()).unwrap();
    assert!(filtered.frames.is_empty());

    let manifest = output.manifest.unwrap();
    assert_eq!(manifest.rows, 0);
    assert_eq!(manifest.detected_frames, 0);
    assert_eq!(manifest.frame_height, HEIGHT);
}

#[tokio::test]
async fn test_full_detection() {
    let h = harness(10, &(0..10).collect::<Vec<_>>(), PipelineConfig::default());

    let output = h.processor.run_upload(b"full swing", "swing.mp4").await.unwrap();
    assert_eq!(output.computed_count(), Stage::ALL.len());

    let table = output.read_trajectory().await.unwrap();
    assert_eq!(table.row_count(), 10);
    let frames: Vec<u64> = match &table.column(FRAMES_COLUMN).unwrap().data {
        jtrack_media::trajectory::ColumnData::Index(values) => values.clone(),
        other => panic!("frames column is not an index: {:?}", other),
    };
    assert_eq!(frames, (1..=10).collect::<Vec<u64>>());

    // raw columns, then filtered, then frames
    let names: Vec<&str> = table.column_names().collect();
    assert_eq!(names.len(), 2 * raw_columns().len() + 1);
    assert_eq!(names[0], "nose_x");
    assert_eq!(names[raw_columns().len()], "nose_x_filt");

    // nose y = 0.1 * HEIGHT in image space, re-origined to bottom-left
    let nose_y = table.float("nose_y").unwrap();
    assert!((nose_y[0] - (HEIGHT as f64 - 0.1 * HEIGHT as f64)).abs() < 1e-9);

    let filtered = RecordedVideo::load(&output.paths.filtered_annotated).unwrap();
    assert_eq!(filtered.frames.len(), 10);
    assert!(filtered
        .frames
        .iter()
        .all(|f| f.lines == POSE_CONNECTIONS.len()));

    let manifest = output.manifest.as_ref().unwrap();
    assert_eq!(manifest.detected_frames, 10);
    assert_eq!(manifest.output_fps, 30.0);
}

#[tokio::test]
async fn test_partial_detection_skips_gaps() {
    let h = harness(5, &[0, 2, 4], PipelineConfig::default());

    let output = h.processor.run_upload(b"partial swing", "swing.mp4").await.unwrap();

    let table = output.read_trajectory().await.unwrap();
    assert_eq!(table.row_count(), 3);

    let raw = RecordedVideo::load(&output.paths.raw_annotated).unwrap();
    assert_eq!(raw.frames.len(), 5);
    assert_eq!(raw.annotated_frames(), 3);

    // the renderer stops when the rows run out
    let filtered = RecordedVideo::load(output.delivery_video()).unwrap();
    assert_eq!(filtered.frames.len(), 3);
}

#[tokio::test]
async fn test_mark_missing_keeps_frame_alignment() {
    let config = PipelineConfig::default().with_gap_policy(GapPolicy::MarkMissing);
    let h = harness(5, &[0, 2, 4], config);

    let output = h.processor.run_upload(b"partial swing", "swing.mp4").await.unwrap();

    let table = output.read_trajectory().await.unwrap();
    assert_eq!(table.row_count(), 5);
    assert!(table.float("nose_x").unwrap()[1].is_nan());

    let filtered = RecordedVideo::load(output.delivery_video()).unwrap();
    assert_eq!(filtered.frames.len(), 5);
    assert_eq!(filtered.frames[1].lines, 0);
    assert_eq!(filtered.frames[2].lines, POSE_CONNECTIONS.len());

    let manifest = output.manifest.unwrap();
    assert_eq!(manifest.rows, 5);
    assert_eq!(manifest.detected_frames, 3);
    assert_eq!(manifest.gap_policy, GapPolicy::MarkMissing);
}

#[tokio::test]
async fn test_second_run_reuses_everything() {
    let h = harness(12, &(0..12).collect::<Vec<_>>(), PipelineConfig::default());

    let first = h.processor.run_upload(b"swing bytes", "swing.mp4").await.unwrap();
    let sinks = h.backend.sinks_created();
    let sources = h.backend.sources_opened();
    let delivered = first.read_delivery_bytes().await.unwrap();

    let second = h.processor.run_upload(b"swing bytes", "swing.mp4").await.unwrap();

    assert!(second.is_fully_reused());
    assert_eq!(second.reused_count(), Stage::ALL.len());
    assert_eq!(second.delivery_video(), first.delivery_video());
    assert_eq!(second.read_delivery_bytes().await.unwrap(), delivered);
    assert_eq!(second.manifest, first.manifest);
    assert_eq!(h.backend.sinks_created(), sinks);
    assert_eq!(h.backend.sources_opened(), sources);
}

#[tokio::test]
async fn test_resumes_after_lost_outputs() {
    let h = harness(12, &(0..12).collect::<Vec<_>>(), PipelineConfig::default());
    let upload = h.processor.store_upload(b"swing bytes", "swing.mp4").await.unwrap();
    let first = h.processor.process(&upload).await.unwrap();

    std::fs::remove_file(&first.paths.filtered_annotated).unwrap();
    std::fs::remove_file(&first.paths.filtered_annotated_delivery).unwrap();

    let second = h.processor.process(&upload).await.unwrap();
    assert_eq!(second.outcome(Stage::Extract), Some(StageOutcome::Reused));
    assert_eq!(second.outcome(Stage::Serialize), Some(StageOutcome::Reused));
    assert_eq!(second.outcome(Stage::PostProcess), Some(StageOutcome::Reused));
    assert_eq!(second.outcome(Stage::Render), Some(StageOutcome::Computed));
    assert_eq!(second.outcome(Stage::TranscodeRaw), Some(StageOutcome::Reused));
    assert_eq!(
        second.outcome(Stage::TranscodeFiltered),
        Some(StageOutcome::Computed)
    );

    // post-processing was not applied twice
    let table = second.read_trajectory().await.unwrap();
    assert_eq!(table.row_count(), 12);
    assert_eq!(table.column_names().count(), 2 * raw_columns().len() + 1);
}

#[tokio::test]
async fn test_same_name_different_bytes_do_not_collide() {
    let h = harness(4, &[0, 1, 2, 3], PipelineConfig::default());

    let a = h.processor.store_upload(b"first take", "swing.mp4").await.unwrap();
    let b = h.processor.store_upload(b"second take", "swing.mp4").await.unwrap();
    let again = h.processor.store_upload(b"first take", "swing.mp4").await.unwrap();

    assert_ne!(a.key, b.key);
    assert_eq!(a, again);
    assert!(a.path.starts_with(h.dir.path().join("uploaded_videos")));
    assert_eq!(std::fs::read(&b.path).unwrap(), b"second take");
}

#[tokio::test]
async fn test_strict_filter_rejects_short_trajectory() {
    let config = PipelineConfig::default().with_short_policy(ShortTrajectoryPolicy::Fail);
    let h = harness(5, &[0, 2, 4], config);

    let err = h
        .processor
        .run_upload(b"partial swing", "swing.mp4")
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Some(Stage::PostProcess));
    assert!(matches!(
        err,
        WorkerError::StageFailed {
            source: MediaError::TrajectoryTooShort { rows: 3, .. },
            ..
        }
    ));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_detector_failure_leaves_no_partial_video() {
    let dir = TempDir::new().unwrap();
    let backend =
        MemoryVideoBackend::new().with_default_clip(MemoryClip::blank(WIDTH, HEIGHT, 30.0, 6));
    let detector = ScriptedPoseDetector::new()
        .with_detections(0..6, &standing_pose())
        .failing_at(3);
    let processor = PipelineProcessor::new(
        PipelineConfig::default().with_work_dir(dir.path()),
        Arc::new(backend),
        Arc::new(detector),
    )
    .with_transcoder(Arc::new(CopyTranscoder));

    let upload = processor.store_upload(b"swing", "swing.mp4").await.unwrap();
    let err = processor.process(&upload).await.unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Extract));
    let paths = upload.paths(dir.path());
    assert!(!paths.raw_annotated.exists());
    assert!(!paths.trajectory.exists());
    let leftovers: Vec<_> = std::fs::read_dir(paths.raw_annotated.parent().unwrap())
        .unwrap()
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn test_empty_upload_is_rejected() {
    let h = harness(1, &[], PipelineConfig::default());
    let err = h.processor.store_upload(b"", "swing.mp4").await.unwrap_err();
    assert!(matches!(err, WorkerError::InvalidUpload(_)));
}

#[tokio::test]
async fn test_transcode_failure_is_retryable_and_resumes() {
    let dir = TempDir::new().unwrap();
    let backend =
        MemoryVideoBackend::new().with_default_clip(MemoryClip::blank(WIDTH, HEIGHT, 30.0, 8));
    let detector = ScriptedPoseDetector::new().with_detections(0..8, &standing_pose());
    let processor = PipelineProcessor::new(
        PipelineConfig::default().with_work_dir(dir.path()),
        Arc::new(backend.clone()),
        Arc::new(detector),
    )
    .with_transcoder(Arc::new(FlakyTranscoder::default()));

    let upload = processor.store_upload(b"swing", "swing.mp4").await.unwrap();
    let err = processor.process(&upload).await.unwrap_err();

    assert_eq!(err.stage(), Some(Stage::TranscodeRaw));
    assert!(err.is_retryable());
    let paths = upload.paths(dir.path());
    assert!(paths.raw_annotated.exists());
    assert!(paths.filtered_annotated.exists());
    assert!(!paths.raw_annotated_delivery.exists());
    assert!(!paths.manifest.exists());

    let sinks = backend.sinks_created();
    let output = processor.process(&upload).await.unwrap();
    assert_eq!(output.outcome(Stage::Extract), Some(StageOutcome::Reused));
    assert_eq!(output.outcome(Stage::PostProcess), Some(StageOutcome::Reused));
    assert_eq!(output.outcome(Stage::Render), Some(StageOutcome::Reused));
    assert_eq!(output.outcome(Stage::TranscodeRaw), Some(StageOutcome::Computed));
    assert_eq!(
        output.outcome(Stage::TranscodeFiltered),
        Some(StageOutcome::Computed)
    );
    assert_eq!(backend.sinks_created(), sinks);
    assert!(output.raw_delivery_video().exists());
}

#[tokio::test]
async fn test_reextraction_discards_stale_downstream_artifacts() {
    let h = harness(6, &(0..6).collect::<Vec<_>>(), PipelineConfig::default());
    let upload = h.processor.store_upload(b"swing bytes", "swing.mp4").await.unwrap();
    let first = h.processor.process(&upload).await.unwrap();

    std::fs::remove_file(&first.paths.trajectory).unwrap();
    std::fs::remove_file(&first.paths.filtered_annotated_delivery).unwrap();

    let second = h.processor.process(&upload).await.unwrap();
    assert_eq!(second.outcome(Stage::Extract), Some(StageOutcome::Computed));
    assert_eq!(second.outcome(Stage::Serialize), Some(StageOutcome::Computed));
    assert_eq!(second.outcome(Stage::PostProcess), Some(StageOutcome::Computed));
    assert_eq!(second.outcome(Stage::Render), Some(StageOutcome::Computed));
    assert_eq!(second.outcome(Stage::TranscodeRaw), Some(StageOutcome::Computed));
    assert_eq!(
        second.outcome(Stage::TranscodeFiltered),
        Some(StageOutcome::Computed)
    );
    let (before, after) = (first.manifest.unwrap(), second.manifest.unwrap());
    assert_eq!(after.rows, before.rows);
    assert!(after.completed_at >= before.completed_at);
}

#[tokio::test]
async fn test_invalid_config_writes_nothing() {
    let h = harness(4, &[0, 1, 2, 3], PipelineConfig::default().with_output_fps(-10.0));

    let err = h.processor.run_upload(b"swing", "swing.mp4").await.unwrap_err();
    assert!(matches!(err, WorkerError::ConfigError(_)));
    assert!(err.stage().is_none());
    assert_eq!(std::fs::read_dir(h.dir.path()).unwrap().count(), 0);
    assert_eq!(h.backend.sources_opened(), 0);
}
