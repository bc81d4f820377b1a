//! Pipeline orchestration.
//!
//! Runs the stages of one upload strictly in order. Every stage persists its
//! artifact before the next one starts, and a stage whose artifact is already
//! on disk is skipped, so an interrupted run resumes where it stopped.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn, Instrument};

use jtrack_media::fs_utils::write_atomic;
use jtrack_media::trajectory::{postprocess_file, read_table, serialize_trajectory, Table};
use jtrack_media::{
    extract_landmarks, render_filtered, FfmpegTranscoder, MediaError, PoseDetector,
    TranscodeOutcome, Transcoder, VideoBackend,
};
use jtrack_models::artifact::upload_extension;
use jtrack_models::{ArtifactKey, ArtifactPaths, RunManifest};

use crate::config::PipelineConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::RunLogger;
use crate::metrics;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Extract,
    Serialize,
    PostProcess,
    Render,
    TranscodeRaw,
    TranscodeFiltered,
    Manifest,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::Extract,
        Stage::Serialize,
        Stage::PostProcess,
        Stage::Render,
        Stage::TranscodeRaw,
        Stage::TranscodeFiltered,
        Stage::Manifest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Extract => "extract",
            Stage::Serialize => "serialize",
            Stage::PostProcess => "postprocess",
            Stage::Render => "render",
            Stage::TranscodeRaw => "transcode_raw",
            Stage::TranscodeFiltered => "transcode_filtered",
            Stage::Manifest => "manifest",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a stage did work or found its artifact in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Computed,
    Reused,
}

impl StageOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageOutcome::Computed => "computed",
            StageOutcome::Reused => "reused",
        }
    }
}

impl From<TranscodeOutcome> for StageOutcome {
    fn from(outcome: TranscodeOutcome) -> Self {
        match outcome {
            TranscodeOutcome::Transcoded => StageOutcome::Computed,
            TranscodeOutcome::Skipped => StageOutcome::Reused,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageReport {
    pub stage: Stage,
    pub outcome: StageOutcome,
    /// Zero for reused stages
    pub elapsed_ms: u64,
}

/// An upload stored under its content-scoped key.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedVideo {
    pub key: ArtifactKey,
    /// Name the upload was submitted under
    pub base_name: String,
    /// Stored copy of the upload
    pub path: PathBuf,
    /// Container extension of the stored copy
    pub extension: String,
}

impl UploadedVideo {
    pub fn paths(&self, work_dir: &Path) -> ArtifactPaths {
        ArtifactPaths::new(work_dir, &self.key, &self.extension)
    }
}

/// Result of a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub paths: ArtifactPaths,
    /// `None` only when a previous run was interrupted after the filtered
    /// delivery video was written
    pub manifest: Option<RunManifest>,
    pub stages: Vec<StageReport>,
}

impl PipelineOutput {
    /// The filtered delivery video handed back to the caller.
    pub fn delivery_video(&self) -> &Path {
        &self.paths.filtered_annotated_delivery
    }

    pub fn raw_delivery_video(&self) -> &Path {
        &self.paths.raw_annotated_delivery
    }

    pub fn trajectory(&self) -> &Path {
        &self.paths.trajectory
    }

    pub fn outcome(&self, stage: Stage) -> Option<StageOutcome> {
        self.stages
            .iter()
            .find(|r| r.stage == stage)
            .map(|r| r.outcome)
    }

    pub fn computed_count(&self) -> usize {
        self.count(StageOutcome::Computed)
    }

    pub fn reused_count(&self) -> usize {
        self.count(StageOutcome::Reused)
    }

    /// True when no stage had to do any work.
    pub fn is_fully_reused(&self) -> bool {
        self.computed_count() == 0
    }

    fn count(&self, outcome: StageOutcome) -> usize {
        self.stages.iter().filter(|r| r.outcome == outcome).count()
    }

    /// Bytes of the filtered delivery video.
    pub async fn read_delivery_bytes(&self) -> WorkerResult<Vec<u8>> {
        Ok(tokio::fs::read(self.delivery_video()).await?)
    }

    /// The post-processed trajectory table.
    pub async fn read_trajectory(&self) -> WorkerResult<Table> {
        Ok(read_table(self.trajectory()).await?)
    }
}

/// Per-run stage bookkeeping: logs, metrics and reports.
struct StageLog<'a> {
    logger: &'a RunLogger,
    reports: Vec<StageReport>,
}

impl<'a> StageLog<'a> {
    fn new(logger: &'a RunLogger) -> Self {
        Self {
            logger,
            reports: Vec::with_capacity(Stage::ALL.len()),
        }
    }

    fn record(&mut self, stage: Stage, outcome: StageOutcome, started: Instant) {
        let elapsed = started.elapsed();
        let elapsed_ms = match outcome {
            StageOutcome::Computed => {
                self.logger.log_computed(stage, elapsed.as_millis() as u64);
                elapsed.as_millis() as u64
            }
            StageOutcome::Reused => {
                self.logger.log_reused(stage);
                0
            }
        };
        metrics::record_stage(stage, outcome, elapsed.as_secs_f64());
        self.reports.push(StageReport {
            stage,
            outcome,
            elapsed_ms,
        });
    }

    fn computed(&mut self, stage: Stage, started: Instant) {
        self.record(stage, StageOutcome::Computed, started);
    }

    fn reused(&mut self, stage: Stage) {
        self.record(stage, StageOutcome::Reused, Instant::now());
    }
}

/// Attach the failing stage to a media error.
fn at(stage: Stage) -> impl FnOnce(MediaError) -> WorkerError {
    move |e| WorkerError::stage_failed(stage, e)
}

/// Runs uploads through the joint-tracking pipeline.
#[derive(Clone)]
pub struct PipelineProcessor {
    config: PipelineConfig,
    backend: Arc<dyn VideoBackend>,
    detector: Arc<dyn PoseDetector>,
    transcoder: Arc<dyn Transcoder>,
}

impl PipelineProcessor {
    /// Processor with the FFmpeg transcoder built from `config`.
    pub fn new(
        config: PipelineConfig,
        backend: Arc<dyn VideoBackend>,
        detector: Arc<dyn PoseDetector>,
    ) -> Self {
        let mut transcoder = FfmpegTranscoder::new(config.encoding.clone());
        if let Some(timeout) = config.transcode_timeout {
            transcoder = transcoder.with_timeout(timeout.as_secs());
        }
        Self {
            config,
            backend,
            detector,
            transcoder: Arc::new(transcoder),
        }
    }

    pub fn with_transcoder(mut self, transcoder: Arc<dyn Transcoder>) -> Self {
        self.transcoder = transcoder;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Store upload bytes under their content-scoped key.
    ///
    /// Storing the same bytes under the same name twice is a no-op.
    pub async fn store_upload(&self, bytes: &[u8], base_name: &str) -> WorkerResult<UploadedVideo> {
        if bytes.is_empty() {
            return Err(WorkerError::invalid_upload(format!("'{}' is empty", base_name)));
        }

        let key = ArtifactKey::for_upload(base_name, bytes)?;
        let extension = upload_extension(base_name);
        let path = ArtifactPaths::new(&self.config.work_dir, &key, &extension).upload;

        if path.exists() {
            info!(key = %key, path = %path.display(), "Upload already stored");
        } else {
            write_atomic(&path, bytes).await?;
            info!(key = %key, path = %path.display(), bytes = bytes.len(), "Stored upload");
        }

        Ok(UploadedVideo {
            key,
            base_name: base_name.to_string(),
            path,
            extension,
        })
    }

    /// Store and process an upload in one call.
    pub async fn run_upload(&self, bytes: &[u8], base_name: &str) -> WorkerResult<PipelineOutput> {
        self.config.validate()?;
        let upload = self.store_upload(bytes, base_name).await?;
        self.process(&upload).await
    }

    /// Run every stage for a stored upload.
    pub async fn process(&self, upload: &UploadedVideo) -> WorkerResult<PipelineOutput> {
        self.config.validate()?;
        let logger = RunLogger::new(&upload.key);
        let span = logger.create_span();

        let result = self.run_stages(upload, &logger).instrument(span).await;
        if let Err(e) = &result {
            if let Some(stage) = e.stage() {
                metrics::record_run_failed(stage);
                logger.log_failure(stage, &e.to_string());
            }
        }
        result
    }

    async fn run_stages(
        &self,
        upload: &UploadedVideo,
        logger: &RunLogger,
    ) -> WorkerResult<PipelineOutput> {
        let paths = upload.paths(&self.config.work_dir);
        let mut log = StageLog::new(logger);
        logger.log_start(&upload.path.display().to_string());

        if paths.filtered_annotated_delivery.exists() {
            for stage in Stage::ALL {
                log.reused(stage);
            }
            let manifest = read_manifest(&paths.manifest).await;
            logger.log_completion(0, log.reports.len());
            return Ok(PipelineOutput {
                paths,
                manifest,
                stages: log.reports,
            });
        }

        for dir in paths.directories() {
            tokio::fs::create_dir_all(&dir).await?;
        }

        // Extract and serialize
        let (frame_width, frame_height, output_fps) =
            if paths.raw_annotated.exists() && paths.trajectory.exists() {
                let spec = self
                    .backend
                    .open_source(&upload.path)
                    .map(|source| source.spec())
                    .map_err(at(Stage::Extract))?;
                log.reused(Stage::Extract);
                log.reused(Stage::Serialize);
                (
                    spec.width,
                    spec.height,
                    self.config.output_fps.unwrap_or(spec.fps),
                )
            } else {
                // Everything downstream was derived from the old extraction.
                discard_stale(&[
                    paths.raw_annotated_delivery.as_path(),
                    paths.filtered_annotated.as_path(),
                    paths.manifest.as_path(),
                ])
                .await;

                let started = Instant::now();
                let extraction = extract_landmarks(
                    self.backend.as_ref(),
                    self.detector.as_ref(),
                    &upload.path,
                    &paths.raw_annotated,
                    self.config.extract_options(),
                )
                .await
                .map_err(at(Stage::Extract))?;
                log.computed(Stage::Extract, started);

                let started = Instant::now();
                serialize_trajectory(&extraction.trajectory, &paths.trajectory)
                    .await
                    .map_err(at(Stage::Serialize))?;
                log.computed(Stage::Serialize, started);

                (
                    extraction.frame_width,
                    extraction.frame_height,
                    extraction.output_fps,
                )
            };

        // Post-process
        let started = Instant::now();
        let (table, computed) = postprocess_file(
            &paths.trajectory,
            frame_height,
            &self.config.postprocess_options(),
        )
        .await
        .map_err(at(Stage::PostProcess))?;
        if computed {
            log.computed(Stage::PostProcess, started);
        } else {
            log.reused(Stage::PostProcess);
        }

        // Render
        if paths.filtered_annotated.exists() {
            log.reused(Stage::Render);
        } else {
            let started = Instant::now();
            render_filtered(
                self.backend.as_ref(),
                &upload.path,
                &paths.filtered_annotated,
                &table,
                self.config.output_fps,
            )
            .await
            .map_err(at(Stage::Render))?;
            log.computed(Stage::Render, started);
        }

        // Transcode. The filtered delivery video goes last since its
        // presence short-circuits the next run.
        let started = Instant::now();
        let outcome = self
            .transcoder
            .transcode(&paths.raw_annotated, &paths.raw_annotated_delivery)
            .await
            .map_err(at(Stage::TranscodeRaw))?;
        log.record(Stage::TranscodeRaw, outcome.into(), started);

        let started = Instant::now();
        let outcome = self
            .transcoder
            .transcode(&paths.filtered_annotated, &paths.filtered_annotated_delivery)
            .await
            .map_err(at(Stage::TranscodeFiltered))?;
        log.record(Stage::TranscodeFiltered, outcome.into(), started);

        // Manifest
        let started = Instant::now();
        let detected_frames = table
            .to_trajectory()
            .map(|t| t.detected_count())
            .map_err(at(Stage::Manifest))?;
        if detected_frames == 0 {
            logger.log_warning(Stage::Manifest, "Run finished without any detected pose");
        }
        let manifest = RunManifest::new(
            upload.base_name.clone(),
            &paths,
            table.row_count(),
            detected_frames,
            frame_width,
            frame_height,
            output_fps,
            self.config.gap_policy,
        );
        let json = serde_json::to_vec_pretty(&manifest)?;
        write_atomic(&paths.manifest, &json)
            .await
            .map_err(at(Stage::Manifest))?;
        log.computed(Stage::Manifest, started);

        let computed = log
            .reports
            .iter()
            .filter(|r| r.outcome == StageOutcome::Computed)
            .count();
        logger.log_completion(computed, log.reports.len() - computed);

        Ok(PipelineOutput {
            paths,
            manifest: Some(manifest),
            stages: log.reports,
        })
    }
}

/// Remove artifacts left by an earlier extraction, ignoring missing ones.
async fn discard_stale(paths: &[&Path]) {
    for path in paths {
        match tokio::fs::remove_file(path).await {
            Ok(()) => info!(path = %path.display(), "Discarded stale artifact"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Could not discard stale artifact"),
        }
    }
}

/// Read a manifest left by an earlier run, if it is there and parses.
async fn read_manifest(path: &Path) -> Option<RunManifest> {
    let bytes = tokio::fs::read(path).await.ok()?;
    match serde_json::from_slice(&bytes) {
        Ok(manifest) => Some(manifest),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring unreadable manifest");
            None
        }
    }
}
