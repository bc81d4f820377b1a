//! `jtrack` command line.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use jtrack_media::trajectory::ShortTrajectoryPolicy;
use jtrack_media::{check_ffmpeg, check_ffprobe, PoseServiceClient, VideoBackend};
use jtrack_models::GapPolicy;
use jtrack_worker::{PipelineConfig, PipelineProcessor};

#[derive(Parser, Debug)]
#[command(name = "jtrack", version, about = "Track, filter and re-render joint trajectories")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the pipeline on a video file
    Process {
        /// Input video
        video: PathBuf,

        /// Upload name; defaults to the file name
        #[arg(long)]
        name: Option<String>,

        /// Artifact root (overrides JTRACK_WORK_DIR)
        #[arg(long)]
        work_dir: Option<PathBuf>,

        /// Annotated output frame rate
        #[arg(long)]
        output_fps: Option<f64>,

        /// Keep one trajectory row per frame, marking frames without a pose
        #[arg(long)]
        mark_missing: bool,

        /// Fail when the trajectory is too short to filter
        #[arg(long)]
        strict_filter: bool,
    },
    /// Check that ffmpeg and the pose service are reachable
    Check,
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

#[cfg(feature = "opencv")]
fn video_backend() -> anyhow::Result<Arc<dyn VideoBackend>> {
    Ok(Arc::new(jtrack_media::OpenCvBackend::new()))
}

#[cfg(not(feature = "opencv"))]
fn video_backend() -> anyhow::Result<Arc<dyn VideoBackend>> {
    bail!("no video backend compiled in; rebuild with `--features opencv`")
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Process {
            video,
            name,
            work_dir,
            output_fps,
            mark_missing,
            strict_filter,
        } => {
            let mut config = PipelineConfig::from_env();
            if let Some(dir) = work_dir {
                config = config.with_work_dir(dir);
            }
            if let Some(fps) = output_fps {
                config = config.with_output_fps(fps);
            }
            if mark_missing {
                config = config.with_gap_policy(GapPolicy::MarkMissing);
            }
            if strict_filter {
                config = config.with_short_policy(ShortTrajectoryPolicy::Fail);
            }
            process(config, video, name).await
        }
        Command::Check => check().await,
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn process(config: PipelineConfig, video: PathBuf, name: Option<String>) -> anyhow::Result<()> {
    let base_name = match name {
        Some(name) => name,
        None => video
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .context("input path has no file name")?,
    };
    let bytes = tokio::fs::read(&video)
        .await
        .with_context(|| format!("reading {}", video.display()))?;

    info!(config = ?config, "Starting jtrack");

    let detector = PoseServiceClient::from_env().context("creating pose service client")?;
    let processor = PipelineProcessor::new(config, video_backend()?, Arc::new(detector));

    let output = processor.run_upload(&bytes, &base_name).await?;

    info!(
        delivery = %output.delivery_video().display(),
        trajectory = %output.trajectory().display(),
        computed = output.computed_count(),
        reused = output.reused_count(),
        "Pipeline finished"
    );
    println!("{}", output.delivery_video().display());
    Ok(())
}

async fn check() -> anyhow::Result<()> {
    let ffmpeg = check_ffmpeg().context("ffmpeg")?;
    info!(path = %ffmpeg.display(), "ffmpeg found");
    match check_ffprobe() {
        Ok(path) => info!(path = %path.display(), "ffprobe found"),
        Err(e) => warn!("ffprobe unavailable, transcode progress will not show percentages: {}", e),
    }

    let client = PoseServiceClient::from_env().context("creating pose service client")?;
    if !client.health_check().await {
        bail!("pose service at {} is not healthy", client.base_url());
    }
    info!(url = client.base_url(), "Pose service healthy");

    video_backend()?;
    Ok(())
}
