//! Filtered-overlay rendering.

use std::path::Path;

use tracing::info;

use jtrack_models::{filtered_column_name, Axis, Joint, JOINT_COUNT, POSE_CONNECTIONS};

use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{commit_file, discard_staging, ensure_parent, staging_path};
use crate::overlay::{to_pixel, OverlayPlan};
use crate::trajectory::{reorigin_y, Table};
use crate::video::{FrameSink, FrameSource, VideoBackend};

/// Filtered x/y series per joint, in image space.
struct FilteredPoints<'a> {
    x: Vec<&'a [f64]>,
    y: Vec<&'a [f64]>,
    height: f64,
}

impl<'a> FilteredPoints<'a> {
    fn bind(table: &'a Table, height: u32) -> MediaResult<Self> {
        let lookup = move |joint: Joint, axis: Axis| {
            let name = filtered_column_name(&joint.column(axis));
            table
                .float(&name)
                .ok_or_else(|| MediaError::schema(format!("missing column '{}'", name)))
        };

        let mut x = Vec::with_capacity(JOINT_COUNT);
        let mut y = Vec::with_capacity(JOINT_COUNT);
        for joint in Joint::ALL {
            x.push(lookup(joint, Axis::X)?);
            y.push(lookup(joint, Axis::Y)?);
        }
        Ok(Self {
            x,
            y,
            height: height as f64,
        })
    }

    /// Pixel position of `joint` at `row`, undoing the vertical re-origin.
    fn point(&self, joint: Joint, row: usize) -> Option<(i32, i32)> {
        let x = self.x[joint.index()][row];
        let y = reorigin_y(self.y[joint.index()][row], self.height);
        (x.is_finite() && y.is_finite()).then(|| to_pixel(x, y))
    }
}

/// Draw the filtered skeleton over `source` and write it to `output`.
///
/// Frame `i` is drawn from row `i`; rendering stops at whichever runs out
/// first. Returns the number of frames written.
pub async fn render_filtered(
    backend: &dyn VideoBackend,
    source: &Path,
    output: &Path,
    table: &Table,
    output_fps: Option<f64>,
) -> MediaResult<u64> {
    let mut frames = backend.open_source(source)?;
    let spec = frames.spec();
    let points = FilteredPoints::bind(table, spec.height)?;
    let output_spec = spec.with_fps(output_fps.unwrap_or(spec.fps));

    ensure_parent(output).await?;
    let staging = staging_path(output);
    let sink = backend.create_sink(&staging, output_spec)?;

    match draw_frames(frames.as_mut(), sink, &points, table.row_count(), spec.width, spec.height) {
        Ok(written) => {
            commit_file(&staging, output).await?;
            info!(
                output = %output.display(),
                frames = written,
                rows = table.row_count(),
                fps = output_spec.fps,
                "Rendered filtered overlay"
            );
            Ok(written)
        }
        Err(e) => {
            discard_staging(&staging).await;
            Err(e)
        }
    }
}

fn draw_frames(
    frames: &mut dyn FrameSource,
    mut sink: Box<dyn FrameSink>,
    points: &FilteredPoints<'_>,
    rows: usize,
    width: u32,
    height: u32,
) -> MediaResult<u64> {
    let mut written = 0u64;

    while (written as usize) < rows {
        let Some(frame) = frames.read_frame()? else {
            break;
        };
        let row = written as usize;

        let mut plan = OverlayPlan::new();
        for (a, b) in POSE_CONNECTIONS.iter() {
            if let (Some(pa), Some(pb)) = (points.point(*a, row), points.point(*b, row)) {
                plan.filtered_edge(pa, pb);
            }
        }
        plan.frame_label(frame.index, width, height);

        sink.write(&frame, &plan)?;
        written += 1;
    }

    sink.finish()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trajectory::{augment, PostProcessOptions};
    use crate::video::{MemoryClip, MemoryVideoBackend, RecordedVideo};
    use jtrack_models::{FrameLandmarks, JointPosition, Trajectory};
    use tempfile::TempDir;

    fn augmented(rows: usize, height: u32) -> Table {
        let mut t = Trajectory::new();
        for f in 0..rows {
            let positions: Vec<JointPosition> = (0..JOINT_COUNT)
                .map(|j| JointPosition::new(20.0 + j as f64, 40.0 + f as f64, 0.0))
                .collect();
            t.push_detected(FrameLandmarks::from_slice(&positions).unwrap());
        }
        augment(&Table::from_trajectory(&t), height, &PostProcessOptions::default()).unwrap()
    }

    fn setup(frames: usize) -> (TempDir, MemoryVideoBackend, std::path::PathBuf) {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("clip.mp4");
        std::fs::write(&source, b"clip").unwrap();
        let backend = MemoryVideoBackend::new();
        backend.register(&source, MemoryClip::blank(160, 120, 30.0, frames));
        (dir, backend, source)
    }

    #[test]
    fn test_points_return_to_image_space() {
        let table = augmented(3, 120);
        let points = FilteredPoints::bind(&table, 120).unwrap();
        // passthrough for 3 rows, so filtered equals raw
        assert_eq!(points.point(Joint::Nose, 1), Some((20, 41)));
    }

    #[tokio::test]
    async fn test_stops_at_shorter_of_frames_and_rows() {
        let (dir, backend, source) = setup(5);
        let out = dir.path().join("filtered.avi");

        let written = render_filtered(&backend, &source, &out, &augmented(3, 120), Some(10.0))
            .await
            .unwrap();
        assert_eq!(written, 3);

        let recorded = RecordedVideo::load(&out).unwrap();
        assert_eq!(recorded.frames.len(), 3);
        assert_eq!(recorded.spec.fps, 10.0);
        let first = &recorded.frames[0];
        assert_eq!(first.lines, POSE_CONNECTIONS.len());
        assert_eq!(first.markers, 2 * POSE_CONNECTIONS.len());
        assert_eq!(first.label.as_deref(), Some("Frame-0"));

        let (dir2, backend2, source2) = setup(2);
        let out2 = dir2.path().join("filtered.avi");
        let written = render_filtered(&backend2, &source2, &out2, &augmented(12, 120), None)
            .await
            .unwrap();
        assert_eq!(written, 2);
    }

    #[tokio::test]
    async fn test_empty_table_writes_empty_video() {
        let (dir, backend, source) = setup(4);
        let out = dir.path().join("filtered.avi");
        let written = render_filtered(&backend, &source, &out, &augmented(0, 120), None)
            .await
            .unwrap();
        assert_eq!(written, 0);
        assert!(RecordedVideo::load(&out).unwrap().frames.is_empty());
    }

    #[tokio::test]
    async fn test_missing_rows_skip_edges() {
        let (dir, backend, source) = setup(12);
        let mut rows = Vec::new();
        for f in 0..12 {
            if f == 5 {
                rows.push(None);
                continue;
            }
            let positions = vec![JointPosition::new(30.0, 50.0 + f as f64, 0.0); JOINT_COUNT];
            rows.push(Some(FrameLandmarks::from_slice(&positions).unwrap()));
        }
        let table = augment(
            &Table::from_trajectory(&Trajectory::from_rows(rows)),
            120,
            &PostProcessOptions::default(),
        )
        .unwrap();

        let out = dir.path().join("filtered.avi");
        render_filtered(&backend, &source, &out, &table, None).await.unwrap();

        let recorded = RecordedVideo::load(&out).unwrap();
        assert_eq!(recorded.frames.len(), 12);
        assert_eq!(recorded.frames[5].lines, 0);
        assert_eq!(recorded.frames[5].label.as_deref(), Some("Frame-5"));
        assert_eq!(recorded.frames[6].lines, POSE_CONNECTIONS.len());
    }

    #[tokio::test]
    async fn test_raw_only_table_is_schema_error() {
        let (dir, backend, source) = setup(2);
        let raw = Table::from_trajectory(&Trajectory::new());
        let out = dir.path().join("filtered.avi");
        let err = render_filtered(&backend, &source, &out, &raw, None).await.unwrap_err();
        assert!(matches!(err, MediaError::Schema(_)));
        assert!(!out.exists());
    }
}
