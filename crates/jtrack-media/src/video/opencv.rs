//! OpenCV video backend (XVID AVI sinks).

use std::path::{Path, PathBuf};

use image::RgbImage;
use opencv::core::{Mat, Point, Scalar, Size, CV_8UC3};
use opencv::imgproc;
use opencv::prelude::*;
use opencv::videoio::{
    VideoCapture, VideoWriter, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_HEIGHT, CAP_PROP_FRAME_WIDTH,
};
use tracing::debug;

use jtrack_models::encoding::{FALLBACK_SOURCE_FPS, NATIVE_FOURCC};

use super::{Frame, FrameSink, FrameSource, VideoBackend, VideoSpec};
use crate::error::{MediaError, MediaResult};
use crate::overlay::{Color, DrawOp, MarkerShape, OverlayPlan};

fn cv_err(context: &str) -> impl Fn(opencv::Error) -> MediaError + '_ {
    move |e| MediaError::video_backend(format!("{}: {}", context, e))
}

/// OpenCV's drawing functions take BGR scalars.
fn bgr(color: Color) -> Scalar {
    Scalar::new(color[2] as f64, color[1] as f64, color[0] as f64, 0.0)
}

fn path_str(path: &Path) -> MediaResult<&str> {
    path.to_str()
        .ok_or_else(|| MediaError::video_backend(format!("non UTF-8 path: {}", path.display())))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OpenCvBackend;

impl OpenCvBackend {
    pub fn new() -> Self {
        Self
    }
}

impl VideoBackend for OpenCvBackend {
    fn name(&self) -> &'static str {
        "opencv"
    }

    fn open_source(&self, path: &Path) -> MediaResult<Box<dyn FrameSource>> {
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }

        let cap = VideoCapture::from_file(path_str(path)?, CAP_ANY)
            .map_err(|e| MediaError::source_unreadable(path, e.to_string()))?;
        if !cap.is_opened().unwrap_or(false) {
            return Err(MediaError::source_unreadable(path, "capture did not open"));
        }

        let width = cap.get(CAP_PROP_FRAME_WIDTH).map_err(cv_err("frame width"))? as u32;
        let height = cap.get(CAP_PROP_FRAME_HEIGHT).map_err(cv_err("frame height"))? as u32;
        let fps = cap
            .get(CAP_PROP_FPS)
            .ok()
            .filter(|fps| fps.is_finite() && *fps > 0.0)
            .unwrap_or(FALLBACK_SOURCE_FPS);

        if width == 0 || height == 0 {
            return Err(MediaError::source_unreadable(path, "no video stream"));
        }

        debug!(path = %path.display(), width, height, fps, "Opened capture");

        Ok(Box::new(OpenCvSource {
            cap,
            spec: VideoSpec::new(width, height, fps),
            next_index: 0,
        }))
    }

    fn create_sink(&self, path: &Path, spec: VideoSpec) -> MediaResult<Box<dyn FrameSink>> {
        let [a, b, c, d] = NATIVE_FOURCC;
        let fourcc = VideoWriter::fourcc(a, b, c, d).map_err(cv_err("fourcc"))?;
        let writer = VideoWriter::new(
            path_str(path)?,
            fourcc,
            spec.fps,
            Size::new(spec.width as i32, spec.height as i32),
            true,
        )
        .map_err(cv_err("open writer"))?;

        if !writer.is_opened().unwrap_or(false) {
            return Err(MediaError::video_backend(format!(
                "writer did not open: {}",
                path.display()
            )));
        }

        Ok(Box::new(OpenCvSink {
            writer,
            path: path.to_path_buf(),
        }))
    }
}

struct OpenCvSource {
    cap: VideoCapture,
    spec: VideoSpec,
    next_index: u64,
}

// VideoCapture owns a raw pointer; each source is only ever used from one task.
unsafe impl Send for OpenCvSource {}

impl FrameSource for OpenCvSource {
    fn spec(&self) -> VideoSpec {
        self.spec
    }

    fn read_frame(&mut self) -> MediaResult<Option<Frame>> {
        let mut bgr_frame = Mat::default();
        let ok = self.cap.read(&mut bgr_frame).map_err(cv_err("read frame"))?;
        if !ok || bgr_frame.empty() {
            return Ok(None);
        }

        let mut rgb = Mat::default();
        imgproc::cvt_color_def(&bgr_frame, &mut rgb, imgproc::COLOR_BGR2RGB)
            .map_err(cv_err("color conversion"))?;

        let width = rgb.cols() as u32;
        let height = rgb.rows() as u32;
        let data = rgb.data_bytes().map_err(cv_err("frame data"))?.to_vec();
        let image = RgbImage::from_raw(width, height, data)
            .ok_or_else(|| MediaError::video_backend("frame buffer size mismatch"))?;

        let frame = Frame::new(self.next_index, image);
        self.next_index += 1;
        Ok(Some(frame))
    }
}

struct OpenCvSink {
    writer: VideoWriter,
    path: PathBuf,
}

// Same single-owner reasoning as OpenCvSource.
unsafe impl Send for OpenCvSink {}

impl OpenCvSink {
    fn to_bgr_mat(image: &RgbImage) -> MediaResult<Mat> {
        let mut rgb = Mat::new_rows_cols_with_default(
            image.height() as i32,
            image.width() as i32,
            CV_8UC3,
            Scalar::all(0.0),
        )
        .map_err(cv_err("allocate frame"))?;
        rgb.data_bytes_mut()
            .map_err(cv_err("frame data"))?
            .copy_from_slice(image.as_raw());

        let mut bgr_mat = Mat::default();
        imgproc::cvt_color_def(&rgb, &mut bgr_mat, imgproc::COLOR_RGB2BGR)
            .map_err(cv_err("color conversion"))?;
        Ok(bgr_mat)
    }

    fn draw(mat: &mut Mat, plan: &OverlayPlan) -> MediaResult<()> {
        for op in &plan.ops {
            match op {
                DrawOp::Line {
                    from,
                    to,
                    thickness,
                    color,
                } => {
                    imgproc::line(
                        mat,
                        Point::new(from.0, from.1),
                        Point::new(to.0, to.1),
                        bgr(*color),
                        *thickness as i32,
                        imgproc::LINE_4,
                        0,
                    )
                    .map_err(cv_err("draw line"))?;
                }
                DrawOp::Marker {
                    center,
                    shape,
                    size,
                    thickness,
                    color,
                } => {
                    let center = Point::new(center.0, center.1);
                    match shape {
                        MarkerShape::Dot => imgproc::circle(
                            mat,
                            center,
                            *size as i32,
                            bgr(*color),
                            imgproc::FILLED,
                            imgproc::LINE_8,
                            0,
                        ),
                        MarkerShape::Star => imgproc::draw_marker(
                            mat,
                            center,
                            bgr(*color),
                            imgproc::MARKER_STAR,
                            *size as i32,
                            *thickness as i32,
                            imgproc::LINE_8,
                        ),
                    }
                    .map_err(cv_err("draw marker"))?;
                }
                DrawOp::Label {
                    anchor,
                    text,
                    scale,
                    thickness,
                    color,
                } => {
                    imgproc::put_text(
                        mat,
                        text,
                        Point::new(anchor.0, anchor.1),
                        imgproc::FONT_HERSHEY_SIMPLEX,
                        *scale,
                        bgr(*color),
                        *thickness as i32,
                        imgproc::LINE_8,
                        false,
                    )
                    .map_err(cv_err("draw label"))?;
                }
            }
        }
        Ok(())
    }
}

impl FrameSink for OpenCvSink {
    fn write(&mut self, frame: &Frame, plan: &OverlayPlan) -> MediaResult<()> {
        let mut mat = Self::to_bgr_mat(&frame.image)?;
        Self::draw(&mut mat, plan)?;
        self.writer.write(&mat).map_err(cv_err("write frame"))
    }

    fn finish(mut self: Box<Self>) -> MediaResult<()> {
        self.writer.release().map_err(cv_err("release writer"))?;
        debug!(path = %self.path.display(), "Closed writer");
        Ok(())
    }
}
