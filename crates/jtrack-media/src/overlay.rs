//! Backend-independent drawing plans.
//!
//! The extractor and renderer describe what goes on a frame as a list of
//! [`DrawOp`]s. Sinks rasterize the plan with whatever primitives their
//! video library offers; [`OverlayPlan::rasterize`] is the built-in CPU
//! fallback used by in-memory sinks.

use image::{Rgb, RgbImage};

use jtrack_models::{FrameLandmarks, Joint, POSE_CONNECTIONS};

/// RGB color triple.
pub type Color = [u8; 3];

pub const RED: Color = [255, 0, 0];
pub const WHITE: Color = [255, 255, 255];
pub const LIME_GREEN: Color = [50, 205, 50];

/// Frame counter offset from the right edge, in pixels.
pub const LABEL_OFFSET_X: i32 = 300;
/// Frame counter offset from the bottom edge, in pixels.
pub const LABEL_OFFSET_Y: i32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerShape {
    /// Filled dot, used for raw detections.
    Dot,
    /// Star, used for filtered joints.
    Star,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Marker {
        center: (i32, i32),
        shape: MarkerShape,
        size: u32,
        thickness: u32,
        color: Color,
    },
    Line {
        from: (i32, i32),
        to: (i32, i32),
        thickness: u32,
        color: Color,
    },
    Label {
        anchor: (i32, i32),
        text: String,
        scale: f64,
        thickness: u32,
        color: Color,
    },
}

/// Ordered draw operations for one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlayPlan {
    pub ops: Vec<DrawOp>,
}

impl OverlayPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn push(&mut self, op: DrawOp) {
        self.ops.push(op);
    }

    pub fn markers(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, DrawOp::Marker { .. }))
            .count()
    }

    pub fn lines(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, DrawOp::Line { .. }))
            .count()
    }

    pub fn label(&self) -> Option<&str> {
        self.ops.iter().find_map(|op| match op {
            DrawOp::Label { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }

    /// Add the `Frame-{index}` counter in the lower-right area of the frame.
    pub fn frame_label(&mut self, index: u64, width: u32, height: u32) {
        self.push(DrawOp::Label {
            anchor: (
                width as i32 - LABEL_OFFSET_X,
                height as i32 - LABEL_OFFSET_Y,
            ),
            text: format!("Frame-{}", index),
            scale: 1.0,
            thickness: 2,
            color: RED,
        });
    }

    /// Raw skeleton for the extractor: white connections, red joint dots.
    pub fn raw_skeleton(&mut self, landmarks: &FrameLandmarks) {
        for (a, b) in POSE_CONNECTIONS.iter() {
            let (pa, pb) = (landmarks.get(*a), landmarks.get(*b));
            if !(pa.is_finite() && pb.is_finite()) {
                continue;
            }
            self.push(DrawOp::Line {
                from: to_pixel(pa.x, pa.y),
                to: to_pixel(pb.x, pb.y),
                thickness: 2,
                color: WHITE,
            });
        }
        for joint in Joint::ALL {
            let p = landmarks.get(joint);
            if !p.is_finite() {
                continue;
            }
            self.push(DrawOp::Marker {
                center: to_pixel(p.x, p.y),
                shape: MarkerShape::Dot,
                size: 2,
                thickness: 2,
                color: RED,
            });
        }
    }

    /// One filtered edge: star markers on both ends, lime-green line between.
    pub fn filtered_edge(&mut self, from: (i32, i32), to: (i32, i32)) {
        for center in [from, to] {
            self.push(DrawOp::Marker {
                center,
                shape: MarkerShape::Star,
                size: 5,
                thickness: 2,
                color: RED,
            });
        }
        self.push(DrawOp::Line {
            from,
            to,
            thickness: 2,
            color: LIME_GREEN,
        });
    }

    /// Draw markers and lines onto `image` with a square brush.
    ///
    /// Labels are skipped; there is no font rasterizer on this path.
    pub fn rasterize(&self, image: &mut RgbImage) {
        for op in &self.ops {
            match op {
                DrawOp::Line {
                    from,
                    to,
                    thickness,
                    color,
                } => draw_line(image, *from, *to, *thickness as i32, *color),
                DrawOp::Marker {
                    center,
                    shape,
                    size,
                    thickness,
                    color,
                } => {
                    let (x, y) = *center;
                    let r = *size as i32;
                    match shape {
                        MarkerShape::Dot => draw_line(image, *center, *center, r * 2, *color),
                        MarkerShape::Star => {
                            let t = *thickness as i32;
                            draw_line(image, (x - r, y), (x + r, y), t, *color);
                            draw_line(image, (x, y - r), (x, y + r), t, *color);
                            draw_line(image, (x - r, y - r), (x + r, y + r), t, *color);
                            draw_line(image, (x - r, y + r), (x + r, y - r), t, *color);
                        }
                    }
                }
                DrawOp::Label { .. } => {}
            }
        }
    }
}

/// Truncate an image-space coordinate to a pixel.
pub fn to_pixel(x: f64, y: f64) -> (i32, i32) {
    (x as i32, y as i32)
}

fn put_pixel(image: &mut RgbImage, x: i32, y: i32, color: Color) {
    if x < 0 || y < 0 {
        return;
    }
    let (x, y) = (x as u32, y as u32);
    if x >= image.width() || y >= image.height() {
        return;
    }
    image.put_pixel(x, y, Rgb(color));
}

// Bresenham with a square brush.
fn draw_line(image: &mut RgbImage, from: (i32, i32), to: (i32, i32), thickness: i32, color: Color) {
    let (mut x0, mut y0) = from;
    let (x1, y1) = to;
    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let rad = thickness.max(1) / 2;
    loop {
        for oy in -rad..=rad {
            for ox in -rad..=rad {
                put_pixel(image, x0 + ox, y0 + oy, color);
            }
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}
