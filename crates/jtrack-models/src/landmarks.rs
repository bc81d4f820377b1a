//! Per-frame landmark records.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::joint::{Axis, Joint, JOINT_COUNT};

/// Position of one joint in one frame.
///
/// `x`/`y` are source-video pixels; `z` is the detector's unitless relative
/// depth.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct JointPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl JointPosition {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn axis(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// A single landmark as returned by the pose detector.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NormalizedLandmark {
    /// Horizontal position in [0, 1] of frame width
    pub x: f64,
    /// Vertical position in [0, 1] of frame height (top-left origin)
    pub y: f64,
    /// Relative depth
    pub z: f64,
    /// Detector visibility score, when provided
    #[serde(default)]
    pub visibility: Option<f64>,
}

impl NormalizedLandmark {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            visibility: None,
        }
    }
}

/// Detector output for one frame: exactly 33 normalized landmarks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<NormalizedLandmark>", into = "Vec<NormalizedLandmark>")]
pub struct NormalizedPose {
    landmarks: Vec<NormalizedLandmark>,
}

impl NormalizedPose {
    pub fn new(landmarks: Vec<NormalizedLandmark>) -> ModelResult<Self> {
        if landmarks.len() != JOINT_COUNT {
            return Err(ModelError::LandmarkCount {
                expected: JOINT_COUNT,
                actual: landmarks.len(),
            });
        }
        Ok(Self { landmarks })
    }

    pub fn landmarks(&self) -> &[NormalizedLandmark] {
        &self.landmarks
    }

    pub fn get(&self, joint: Joint) -> NormalizedLandmark {
        self.landmarks[joint.index()]
    }
}

impl TryFrom<Vec<NormalizedLandmark>> for NormalizedPose {
    type Error = ModelError;

    fn try_from(landmarks: Vec<NormalizedLandmark>) -> ModelResult<Self> {
        Self::new(landmarks)
    }
}

impl From<NormalizedPose> for Vec<NormalizedLandmark> {
    fn from(pose: NormalizedPose) -> Self {
        pose.landmarks
    }
}

/// Joint positions for one frame, index-aligned with [`Joint::ALL`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameLandmarks {
    positions: [JointPosition; JOINT_COUNT],
}

impl FrameLandmarks {
    pub fn new(positions: [JointPosition; JOINT_COUNT]) -> Self {
        Self { positions }
    }

    /// Build from a slice, checking the length.
    pub fn from_slice(positions: &[JointPosition]) -> ModelResult<Self> {
        let positions: [JointPosition; JOINT_COUNT] =
            positions
                .try_into()
                .map_err(|_| ModelError::LandmarkCount {
                    expected: JOINT_COUNT,
                    actual: positions.len(),
                })?;
        Ok(Self { positions })
    }

    /// Convert detector output to pixel space.
    ///
    /// x scales by width, y by height; z is kept as returned.
    pub fn from_normalized(pose: &NormalizedPose, width: u32, height: u32) -> Self {
        let mut positions = [JointPosition::default(); JOINT_COUNT];
        for (slot, lm) in positions.iter_mut().zip(pose.landmarks()) {
            *slot = JointPosition::new(lm.x * width as f64, lm.y * height as f64, lm.z);
        }
        Self { positions }
    }

    pub fn get(&self, joint: Joint) -> JointPosition {
        self.positions[joint.index()]
    }

    pub fn positions(&self) -> &[JointPosition; JOINT_COUNT] {
        &self.positions
    }

    /// Flattened values in raw column order.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.positions
            .iter()
            .flat_map(|p| Axis::ALL.into_iter().map(move |axis| p.axis(axis)))
    }
}
