//! Joint ordering and tabular column naming.
//!
//! The 33 landmarks follow the MediaPipe Pose ordering. Column order in every
//! serialized table is derived from [`Joint::ALL`], so this enum is the only
//! place the ordering is declared.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ModelError, ModelResult};

/// Number of tracked joints.
pub const JOINT_COUNT: usize = 33;

/// Number of raw columns in a serialized trajectory (33 joints x 3 axes).
pub const RAW_COLUMN_COUNT: usize = JOINT_COUNT * 3;

/// Suffix appended to filtered columns.
pub const FILTERED_SUFFIX: &str = "_filt";

/// Name of the 1-based frame index column.
pub const FRAMES_COLUMN: &str = "frames";

/// Pose landmark, index-aligned with the detector output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Joint {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl Joint {
    /// All joints in column order.
    pub const ALL: [Joint; JOINT_COUNT] = [
        Joint::Nose,
        Joint::LeftEyeInner,
        Joint::LeftEye,
        Joint::LeftEyeOuter,
        Joint::RightEyeInner,
        Joint::RightEye,
        Joint::RightEyeOuter,
        Joint::LeftEar,
        Joint::RightEar,
        Joint::MouthLeft,
        Joint::MouthRight,
        Joint::LeftShoulder,
        Joint::RightShoulder,
        Joint::LeftElbow,
        Joint::RightElbow,
        Joint::LeftWrist,
        Joint::RightWrist,
        Joint::LeftPinky,
        Joint::RightPinky,
        Joint::LeftIndex,
        Joint::RightIndex,
        Joint::LeftThumb,
        Joint::RightThumb,
        Joint::LeftHip,
        Joint::RightHip,
        Joint::LeftKnee,
        Joint::RightKnee,
        Joint::LeftAnkle,
        Joint::RightAnkle,
        Joint::LeftHeel,
        Joint::RightHeel,
        Joint::LeftFootIndex,
        Joint::RightFootIndex,
    ];

    /// Position in the fixed ordering.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Look up a joint by its position in the fixed ordering.
    pub fn from_index(index: usize) -> ModelResult<Self> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or(ModelError::JointIndexOutOfRange(index))
    }

    /// Look up a joint by its snake_case name.
    pub fn from_name(name: &str) -> ModelResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|j| j.name() == name)
            .ok_or_else(|| ModelError::UnknownJoint(name.to_string()))
    }

    pub fn name(self) -> &'static str {
        match self {
            Joint::Nose => "nose",
            Joint::LeftEyeInner => "left_eye_inner",
            Joint::LeftEye => "left_eye",
            Joint::LeftEyeOuter => "left_eye_outer",
            Joint::RightEyeInner => "right_eye_inner",
            Joint::RightEye => "right_eye",
            Joint::RightEyeOuter => "right_eye_outer",
            Joint::LeftEar => "left_ear",
            Joint::RightEar => "right_ear",
            Joint::MouthLeft => "mouth_left",
            Joint::MouthRight => "mouth_right",
            Joint::LeftShoulder => "left_shoulder",
            Joint::RightShoulder => "right_shoulder",
            Joint::LeftElbow => "left_elbow",
            Joint::RightElbow => "right_elbow",
            Joint::LeftWrist => "left_wrist",
            Joint::RightWrist => "right_wrist",
            Joint::LeftPinky => "left_pinky",
            Joint::RightPinky => "right_pinky",
            Joint::LeftIndex => "left_index",
            Joint::RightIndex => "right_index",
            Joint::LeftThumb => "left_thumb",
            Joint::RightThumb => "right_thumb",
            Joint::LeftHip => "left_hip",
            Joint::RightHip => "right_hip",
            Joint::LeftKnee => "left_knee",
            Joint::RightKnee => "right_knee",
            Joint::LeftAnkle => "left_ankle",
            Joint::RightAnkle => "right_ankle",
            Joint::LeftHeel => "left_heel",
            Joint::RightHeel => "right_heel",
            Joint::LeftFootIndex => "left_foot_index",
            Joint::RightFootIndex => "right_foot_index",
        }
    }

    /// Raw column name for one axis of this joint, e.g. `left_knee_y`.
    pub fn column(self, axis: Axis) -> String {
        format!("{}{}", self.name(), axis.suffix())
    }

    /// Filtered column name for one axis of this joint, e.g. `left_knee_y_filt`.
    pub fn filtered_column(self, axis: Axis) -> String {
        filtered_column_name(&self.column(axis))
    }
}

impl fmt::Display for Joint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Coordinate axis of a joint position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn suffix(self) -> &'static str {
        match self {
            Axis::X => "_x",
            Axis::Y => "_y",
            Axis::Z => "_z",
        }
    }
}

/// The 99 raw column names in joint-major, axis-minor order.
pub fn raw_columns() -> Vec<String> {
    Joint::ALL
        .iter()
        .flat_map(|joint| Axis::ALL.iter().map(move |axis| joint.column(*axis)))
        .collect()
}

/// Name of the filtered counterpart of a column.
pub fn filtered_column_name(column: &str) -> String {
    format!("{}{}", column, FILTERED_SUFFIX)
}

/// True for raw vertical columns (`*_y`), which get re-originated.
pub fn is_vertical_column(column: &str) -> bool {
    column.ends_with(Axis::Y.suffix())
}
