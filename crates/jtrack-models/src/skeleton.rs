//! Skeleton connectivity graph.

use crate::joint::Joint;

/// Joint pairs connected by a line when drawing the skeleton.
///
/// Same topology as the MediaPipe pose graph: face, torso, arms with hands,
/// legs with feet.
pub const POSE_CONNECTIONS: [(Joint, Joint); 35] = [
    (Joint::Nose, Joint::LeftEyeInner),
    (Joint::LeftEyeInner, Joint::LeftEye),
    (Joint::LeftEye, Joint::LeftEyeOuter),
    (Joint::LeftEyeOuter, Joint::LeftEar),
    (Joint::Nose, Joint::RightEyeInner),
    (Joint::RightEyeInner, Joint::RightEye),
    (Joint::RightEye, Joint::RightEyeOuter),
    (Joint::RightEyeOuter, Joint::RightEar),
    (Joint::MouthLeft, Joint::MouthRight),
    (Joint::LeftShoulder, Joint::RightShoulder),
    (Joint::LeftShoulder, Joint::LeftElbow),
    (Joint::LeftElbow, Joint::LeftWrist),
    (Joint::LeftWrist, Joint::LeftPinky),
    (Joint::LeftWrist, Joint::LeftIndex),
    (Joint::LeftWrist, Joint::LeftThumb),
    (Joint::LeftPinky, Joint::LeftIndex),
    (Joint::RightShoulder, Joint::RightElbow),
    (Joint::RightElbow, Joint::RightWrist),
    (Joint::RightWrist, Joint::RightPinky),
    (Joint::RightWrist, Joint::RightIndex),
    (Joint::RightWrist, Joint::RightThumb),
    (Joint::RightPinky, Joint::RightIndex),
    (Joint::LeftShoulder, Joint::LeftHip),
    (Joint::RightShoulder, Joint::RightHip),
    (Joint::LeftHip, Joint::RightHip),
    (Joint::LeftHip, Joint::LeftKnee),
    (Joint::RightHip, Joint::RightKnee),
    (Joint::LeftKnee, Joint::LeftAnkle),
    (Joint::RightKnee, Joint::RightAnkle),
    (Joint::LeftAnkle, Joint::LeftHeel),
    (Joint::RightAnkle, Joint::RightHeel),
    (Joint::LeftHeel, Joint::LeftFootIndex),
    (Joint::RightHeel, Joint::RightFootIndex),
    (Joint::LeftAnkle, Joint::LeftFootIndex),
    (Joint::RightAnkle, Joint::RightFootIndex),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_self_loops_or_duplicates() {
        for (i, (a, b)) in POSE_CONNECTIONS.iter().enumerate() {
            assert_ne!(a, b);
            for (c, d) in POSE_CONNECTIONS.iter().skip(i + 1) {
                assert!(!((a == c && b == d) || (a == d && b == c)));
            }
        }
    }

    #[test]
    fn test_every_joint_is_connected() {
        for joint in Joint::ALL {
            assert!(POSE_CONNECTIONS
                .iter()
                .any(|(a, b)| *a == joint || *b == joint));
        }
    }
}
