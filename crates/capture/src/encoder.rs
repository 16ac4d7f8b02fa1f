//! Frame → `xviz/state_update`

use contracts::{Transform, XvizMessage, XvizMetadata};
use xviz::XvizBuilder;

use crate::declarator::{POINTS_STREAM, VEHICLE_POSE_STREAM};

/// Tri-axis marker, 3 m along each vehicle axis
pub const INDICATOR_POINTS: [[f64; 3]; 3] = [[3.0, 0.0, 0.0], [0.0, 3.0, 0.0], [0.0, 0.0, 3.0]];
pub const INDICATOR_COLORS: [[u8; 3]; 3] = [[200, 40, 80], [80, 40, 200], [80, 200, 40]];
pub const INDICATOR_ID: &str = "indicator";

/// Encodes one captured frame
///
/// The timestamp is `frame / frame_rate`; wall clock and simulator delta are
/// never consulted. Pose fields are copied as-is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameEncoder {
    frame_rate: f64,
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self { frame_rate: 30.0 }
    }
}

impl FrameEncoder {
    pub fn new(frame_rate: f64) -> Self {
        Self { frame_rate }
    }

    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    /// 秒
    pub fn timestamp(&self, frame: u64) -> f64 {
        frame as f64 / self.frame_rate
    }

    /// 把一帧位姿编码成 state update
    ///
    /// 位姿原样透传，NaN/inf 不做修正。JSON 输出中它们会变成 `null`，
    /// 这样的文件无法再反序列化为 `XvizMessage`；writer 会对此打 warn。
    pub fn encode(&self, metadata: &XvizMetadata, frame: u64, pose: &Transform) -> XvizMessage {
        let timestamp = self.timestamp(frame);
        let mut builder = XvizBuilder::new(metadata);

        builder
            .pose(VEHICLE_POSE_STREAM)
            .timestamp(timestamp)
            .orientation(pose.rotation.roll, pose.rotation.pitch, pose.rotation.yaw)
            .position(pose.location.x, pose.location.y, pose.location.z);

        builder
            .primitive(POINTS_STREAM)
            .points(&INDICATOR_POINTS)
            .colors(&INDICATOR_COLORS)
            .id(INDICATOR_ID);

        builder.get_message()
    }
}

#[cfg(test)]
mod tests {
    use contracts::{Location, Rotation};

    use super::*;
    use crate::declare_metadata;

    fn pose() -> Transform {
        Transform::new(
            Location {
                x: 1.0,
                y: 2.0,
                z: 0.0,
            },
            Rotation {
                pitch: 0.0,
                yaw: 90.0,
                roll: 0.0,
            },
        )
    }

    #[test]
    fn consecutive_frames_at_30hz() {
        let metadata = declare_metadata();
        let encoder = FrameEncoder::default();

        let messages: Vec<XvizMessage> = [10, 11, 12]
            .into_iter()
            .map(|frame| encoder.encode(&metadata, frame, &pose()))
            .collect();

        let timestamps: Vec<f64> = messages.iter().filter_map(|m| m.timestamp()).collect();
        assert_eq!(timestamps, vec![10.0 / 30.0, 11.0 / 30.0, 12.0 / 30.0]);
        assert!((timestamps[2] - 0.4).abs() < 1e-12);

        for message in &messages {
            let set = &message.as_state_update().unwrap().updates[0];
            let pose = &set.poses[VEHICLE_POSE_STREAM];
            assert_eq!(pose.position, [1.0, 2.0, 0.0]);
            assert_eq!(pose.orientation, [0.0, 0.0, 90.0]);
            assert_eq!(pose.timestamp, set.timestamp);
        }
    }

    #[test]
    fn indicator_geometry() {
        let message = FrameEncoder::default().encode(&declare_metadata(), 1, &pose());
        let set = &message.as_state_update().unwrap().updates[0];

        assert_eq!(set.poses.len(), 1);
        assert_eq!(set.primitives.len(), 1);
        let points = &set.primitives[POINTS_STREAM].points;
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].points, vec![3.0, 0.0, 0.0, 0.0, 3.0, 0.0, 0.0, 0.0, 3.0]);
        assert_eq!(points[0].colors, vec![200, 40, 80, 80, 40, 200, 80, 200, 40]);
        assert_eq!(points[0].object_id(), Some(INDICATOR_ID));
        assert!(set.primitives[POINTS_STREAM].circles.is_empty());
    }

    #[test]
    fn injected_frame_rate_and_non_finite_pose() {
        let mut pose = pose();
        pose.location.x = f64::NAN;
        let message = FrameEncoder::new(20.0).encode(&declare_metadata(), 10, &pose);

        assert_eq!(message.timestamp(), Some(0.5));
        let set = &message.as_state_update().unwrap().updates[0];
        assert!(set.poses[VEHICLE_POSE_STREAM].position[0].is_nan());
    }

    #[test]
    fn only_declared_streams_are_referenced() {
        let metadata = declare_metadata();
        let message = FrameEncoder::default().encode(&metadata, 3, &pose());
        assert!(xviz::validate_message(&metadata, &message).is_ok());
        for name in message.as_state_update().unwrap().stream_names() {
            assert!(metadata.declares(name));
        }
    }
}
