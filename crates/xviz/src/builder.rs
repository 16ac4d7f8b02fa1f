//! State-update builder

use std::collections::BTreeMap;

use contracts::{
    CirclePrimitive, PointPrimitive, PoseState, PrimitiveBase, PrimitiveState, StateUpdate,
    StreamSet, UpdateType, XvizMessage, XvizMetadata,
};

/// Assembles one snapshot `xviz/state_update`
///
/// Streams must be declared in the metadata passed to `new`; using an
/// undeclared stream is a programming error and panics in debug builds.
#[derive(Debug)]
pub struct XvizBuilder<'m> {
    metadata: &'m XvizMetadata,
    timestamp: Option<f64>,
    poses: BTreeMap<String, PoseState>,
    primitives: BTreeMap<String, PrimitiveState>,
}

impl<'m> XvizBuilder<'m> {
    pub fn new(metadata: &'m XvizMetadata) -> Self {
        Self {
            metadata,
            timestamp: None,
            poses: BTreeMap::new(),
            primitives: BTreeMap::new(),
        }
    }

    pub fn metadata(&self) -> &XvizMetadata {
        self.metadata
    }

    /// Start (or continue) a pose on `stream`
    pub fn pose(&mut self, stream: &str) -> PoseBuilder<'_> {
        self.check_declared(stream);
        let state = self.poses.entry(stream.to_string()).or_insert(PoseState {
            timestamp: 0.0,
            orientation: [0.0; 3],
            position: [0.0; 3],
        });
        PoseBuilder {
            state,
            message_timestamp: &mut self.timestamp,
        }
    }

    /// Start (or continue) primitives on `stream`
    pub fn primitive(&mut self, stream: &str) -> PrimitiveBuilder<'_> {
        self.check_declared(stream);
        PrimitiveBuilder {
            state: self.primitives.entry(stream.to_string()).or_default(),
            last: None,
        }
    }

    /// Consume the builder into a snapshot state update
    ///
    /// The message timestamp is the first pose timestamp set, 0 if none.
    pub fn get_message(self) -> XvizMessage {
        let message = XvizMessage::StateUpdate(StateUpdate {
            update_type: UpdateType::Snapshot,
            updates: vec![StreamSet {
                timestamp: self.timestamp.unwrap_or(0.0),
                poses: self.poses,
                primitives: self.primitives,
            }],
        });
        debug_assert!(
            crate::validate_message(self.metadata, &message).is_ok(),
            "state update disagrees with metadata: {:?}",
            crate::validate_message(self.metadata, &message)
        );
        message
    }

    fn check_declared(&self, stream: &str) {
        debug_assert!(
            self.metadata.declares(stream),
            "stream '{stream}' is not declared in metadata"
        );
    }
}

/// Pose fields of one stream
#[derive(Debug)]
pub struct PoseBuilder<'a> {
    state: &'a mut PoseState,
    message_timestamp: &'a mut Option<f64>,
}

impl PoseBuilder<'_> {
    /// 秒
    pub fn timestamp(self, timestamp: f64) -> Self {
        self.state.timestamp = timestamp;
        self.message_timestamp.get_or_insert(timestamp);
        self
    }

    /// 角度, `roll, pitch, yaw`
    pub fn orientation(self, roll: f64, pitch: f64, yaw: f64) -> Self {
        self.state.orientation = [roll, pitch, yaw];
        self
    }

    pub fn position(self, x: f64, y: f64, z: f64) -> Self {
        self.state.position = [x, y, z];
        self
    }
}

#[derive(Debug, Clone, Copy)]
enum LastPrimitive {
    Point,
    Circle,
}

/// Primitives of one stream
///
/// `colors` and `id` apply to the primitive added most recently.
#[derive(Debug)]
pub struct PrimitiveBuilder<'a> {
    state: &'a mut PrimitiveState,
    last: Option<LastPrimitive>,
}

impl PrimitiveBuilder<'_> {
    /// Add a point set
    pub fn points(mut self, points: &[[f64; 3]]) -> Self {
        self.state.points.push(PointPrimitive {
            base: None,
            points: points.iter().flatten().copied().collect(),
            colors: Vec::new(),
        });
        self.last = Some(LastPrimitive::Point);
        self
    }

    /// Per-point RGB colors of the last point set
    pub fn colors(self, colors: &[[u8; 3]]) -> Self {
        debug_assert!(
            matches!(self.last, Some(LastPrimitive::Point)),
            "colors() must follow points()"
        );
        if let Some(point) = self.state.points.last_mut() {
            point.colors = colors.iter().flatten().copied().collect();
        }
        self
    }

    /// Add a circle
    pub fn circle(mut self, center: [f64; 3], radius: f64) -> Self {
        self.state.circles.push(CirclePrimitive {
            base: None,
            center,
            radius,
        });
        self.last = Some(LastPrimitive::Circle);
        self
    }

    /// Object id of the last primitive
    pub fn id(self, object_id: &str) -> Self {
        let base = Some(PrimitiveBase {
            object_id: object_id.to_string(),
        });
        match self.last {
            Some(LastPrimitive::Point) => {
                if let Some(point) = self.state.points.last_mut() {
                    point.base = base;
                }
            }
            Some(LastPrimitive::Circle) => {
                if let Some(circle) = self.state.circles.last_mut() {
                    circle.base = base;
                }
            }
            None => debug_assert!(false, "id() must follow a primitive"),
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use contracts::{Category, CoordinateType, PrimitiveType};

    use super::*;
    use crate::XvizMetadataBuilder;

    fn metadata() -> XvizMetadata {
        XvizMetadataBuilder::new()
            .stream("/vehicle_pose")
            .category(Category::Pose)
            .stream("/circle")
            .category(Category::Primitive)
            .coordinate(CoordinateType::Identity)
            .primitive_type(PrimitiveType::Circle)
            .stream_style(Default::default())
            .stream("/points")
            .category(Category::Primitive)
            .coordinate(CoordinateType::VehicleRelative)
            .primitive_type(PrimitiveType::Point)
            .build()
    }

    #[test]
    fn pose_and_points_in_one_snapshot() {
        let metadata = metadata();
        let mut builder = XvizBuilder::new(&metadata);
        builder
            .pose("/vehicle_pose")
            .timestamp(11.0 / 30.0)
            .orientation(0.0, 0.0, 180.0)
            .position(229.5, 55.4, 0.1);
        builder
            .primitive("/points")
            .points(&[[3.0, 0.0, 0.0], [0.0, 3.0, 0.0]])
            .colors(&[[200, 40, 80], [80, 40, 200]])
            .id("indicator");

        let message = builder.get_message();
        let update = message.as_state_update().unwrap();
        assert_eq!(update.update_type, UpdateType::Snapshot);
        assert_eq!(update.updates.len(), 1);

        let set = &update.updates[0];
        assert_eq!(set.timestamp, 11.0 / 30.0);
        assert_eq!(set.poses["/vehicle_pose"].orientation, [0.0, 0.0, 180.0]);

        let points = &set.primitives["/points"].points[0];
        assert_eq!(points.points, vec![3.0, 0.0, 0.0, 0.0, 3.0, 0.0]);
        assert_eq!(points.colors, vec![200, 40, 80, 80, 40, 200]);
        assert_eq!(points.object_id(), Some("indicator"));
        assert!(!set.primitives.contains_key("/circle"));
    }

    #[test]
    fn circle_with_id() {
        let metadata = metadata();
        let mut builder = XvizBuilder::new(&metadata);
        builder
            .primitive("/circle")
            .circle([1.0, 2.0, 0.0], 0.5)
            .id("marker");

        let message = builder.get_message();
        assert_eq!(message.timestamp(), Some(0.0));
        let set = &message.as_state_update().unwrap().updates[0];
        let circle = &set.primitives["/circle"].circles[0];
        assert_eq!(circle.radius, 0.5);
        assert_eq!(circle.base.as_ref().unwrap().object_id, "marker");
    }

    #[test]
    fn serializes_as_state_update_envelope() {
        let metadata = metadata();
        let mut builder = XvizBuilder::new(&metadata);
        builder.pose("/vehicle_pose").timestamp(1.0);
        builder.primitive("/points").points(&[[0.0, 0.0, 3.0]]).colors(&[[80, 200, 40]]);

        let value = serde_json::to_value(builder.get_message()).unwrap();
        assert_eq!(value["type"], "xviz/state_update");
        assert_eq!(value["data"]["update_type"], "SNAPSHOT");
        let set = &value["data"]["updates"][0];
        assert_eq!(set["timestamp"], 1.0);
        assert_eq!(set["primitives"]["/points"]["points"][0]["colors"][1], 200);
        assert!(set["primitives"]["/points"].get("circles").is_none());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "not declared")]
    fn undeclared_stream_panics_in_debug() {
        let metadata = metadata();
        let mut builder = XvizBuilder::new(&metadata);
        builder.pose("/unknown");
    }
}
