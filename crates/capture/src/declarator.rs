//! XVIZ stream declaration

use contracts::{Category, CoordinateType, PrimitiveType, StreamStyle, XvizMetadata};
use xviz::XvizMetadataBuilder;

pub const VEHICLE_POSE_STREAM: &str = "/vehicle_pose";
/// Declared for viewer compatibility, never populated
pub const CIRCLE_STREAM: &str = "/circle";
pub const POINTS_STREAM: &str = "/points";

/// Stream schema of every capture session
pub fn declare_metadata() -> XvizMetadata {
    XvizMetadataBuilder::new()
        .stream(VEHICLE_POSE_STREAM)
        .category(Category::Pose)
        .stream(CIRCLE_STREAM)
        .category(Category::Primitive)
        .primitive_type(PrimitiveType::Circle)
        .coordinate(CoordinateType::Identity)
        .stream_style(StreamStyle {
            fill_color: Some([200, 0, 70, 128]),
            ..Default::default()
        })
        .stream(POINTS_STREAM)
        .category(Category::Primitive)
        .primitive_type(PrimitiveType::Point)
        .coordinate(CoordinateType::VehicleRelative)
        .stream_style(StreamStyle {
            radius_pixels: Some(6.0),
            ..Default::default()
        })
        .build()
}
