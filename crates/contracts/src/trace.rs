//! XVIZ message model
//!
//! Serializes to the XVIZ 2.0 JSON envelope
//! (`{"type": "xviz/...", "data": {...}}`).
//! Stream maps are `BTreeMap` so output is byte-stable across runs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// XVIZ protocol version written into metadata
pub const XVIZ_VERSION: &str = "2.0.0";

/// One unit of the trace stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum XvizMessage {
    /// Stream schema, written once before any state update
    #[serde(rename = "xviz/metadata")]
    Metadata(XvizMetadata),

    /// Per-frame data
    #[serde(rename = "xviz/state_update")]
    StateUpdate(StateUpdate),
}

impl XvizMessage {
    pub fn is_metadata(&self) -> bool {
        matches!(self, Self::Metadata(_))
    }

    pub fn as_metadata(&self) -> Option<&XvizMetadata> {
        match self {
            Self::Metadata(metadata) => Some(metadata),
            Self::StateUpdate(_) => None,
        }
    }

    pub fn as_state_update(&self) -> Option<&StateUpdate> {
        match self {
            Self::StateUpdate(update) => Some(update),
            Self::Metadata(_) => None,
        }
    }

    /// Timestamp of the first stream set (None for metadata)
    pub fn timestamp(&self) -> Option<f64> {
        self.as_state_update()
            .and_then(|u| u.updates.first())
            .map(|set| set.timestamp)
    }
}

/// Stream schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XvizMetadata {
    pub version: String,
    pub streams: BTreeMap<String, StreamMetadata>,
}

impl XvizMetadata {
    pub fn declares(&self, stream: &str) -> bool {
        self.streams.contains_key(stream)
    }
}

/// Declaration of one stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamMetadata {
    pub category: Category,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinate: Option<CoordinateType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primitive_type: Option<PrimitiveType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_style: Option<StreamStyle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Pose,
    Primitive,
    TimeSeries,
    Variable,
    UiPrimitive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoordinateType {
    Identity,
    Geographic,
    VehicleRelative,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrimitiveType {
    Circle,
    Point,
    Polygon,
    Polyline,
    Text,
}

/// Stream-level style
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamStyle {
    /// RGBA
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<[u8; 4]>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius_pixels: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdateType {
    #[default]
    Snapshot,
    Incremental,
}

/// Per-frame state update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateUpdate {
    pub update_type: UpdateType,
    pub updates: Vec<StreamSet>,
}

impl StateUpdate {
    /// Every stream name referenced by this update
    pub fn stream_names(&self) -> impl Iterator<Item = &str> {
        self.updates.iter().flat_map(|set| set.stream_names())
    }
}

/// All stream data for one timestamp
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamSet {
    pub timestamp: f64,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub poses: BTreeMap<String, PoseState>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub primitives: BTreeMap<String, PrimitiveState>,
}

impl StreamSet {
    pub fn stream_names(&self) -> impl Iterator<Item = &str> {
        self.poses
            .keys()
            .chain(self.primitives.keys())
            .map(String::as_str)
    }
}

/// Vehicle pose
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseState {
    pub timestamp: f64,
    /// `[roll, pitch, yaw]`
    pub orientation: [f64; 3],
    /// `[x, y, z]`
    pub position: [f64; 3],
}

/// Primitives of one stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrimitiveState {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub points: Vec<PointPrimitive>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub circles: Vec<CirclePrimitive>,
}

/// Common primitive fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimitiveBase {
    pub object_id: String,
}

/// Colored point set, flat `[x, y, z, ...]` with flat `[r, g, b, ...]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointPrimitive {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<PrimitiveBase>,

    pub points: Vec<f64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub colors: Vec<u8>,
}

impl PointPrimitive {
    pub fn point_count(&self) -> usize {
        self.points.len() / 3
    }

    pub fn color_count(&self) -> usize {
        self.colors.len() / 3
    }

    /// Points and colors are whole triples and pair up one to one
    pub fn is_well_formed(&self) -> bool {
        self.points.len() % 3 == 0
            && self.colors.len() % 3 == 0
            && (self.colors.is_empty() || self.point_count() == self.color_count())
    }

    pub fn object_id(&self) -> Option<&str> {
        self.base.as_ref().map(|b| b.object_id.as_str())
    }
}

/// Filled circle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CirclePrimitive {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<PrimitiveBase>,

    pub center: [f64; 3],

    pub radius: f64,
}
