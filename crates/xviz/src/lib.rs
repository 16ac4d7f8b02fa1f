//! # XVIZ
//!
//! Builders for XVIZ metadata and state-update messages.
//!
//! The data model itself lives in `contracts`; this crate only assembles it
//! and checks that messages agree with their metadata.
//!
//! ```
//! use contracts::{Category, CoordinateType, PrimitiveType};
//! use xviz::{XvizBuilder, XvizMetadataBuilder};
//!
//! let metadata = XvizMetadataBuilder::new()
//!     .stream("/vehicle_pose")
//!     .category(Category::Pose)
//!     .stream("/points")
//!     .category(Category::Primitive)
//!     .coordinate(CoordinateType::VehicleRelative)
//!     .primitive_type(PrimitiveType::Point)
//!     .build();
//!
//! let mut builder = XvizBuilder::new(&metadata);
//! builder
//!     .pose("/vehicle_pose")
//!     .timestamp(0.5)
//!     .orientation(0.0, 0.0, 90.0)
//!     .position(1.0, 2.0, 0.0);
//! builder.primitive("/points").points(&[[3.0, 0.0, 0.0]]).colors(&[[200, 40, 80]]);
//! let message = builder.get_message();
//! assert_eq!(message.timestamp(), Some(0.5));
//! ```

mod builder;
mod error;
mod metadata;
mod validate;

pub use builder::{PoseBuilder, PrimitiveBuilder, XvizBuilder};
pub use error::XvizError;
pub use metadata::XvizMetadataBuilder;
pub use validate::{validate_message, validate_metadata};
