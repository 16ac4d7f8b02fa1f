//! # Contracts
//!
//! Frozen interface contracts (ICD), defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - The CARLA frame index (`u64`) is the authoritative clock of a capture session
//! - Trace timestamps are derived as `frame / frame_rate` (seconds, f64)

mod blueprint;
mod error;
mod runtime;
mod sensor;
mod sensor_source;
mod sink;
mod sync;
mod trace;
mod world;

pub use blueprint::*;
pub use error::*;
pub use runtime::*;
pub use sensor::*;
pub use sensor_source::{SensorReadingCallback, SensorSource};
pub use sink::*;
pub use sync::*;
pub use trace::*;
pub use world::*;
