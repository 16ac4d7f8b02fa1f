//! # Actor Factory
//!
//! CARLA provisioning module.
//!
//! Responsibilities:
//! - Connect to the simulator and load the target map if needed
//! - Spawn the vehicle and its sensors from `VehicleConfig`
//! - Provide teardown (reverse spawn order) and rollback
//! - Provide unified `SensorSource` abstraction
//! - Provide a tick-driven mock world for tests and dry runs
//!
//! ## Feature Flags
//!
//! - `real-carla`: Enable real CARLA client (requires carla crate)

pub mod client;
pub mod error;
pub mod factory;
pub mod mock_client;
pub mod mock_sensor;

#[cfg(feature = "real-carla")]
pub mod carla_client;
#[cfg(feature = "real-carla")]
pub mod carla_sensor_source;

pub use client::CarlaClient;
pub use contracts::{ActorId, RuntimeGraph, SensorSource, VehicleConfig};
pub use error::{ActorFactoryError, Result};
pub use factory::ActorFactory;
pub use mock_client::{recorder_spawn_point, EventLog, MockCarlaClient, MockConfig};
pub use mock_sensor::{MockSensor, MockSensorConfig, SensorTap};

#[cfg(feature = "real-carla")]
pub use carla_client::RealCarlaClient;
#[cfg(feature = "real-carla")]
pub use carla_sensor_source::CarlaSensorSource;
