//! CARLA client abstraction
//!
//! Defines traits for interacting with CARLA, supporting real implementation and mock testing.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use contracts::{ActorId, ActorView, SensorSource, SensorType, SimWorld, Transform};

use crate::error::Result;

/// CARLA client trait
///
/// Abstracts CARLA core operations for testing and future implementation replacement.
/// Supports unified interface for real CARLA client and Mock client.
///
/// World control (settings / tick) and pose reads come from the
/// [`SimWorld`] and [`ActorView`] supertraits, so one client value serves
/// the provisioning shell, the tick primitive and the capture loop.
pub trait CarlaClient: SimWorld + ActorView + Send + Sync {
    /// Connect to CARLA server
    ///
    /// `timeout` bounds every subsequent RPC.
    fn connect(
        &mut self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Name of the currently active map (e.g. "Carla/Maps/Town01")
    fn current_map(&self) -> impl Future<Output = Result<String>> + Send;

    /// Load a map, replacing the current episode
    fn load_map(&self, map: &str) -> impl Future<Output = Result<()>> + Send;

    /// Spawn vehicle
    ///
    /// # Arguments
    /// * `blueprint` - Blueprint name, e.g., "vehicle.jeep.wrangler_rubicon"
    /// * `transform` - Initial pose, None = first recommended spawn point
    /// * `autopilot` - Hand the vehicle to the traffic manager
    ///
    /// # Returns
    /// Newly created actor ID
    fn spawn_vehicle(
        &self,
        blueprint: &str,
        transform: Option<Transform>,
        autopilot: bool,
    ) -> impl Future<Output = Result<ActorId>> + Send;

    /// Spawn sensor and attach to parent actor
    ///
    /// # Arguments
    /// * `blueprint` - Blueprint name, e.g., "sensor.camera.rgb"
    /// * `transform` - Pose relative to parent actor
    /// * `parent_id` - Parent actor ID
    /// * `attributes` - Sensor attributes
    ///
    /// # Returns
    /// Newly created sensor actor ID
    fn spawn_sensor(
        &self,
        blueprint: &str,
        transform: Transform,
        parent_id: ActorId,
        attributes: &HashMap<String, String>,
    ) -> impl Future<Output = Result<ActorId>> + Send;

    /// Destroy actor
    ///
    /// Idempotent operation: returns Ok if actor doesn't exist
    fn destroy_actor(&self, actor_id: ActorId) -> impl Future<Output = Result<()>> + Send;

    /// Check if actor exists
    fn actor_exists(&self, actor_id: ActorId) -> impl Future<Output = Result<bool>> + Send;

    /// Get sensor data source
    ///
    /// Returns an object implementing `SensorSource`, consumed by the
    /// synchronous tick primitive. This is the core interface for unifying
    /// Mock and Real sensors.
    ///
    /// # Arguments
    /// * `actor_id` - Sensor's actor ID
    /// * `sensor_id` - Sensor configuration ID (for logging and tracing)
    /// * `sensor_type` - Sensor type
    ///
    /// # Returns
    /// Boxed trait object implementing `SensorSource`, None if actor doesn't exist
    fn get_sensor_source(
        &self,
        actor_id: ActorId,
        sensor_id: String,
        sensor_type: SensorType,
    ) -> Option<Box<dyn SensorSource>>;
}
