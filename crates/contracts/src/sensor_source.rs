//! SensorSource trait - Sensor data source abstraction
//!
//! Decouples the tick barrier from concrete sensor implementations, so real
//! CARLA sensors and mock sensors feed the same per-sensor queues.

use std::sync::Arc;

use crate::{SensorReading, SensorType};

/// Sensor data callback type
///
/// Invoked on the producer's thread once per sensor frame.
pub type SensorReadingCallback = Arc<dyn Fn(SensorReading) + Send + Sync>;

/// Sensor data source trait
///
/// # Example
///
/// ```ignore
/// let sensor: Box<dyn SensorSource> = client.get_sensor_source(actor_id, "lidar".into(), SensorType::Lidar)?;
/// sensor.listen(Arc::new(move |reading| {
///     let _ = tx.try_send(reading);
/// }));
/// // ... tick ...
/// sensor.stop();
/// ```
pub trait SensorSource: Send + Sync {
    /// Get sensor ID
    fn sensor_id(&self) -> &str;

    /// Get sensor type
    fn sensor_type(&self) -> SensorType;

    /// Register data callback
    ///
    /// Repeated calls while already listening are ignored.
    fn listen(&self, callback: SensorReadingCallback);

    /// Stop listening
    fn stop(&self);

    /// Check if currently listening
    fn is_listening(&self) -> bool;
}
