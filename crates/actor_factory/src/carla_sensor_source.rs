//! CARLA Sensor as `SensorSource`
//!
//! Only compiled when `real-carla` feature is enabled.
//!
//! The tick barrier only matches readings by frame, so the native measurement
//! is reduced to its frame stamp and the payload is not copied out of CARLA.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use carla::client::Sensor;
use carla::sensor::SensorDataBase;
use contracts::{SensorReading, SensorReadingCallback, SensorSource, SensorType};
use tracing::{debug, trace, warn};

/// Frame-stamp source over a spawned CARLA sensor
pub struct CarlaSensorSource {
    sensor_id: String,
    sensor_type: SensorType,
    sensor: Sensor,
    listening: Arc<AtomicBool>,
    received: Arc<AtomicU64>,
}

impl CarlaSensorSource {
    pub fn new(sensor_id: String, sensor_type: SensorType, sensor: Sensor) -> Self {
        Self {
            sensor_id,
            sensor_type,
            sensor,
            listening: Arc::new(AtomicBool::new(false)),
            received: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Measurements delivered since the first `listen`
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }
}

impl SensorSource for CarlaSensorSource {
    fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    fn sensor_type(&self) -> SensorType {
        self.sensor_type
    }

    fn listen(&self, callback: SensorReadingCallback) {
        if self.listening.swap(true, Ordering::SeqCst) {
            warn!(sensor_id = %self.sensor_id, "sensor already listening");
            return;
        }

        let sensor_id = self.sensor_id.clone();
        let sensor_type = self.sensor_type;
        let listening = self.listening.clone();
        let received = self.received.clone();

        debug!(sensor_id = %sensor_id, blueprint = sensor_type.blueprint(), "listening on CARLA sensor");

        // runs on the CARLA client thread
        self.sensor.listen(move |data| {
            if !listening.load(Ordering::Relaxed) {
                return;
            }
            let frame = data.frame() as u64;
            received.fetch_add(1, Ordering::Relaxed);
            trace!(sensor_id = %sensor_id, frame, "measurement");
            callback(SensorReading::new(
                sensor_id.as_str(),
                sensor_type,
                frame,
                data.timestamp(),
            ));
        });
    }

    fn stop(&self) {
        if self.listening.swap(false, Ordering::SeqCst) {
            debug!(
                sensor_id = %self.sensor_id,
                received = self.received(),
                "stopping CARLA sensor"
            );
            self.sensor.stop();
        }
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }
}
