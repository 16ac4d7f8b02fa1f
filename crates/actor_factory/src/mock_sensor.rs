//! Mock sensor implementation
//!
//! Implements `SensorSource` trait, generates simulated sensor data.
//! Used for testing and development without CARLA environment.
//!
//! Unlike a free-running producer, a mock sensor only fires when the
//! [`MockCarlaClient`](crate::MockCarlaClient) ticks the world, so every
//! reading carries the frame index of the snapshot that produced it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use contracts::{SensorReading, SensorReadingCallback, SensorSource, SensorType};
use tracing::{debug, trace};

/// Mock sensor configuration
#[derive(Debug, Clone)]
pub struct MockSensorConfig {
    /// Image width (Camera only)
    pub image_width: u32,
    /// Image height (Camera only)
    pub image_height: u32,
    /// LiDAR point count (Lidar only)
    pub lidar_points: u32,
}

impl Default for MockSensorConfig {
    fn default() -> Self {
        Self {
            image_width: 64,
            image_height: 48,
            lidar_points: 256,
        }
    }
}

type FrameEmitter = Box<dyn Fn(u64, f64) + Send + Sync>;

/// Delivery point between the simulated world and a listening sensor
///
/// The world calls [`SensorTap::emit`] once per frame; the tap forwards to
/// whichever sensor is currently listening.
#[derive(Default)]
pub struct SensorTap {
    emitter: Mutex<Option<FrameEmitter>>,
}

impl SensorTap {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Deliver data for `frame`; returns false when nobody listens
    pub fn emit(&self, frame: u64, timestamp: f64) -> bool {
        match lock(&self.emitter).as_ref() {
            Some(emitter) => {
                emitter(frame, timestamp);
                true
            }
            None => false,
        }
    }

    pub fn is_attached(&self) -> bool {
        lock(&self.emitter).is_some()
    }

    fn attach(&self, emitter: FrameEmitter) {
        *lock(&self.emitter) = Some(emitter);
    }

    pub(crate) fn detach(&self) {
        lock(&self.emitter).take();
    }
}

/// Mock sensor
///
/// Implements `SensorSource` trait. Data is sent through callback function,
/// consistent with real CARLA sensor behavior.
pub struct MockSensor {
    sensor_id: String,
    sensor_type: SensorType,
    config: MockSensorConfig,
    tap: Arc<SensorTap>,
    listening: Arc<AtomicBool>,
}

impl MockSensor {
    /// Create new Mock sensor fed by `tap`
    pub fn new(
        sensor_id: String,
        sensor_type: SensorType,
        config: MockSensorConfig,
        tap: Arc<SensorTap>,
    ) -> Self {
        Self {
            sensor_id,
            sensor_type,
            config,
            tap,
            listening: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create Mock sensor with default configuration and its own tap
    pub fn with_defaults(sensor_id: String, sensor_type: SensorType) -> (Self, Arc<SensorTap>) {
        let tap = SensorTap::new();
        let sensor = Self::new(
            sensor_id,
            sensor_type,
            MockSensorConfig::default(),
            tap.clone(),
        );
        (sensor, tap)
    }

    /// Generate simulated data payload
    fn generate_payload(config: &MockSensorConfig, sensor_type: SensorType) -> Bytes {
        match sensor_type {
            SensorType::Camera => {
                let size = (config.image_width * config.image_height * 4) as usize;
                Bytes::from(vec![128u8; size])
            }
            SensorType::Lidar => {
                // x, y, z, intensity: f32 each
                let size = (config.lidar_points * 16) as usize;
                Bytes::from(vec![0u8; size])
            }
            SensorType::Imu => Bytes::from(vec![0u8; 7 * 8]),
            SensorType::Gnss => Bytes::from(vec![0u8; 3 * 8]),
            SensorType::Radar => Bytes::from(vec![0u8; 5 * 16]),
        }
    }
}

impl SensorSource for MockSensor {
    fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    fn sensor_type(&self) -> SensorType {
        self.sensor_type
    }

    fn listen(&self, callback: SensorReadingCallback) {
        // Idempotent: if already listening, don't register again
        if self.listening.swap(true, Ordering::SeqCst) {
            return;
        }

        let sensor_id = self.sensor_id.clone();
        let sensor_type = self.sensor_type;
        let payload = Self::generate_payload(&self.config, sensor_type);

        debug!(sensor_id = %sensor_id, sensor_type = ?sensor_type, "mock sensor started");

        self.tap.attach(Box::new(move |frame, timestamp| {
            trace!(sensor_id = %sensor_id, frame, timestamp, "mock reading sent");
            callback(
                SensorReading::new(sensor_id.clone(), sensor_type, frame, timestamp)
                    .with_payload(payload.clone()),
            );
        }));
    }

    fn stop(&self) {
        if self.listening.swap(false, Ordering::SeqCst) {
            self.tap.detach();
            debug!(sensor_id = %self.sensor_id, "mock sensor stopped");
        }
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
