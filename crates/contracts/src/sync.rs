//! SyncTick - tick primitive output
//!
//! One simulation step with exactly one reading per attached sensor.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ContractError, SensorReading, Snapshot};

/// Synchronized tick
///
/// Every reading carries `snapshot.frame`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncTick {
    /// World snapshot (authoritative frame index)
    pub snapshot: Snapshot,

    /// One reading per sensor, in sensor registration order
    pub readings: Vec<SensorReading>,
}

impl SyncTick {
    /// Frame index of this tick
    pub fn frame(&self) -> u64 {
        self.snapshot.frame
    }

    /// Look up a reading by sensor ID
    pub fn reading(&self, sensor_id: &str) -> Option<&SensorReading> {
        self.readings.iter().find(|r| r.sensor_id == sensor_id)
    }

    /// Whether every reading belongs to the snapshot frame
    pub fn is_aligned(&self) -> bool {
        self.readings.iter().all(|r| r.frame == self.snapshot.frame)
    }
}

/// Tick primitive
///
/// Fails with [`ContractError::SyncTimeout`] when readings do not arrive
/// within `timeout`, and with [`ContractError::Desync`] when a reading
/// belongs to another frame.
#[trait_variant::make(TickSource: Send)]
pub trait LocalTickSource {
    async fn tick(&mut self, timeout: Duration) -> Result<SyncTick, ContractError>;
}
