//! RuntimeGraph - Actor Factory output
//!
//! Runtime actor handles, kept in creation order.

/// CARLA actor handle type
pub type ActorId = u32;

/// A spawned actor together with its config ID
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnedActor {
    /// Config ID (e.g. "ego", "lidar")
    pub config_id: String,
    /// CARLA actor handle
    pub actor_id: ActorId,
}

/// Runtime actor graph
///
/// Sensors are stored in spawn order so teardown can walk them backwards.
#[derive(Debug, Clone, Default)]
pub struct RuntimeGraph {
    /// The driven vehicle
    pub vehicle: Option<SpawnedActor>,

    /// Sensors attached to the vehicle, in spawn order
    pub sensors: Vec<SpawnedActor>,
}

impl RuntimeGraph {
    /// Create empty RuntimeGraph
    pub fn new() -> Self {
        Self::default()
    }

    /// Register vehicle
    pub fn register_vehicle(&mut self, config_id: impl Into<String>, actor_id: ActorId) {
        self.vehicle = Some(SpawnedActor {
            config_id: config_id.into(),
            actor_id,
        });
    }

    /// Register sensor
    pub fn register_sensor(&mut self, config_id: impl Into<String>, actor_id: ActorId) {
        self.sensors.push(SpawnedActor {
            config_id: config_id.into(),
            actor_id,
        });
    }

    /// Vehicle actor handle
    pub fn vehicle_id(&self) -> Option<ActorId> {
        self.vehicle.as_ref().map(|v| v.actor_id)
    }

    /// All actor handles in the order they must be destroyed:
    /// sensors newest first, then the vehicle.
    pub fn teardown_order(&self) -> Vec<&SpawnedActor> {
        self.sensors
            .iter()
            .rev()
            .chain(self.vehicle.as_ref())
            .collect()
    }

    /// Number of live actors
    pub fn len(&self) -> usize {
        self.sensors.len() + usize::from(self.vehicle.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
