//! World-level contracts: episode settings, snapshots, pose reads.

use serde::{Deserialize, Serialize};

use crate::{ActorId, ContractError, Transform};

/// Episode settings relevant to frame-locked capture
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldSettings {
    /// Server waits for a client tick before advancing
    pub synchronous_mode: bool,
    /// Fixed simulation step (seconds), None = variable step
    pub fixed_delta_seconds: Option<f64>,
}

impl WorldSettings {
    /// Synchronous settings for the given frame rate
    pub fn synchronous(frame_rate: f64) -> Self {
        Self {
            synchronous_mode: true,
            fixed_delta_seconds: Some(1.0 / frame_rate),
        }
    }
}

/// The simulator's record of one tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Authoritative frame index
    pub frame: u64,
    /// Simulation time since episode start (seconds)
    pub elapsed_seconds: f64,
}

/// World control used by the synchronous tick primitive
#[trait_variant::make(SimWorld: Send)]
pub trait LocalSimWorld {
    /// Current episode settings
    async fn settings(&self) -> Result<WorldSettings, ContractError>;

    /// Apply episode settings
    async fn apply_settings(&self, settings: WorldSettings) -> Result<(), ContractError>;

    /// Advance the simulation by one step and return its snapshot
    async fn tick(&self) -> Result<Snapshot, ContractError>;
}

/// Read access to actor poses plus the observer viewpoint
#[trait_variant::make(ActorView: Send)]
pub trait LocalActorView {
    /// Current world transform of an actor (no side effects)
    async fn actor_transform(&self, actor_id: ActorId) -> Result<Transform, ContractError>;

    /// Move the spectator camera
    async fn set_spectator_transform(&self, transform: Transform) -> Result<(), ContractError>;
}
