//! Sync mode error types

use contracts::ContractError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncModeError {
    /// `enter` called twice
    #[error("synchronous mode already entered")]
    AlreadyEntered,

    /// `tick` before `enter`
    #[error("synchronous mode not entered")]
    NotEntered,

    /// Invalid frame rate
    #[error("frame rate must be positive and finite, got {0}")]
    InvalidFrameRate(f64),

    /// World settings or tick failure
    #[error(transparent)]
    World(#[from] ContractError),
}

impl From<SyncModeError> for ContractError {
    fn from(err: SyncModeError) -> Self {
        match err {
            SyncModeError::World(inner) => inner,
            other => ContractError::Other(other.to_string()),
        }
    }
}
