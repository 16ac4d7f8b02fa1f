//! Capture error types

use actor_factory::ActorFactoryError;
use contracts::ContractError;
use sync_mode::SyncModeError;
use thiserror::Error;

/// Why a capture session failed
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Actor provisioning failed before capture started
    #[error("provisioning failed: {0}")]
    Provisioning(#[from] ActorFactoryError),

    /// Entering or leaving synchronous mode failed
    #[error("synchronous mode: {0}")]
    SyncMode(#[from] SyncModeError),

    /// Tick timed out or sensors desynchronized
    #[error("tick failed: {0}")]
    Tick(#[source] ContractError),

    /// Snapshot frame did not advance
    #[error("frame order violated: frame {frame} after {previous}")]
    FrameOrder { previous: u64, frame: u64 },

    /// Vehicle pose could not be read
    #[error("pose read failed: {0}")]
    Pose(#[source] ContractError),

    /// Spectator could not be moved
    #[error("spectator update failed: {0}")]
    Spectator(#[source] ContractError),

    /// Output writer could not be created
    #[error("output unavailable: {0}")]
    Output(#[source] ContractError),

    /// Appending to the trace failed (`frame` is None for the metadata)
    #[error("write failed at frame {frame:?}: {source}")]
    Write {
        frame: Option<u64>,
        #[source]
        source: ContractError,
    },

    /// Closing the trace failed during release
    #[error("closing trace failed: {0}")]
    Close(#[source] ContractError),

    /// API misuse (e.g. running a loop twice)
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
}

impl CaptureError {
    pub fn write(frame: Option<u64>, source: ContractError) -> Self {
        Self::Write { frame, source }
    }

    /// Timeout or desync, the expected ways a synchronized capture ends badly
    pub fn is_sync_failure(&self) -> bool {
        match self {
            Self::Tick(e) => e.is_sync_failure(),
            Self::FrameOrder { .. } => true,
            _ => false,
        }
    }

    /// 指标标签
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Provisioning(_) => "provisioning",
            Self::SyncMode(_) => "sync_mode",
            Self::Tick(e) => e.kind(),
            Self::FrameOrder { .. } => "frame_order",
            Self::Pose(_) => "pose",
            Self::Spectator(_) => "spectator",
            Self::Output(_) => "output",
            Self::Write { .. } => "write",
            Self::Close(_) => "close",
            Self::InvalidState(_) => "invalid_state",
        }
    }
}
