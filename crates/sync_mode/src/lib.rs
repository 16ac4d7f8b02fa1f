//! # Sync Mode
//!
//! Frame-locked tick primitive.
//!
//! Switches the simulator into synchronous mode with a fixed step, keeps one
//! bounded queue per sensor and, for each tick, waits until every sensor has
//! delivered the reading for exactly the snapshot's frame.
//!
//! ```text
//! world.tick() ──► snapshot.frame = N
//!                    │
//!   camera queue ──► [N-1 (stale, dropped)] [N] ─┐
//!   lidar  queue ──► [N] ────────────────────────┼─► SyncTick { snapshot, readings }
//! ```

mod error;
mod lane;
mod mode;

pub use error::SyncModeError;
pub use mode::{SyncMode, DEFAULT_QUEUE_CAPACITY};
