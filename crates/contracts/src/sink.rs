//! TraceSink trait - trace output interface
//!
//! Defines the abstract interface for trace writers.

use crate::{ContractError, XvizMessage};

/// Trace output trait
///
/// An append-only stream of XVIZ messages.
///
/// Contract:
/// - `close` is safe to call more than once; only the first call has an effect
/// - `write` after `close` returns [`ContractError::SinkClosed`]
#[trait_variant::make(TraceSink: Send)]
pub trait LocalTraceSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Append one message
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write(&mut self, message: &XvizMessage) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}
