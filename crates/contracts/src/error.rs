//! Layered error definitions
//!
//! Categorized by source: config / carla / sync / sink

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== CARLA Errors =====
    /// CARLA connection error
    #[error("carla connection error: {message}")]
    CarlaConnection { message: String },

    /// CARLA actor not found
    #[error("carla actor not found: {actor_id}")]
    CarlaActorNotFound { actor_id: u32 },

    /// World-level RPC failure (settings, tick, spectator)
    #[error("carla world error: {message}")]
    CarlaWorld { message: String },

    // ===== Sync Errors =====
    /// The tick did not deliver every sensor reading in time
    #[error("sync timeout at frame {frame}: waited {waited_ms}ms for sensors: {missing:?}")]
    SyncTimeout {
        frame: u64,
        waited_ms: u64,
        missing: Vec<String>,
    },

    /// A reading belongs to a different frame than the snapshot
    #[error("desync on sensor '{sensor_id}': expected frame {expected}, got {actual}")]
    Desync {
        sensor_id: String,
        expected: u64,
        actual: u64,
    },

    /// A sensor queue was closed while waiting
    #[error("sensor '{sensor_id}' stopped delivering data")]
    SensorDisconnected { sensor_id: String },

    // ===== Sink Errors =====
    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    /// Write attempted after close
    #[error("sink '{sink_name}' is closed")]
    SinkClosed { sink_name: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create world error
    pub fn carla_world(message: impl Into<String>) -> Self {
        Self::CarlaWorld {
            message: message.into(),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Create sink closed error
    pub fn sink_closed(sink_name: impl Into<String>) -> Self {
        Self::SinkClosed {
            sink_name: sink_name.into(),
        }
    }

    /// Whether this error breaks the one-frame-per-tick guarantee
    pub fn is_sync_failure(&self) -> bool {
        matches!(
            self,
            Self::SyncTimeout { .. } | Self::Desync { .. } | Self::SensorDisconnected { .. }
        )
    }

    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConfigParse { .. } | Self::ConfigValidation { .. } => "config",
            Self::CarlaConnection { .. } => "connection",
            Self::CarlaActorNotFound { .. } => "actor_not_found",
            Self::CarlaWorld { .. } => "world",
            Self::SyncTimeout { .. } => "sync_timeout",
            Self::Desync { .. } => "desync",
            Self::SensorDisconnected { .. } => "sensor_disconnected",
            Self::SinkWrite { .. } => "sink_write",
            Self::SinkClosed { .. } => "sink_closed",
            Self::Io(_) => "io",
            Self::Other(_) => "other",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_failures_are_classified() {
        let timeout = ContractError::SyncTimeout {
            frame: 7,
            waited_ms: 2000,
            missing: vec!["lidar".into()],
        };
        assert!(timeout.is_sync_failure());
        assert_eq!(timeout.kind(), "sync_timeout");
        assert!(timeout.to_string().contains("lidar"));

        let closed = ContractError::sink_closed("xviz");
        assert!(!closed.is_sync_failure());
        assert_eq!(closed.to_string(), "sink 'xviz' is closed");
    }
}
