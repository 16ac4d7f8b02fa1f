//! XvizJsonWriter - XVIZ JSON directory layout

use contracts::{ContractError, TraceSink, XvizMessage};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use crate::Source;

const INDEX_FILE: &str = "0-frame.json";
const METADATA_INDEX: usize = 1;
const FIRST_UPDATE_INDEX: usize = 2;

/// `[start, end, file index, file stem]` of one state update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry(pub f64, pub f64, pub usize, pub String);

/// Contents of `0-frame.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceIndex {
    pub start_time: f64,
    pub end_time: f64,
    pub messages: Vec<IndexEntry>,
}

/// Running totals of one writer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    /// Messages written (metadata included)
    pub messages: u64,
    /// Bytes written (index included)
    pub bytes: u64,
}

/// Writes an XVIZ message stream as numbered JSON files
///
/// - `1-frame.json`: the metadata, exactly once and before any update
/// - `N-frame.json` (N >= 2): state updates in arrival order
/// - `0-frame.json`: the index, written by the first `close`
pub struct XvizJsonWriter<S: Source> {
    name: String,
    source: S,
    metadata_written: bool,
    next_index: usize,
    index: TraceIndex,
    closed: bool,
    stats: WriterStats,
}

impl<S: Source> XvizJsonWriter<S> {
    pub fn new(name: impl Into<String>, source: S) -> Self {
        Self {
            name: name.into(),
            source,
            metadata_written: false,
            next_index: FIRST_UPDATE_INDEX,
            index: TraceIndex::default(),
            closed: false,
            stats: WriterStats::default(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn stats(&self) -> WriterStats {
        self.stats
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of state updates written so far
    pub fn update_count(&self) -> usize {
        self.index.messages.len()
    }

    fn persist<T: Serialize>(&mut self, file_index: usize, value: &T) -> Result<(), ContractError> {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
        let file = format!("{file_index}-frame.json");

        self.source.write_file(&file, &bytes).map_err(|e| {
            error!(sink = %self.name, file = %file, error = %e, "Write failed");
            ContractError::sink_write(&self.name, format!("{file}: {e}"))
        })?;

        self.stats.bytes += bytes.len() as u64;
        observability::record_trace_bytes(&self.name, bytes.len());
        Ok(())
    }

    fn append(&mut self, message: &XvizMessage) -> Result<(), ContractError> {
        match message {
            XvizMessage::Metadata(_) => {
                if self.metadata_written {
                    return Err(ContractError::sink_write(
                        &self.name,
                        "metadata already written",
                    ));
                }
                self.persist(METADATA_INDEX, message)?;
                self.metadata_written = true;
            }
            XvizMessage::StateUpdate(_) => {
                if !self.metadata_written {
                    return Err(ContractError::sink_write(
                        &self.name,
                        "state update before metadata",
                    ));
                }
                let file_index = self.next_index;
                if has_non_finite_pose(message) {
                    warn!(
                        sink = %self.name,
                        file_index,
                        "Non-finite pose written as null, file will not parse back"
                    );
                }
                self.persist(file_index, message)?;
                self.next_index += 1;

                let timestamp = message.timestamp().unwrap_or(0.0);
                if self.index.messages.is_empty() {
                    self.index.start_time = timestamp;
                }
                self.index.end_time = timestamp;
                self.index.messages.push(IndexEntry(
                    timestamp,
                    timestamp,
                    file_index,
                    format!("{file_index}-frame"),
                ));
            }
        }
        self.stats.messages += 1;
        Ok(())
    }

    fn write_index(&mut self) -> Result<(), ContractError> {
        let bytes = serde_json::to_vec(&self.index)
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
        self.source
            .write_file(INDEX_FILE, &bytes)
            .map_err(|e| ContractError::sink_write(&self.name, format!("{INDEX_FILE}: {e}")))?;
        self.stats.bytes += bytes.len() as u64;
        observability::record_trace_bytes(&self.name, bytes.len());
        Ok(())
    }
}

impl<S: Source> TraceSink for XvizJsonWriter<S> {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "xviz_writer_write",
        skip(self, message),
        fields(sink = %self.name, metadata = message.is_metadata())
    )]
    async fn write(&mut self, message: &XvizMessage) -> Result<(), ContractError> {
        if self.closed {
            return Err(ContractError::sink_closed(&self.name));
        }
        self.append(message)
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        // Each message is its own file; nothing is buffered.
        Ok(())
    }

    #[instrument(name = "xviz_writer_close", skip(self), fields(sink = %self.name))]
    async fn close(&mut self) -> Result<(), ContractError> {
        if self.closed {
            debug!(sink = %self.name, "Already closed");
            return Ok(());
        }
        self.closed = true;
        self.write_index()?;

        info!(
            sink = %self.name,
            location = %self.source.location(),
            updates = self.index.messages.len(),
            bytes = self.stats.bytes,
            "Trace closed"
        );
        Ok(())
    }
}

/// serde_json serializes NaN/inf as `null`
fn has_non_finite_pose(message: &XvizMessage) -> bool {
    message.as_state_update().is_some_and(|update| {
        update.updates.iter().any(|set| {
            set.poses.values().any(|pose| {
                pose.position
                    .iter()
                    .chain(pose.orientation.iter())
                    .any(|v| !v.is_finite())
            })
        })
    })
}
