//! Per-sensor queue

use std::cmp::Ordering as FrameOrdering;
use std::sync::Arc;

use async_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use contracts::{SensorReading, SensorSource};
use tokio::time::Instant;
use tracing::{trace, warn};

/// Why a lane could not produce the reading for a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LaneMiss {
    /// Deadline passed
    Timeout,
    /// Reading for a later frame arrived first
    Ahead(u64),
    /// Producer dropped its sender
    Closed,
}

/// One sensor source plus the queue its callback feeds
pub(crate) struct SensorLane {
    source: Box<dyn SensorSource>,
    tx: Option<Sender<SensorReading>>,
    rx: Receiver<SensorReading>,
}

impl SensorLane {
    pub(crate) fn new(source: Box<dyn SensorSource>, capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self {
            source,
            tx: Some(tx),
            rx,
        }
    }

    pub(crate) fn sensor_id(&self) -> &str {
        self.source.sensor_id()
    }

    /// Start the producer; the callback becomes the only sender
    pub(crate) fn listen(&mut self) {
        let Some(tx) = self.tx.take() else {
            return;
        };
        let sensor_id = self.source.sensor_id().to_string();
        self.source.listen(Arc::new(move |reading: SensorReading| {
            match tx.try_send(reading) {
                Ok(()) => {}
                Err(TrySendError::Full(reading)) => {
                    metrics::counter!("sync_mode_queue_overflow_total", "sensor" => sensor_id.clone())
                        .increment(1);
                    warn!(sensor_id = %sensor_id, frame = reading.frame, "sensor queue full, reading dropped");
                }
                Err(TrySendError::Closed(_)) => {}
            }
        }));
    }

    pub(crate) fn stop(&self) {
        self.source.stop();
    }

    pub(crate) fn is_listening(&self) -> bool {
        self.source.is_listening()
    }

    /// Wait until the reading for `frame` arrives, discarding older ones
    pub(crate) async fn next_for(
        &self,
        frame: u64,
        deadline: Instant,
    ) -> Result<SensorReading, LaneMiss> {
        loop {
            let reading = match tokio::time::timeout_at(deadline, self.rx.recv()).await {
                Err(_) => return Err(LaneMiss::Timeout),
                Ok(Err(_)) => return Err(LaneMiss::Closed),
                Ok(Ok(reading)) => reading,
            };
            if let Some(found) = self.match_frame(reading, frame)? {
                return Ok(found);
            }
        }
    }

    /// Non-blocking variant of [`next_for`](Self::next_for)
    pub(crate) fn try_next_for(&self, frame: u64) -> Result<SensorReading, LaneMiss> {
        loop {
            let reading = match self.rx.try_recv() {
                Ok(reading) => reading,
                Err(TryRecvError::Empty) => return Err(LaneMiss::Timeout),
                Err(TryRecvError::Closed) => return Err(LaneMiss::Closed),
            };
            if let Some(found) = self.match_frame(reading, frame)? {
                return Ok(found);
            }
        }
    }

    fn match_frame(
        &self,
        reading: SensorReading,
        frame: u64,
    ) -> Result<Option<SensorReading>, LaneMiss> {
        match reading.frame.cmp(&frame) {
            FrameOrdering::Equal => Ok(Some(reading)),
            FrameOrdering::Less => {
                metrics::counter!("sync_mode_stale_readings_total", "sensor" => self.sensor_id().to_string())
                    .increment(1);
                trace!(
                    sensor_id = %self.sensor_id(),
                    stale = reading.frame,
                    frame,
                    "discarding stale reading"
                );
                Ok(None)
            }
            FrameOrdering::Greater => Err(LaneMiss::Ahead(reading.frame)),
        }
    }
}
