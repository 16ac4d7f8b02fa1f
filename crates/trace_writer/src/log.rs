//! LogSink - logs message summaries via tracing

use contracts::{ContractError, TraceSink, XvizMessage};
use tracing::{info, instrument};

/// Sink that logs a one-line summary per message (dry runs)
pub struct LogSink {
    name: String,
    closed: bool,
    messages: u64,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            closed: false,
            messages: 0,
        }
    }

    pub fn message_count(&self) -> u64 {
        self.messages
    }

    fn log_summary(&self, message: &XvizMessage) {
        match message {
            XvizMessage::Metadata(metadata) => info!(
                sink = %self.name,
                version = %metadata.version,
                streams = metadata.streams.len(),
                "xviz/metadata"
            ),
            XvizMessage::StateUpdate(update) => info!(
                sink = %self.name,
                timestamp = message.timestamp().unwrap_or_default(),
                streams = update.stream_names().count(),
                "xviz/state_update"
            ),
        }
    }
}

impl TraceSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "log_sink_write", skip(self, message), fields(sink = %self.name))]
    async fn write(&mut self, message: &XvizMessage) -> Result<(), ContractError> {
        if self.closed {
            return Err(ContractError::sink_closed(&self.name));
        }
        self.log_summary(message);
        self.messages += 1;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        if !self.closed {
            self.closed = true;
            info!(sink = %self.name, messages = self.messages, "LogSink closed");
        }
        Ok(())
    }
}
