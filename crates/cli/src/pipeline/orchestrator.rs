//! Capture orchestrator - provisions a session and runs the capture loop in it.
//!
//! Supports both real CARLA and mock modes via feature flags.
//! When `real-carla` feature is disabled, runs in mock mode.

use std::time::Instant;

use actor_factory::CarlaClient;
use anyhow::{Context, Result};
use capture::{provision, run_capture, CapturePlan, StopSignal};
use contracts::{CaptureBlueprint, ContractError, OutputConfig, TraceSink};
use futures::FutureExt;
use tracing::info;
use trace_writer::{DirectorySource, LogSink, XvizJsonWriter};

use super::CaptureSummary;
use crate::error::CliError;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The capture configuration
    pub blueprint: CaptureBlueprint,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,

    /// Log messages instead of writing trace files
    pub dry_run: bool,
}

/// Main capture orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run one capture session to completion
    ///
    /// `stop` ends the capture cooperatively; actors are released either way.
    pub async fn run(self, stop: StopSignal) -> Result<CaptureSummary> {
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        #[cfg(feature = "real-carla")]
        let client = {
            info!("Running against CARLA server");
            actor_factory::RealCarlaClient::new()
        };

        #[cfg(not(feature = "real-carla"))]
        let client = {
            info!("Running in MOCK mode (no CARLA server required)");
            actor_factory::MockCarlaClient::new()
        };

        self.run_with_client(client, stop).await
    }

    /// Provision with `client`, then capture into the configured sink
    pub async fn run_with_client<C: CarlaClient>(
        self,
        client: C,
        stop: StopSignal,
    ) -> Result<CaptureSummary> {
        if self.config.dry_run {
            info!("Dry run - trace messages are logged, not written");
            self.capture(client, stop, |_| Ok(LogSink::new("dry_run")), None)
                .await
        } else {
            let output = self.config.blueprint.output.directory.clone();
            self.capture(client, stop, open_directory_writer, Some(output))
                .await
        }
    }

    async fn capture<C, S, F>(
        self,
        client: C,
        stop: StopSignal,
        open_writer: F,
        output: Option<String>,
    ) -> Result<CaptureSummary>
    where
        C: CarlaClient,
        S: TraceSink,
        F: FnOnce(&OutputConfig) -> std::result::Result<S, ContractError>,
    {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        info!(
            host = %blueprint.world.carla_host,
            port = blueprint.world.carla_port,
            "Provisioning capture session..."
        );
        let session = provision(client, blueprint, open_writer)
            .await
            .with_context(|| {
                format!(
                    "Failed to provision session on {}:{}",
                    blueprint.world.carla_host, blueprint.world.carla_port
                )
            })?;

        info!(
            actors = session.graph().len(),
            "Session ready, entering synchronous mode"
        );

        let plan = CapturePlan::from_blueprint(blueprint);
        let report = session
            .scope(move |parts| run_capture(parts, plan, stop).boxed())
            .await
            .map_err(CliError::from)?;

        let summary = CaptureSummary::new(&report, start_time.elapsed(), output);
        info!(
            frames = summary.frames,
            duration_secs = summary.duration.as_secs_f64(),
            "Capture session complete"
        );
        Ok(summary)
    }
}

/// XVIZ JSON writer over the configured directory
fn open_directory_writer(
    output: &OutputConfig,
) -> std::result::Result<XvizJsonWriter<DirectorySource>, ContractError> {
    let source = DirectorySource::new(&output.directory, output.recreate)?;
    Ok(XvizJsonWriter::new("xviz", source))
}
