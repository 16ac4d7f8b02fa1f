//! Session body: synchronous mode around the capture loop

use std::panic::{self, AssertUnwindSafe};

use actor_factory::CarlaClient;
use contracts::{CaptureBlueprint, CaptureConfig, SensorConfig, TraceSink};
use futures::FutureExt;
use sync_mode::SyncMode;
use tracing::{error, instrument, warn};

use crate::{
    declare_metadata, CaptureError, CaptureLoop, CaptureStats, LoopOptions, SessionParts,
    StopSignal, Termination,
};

/// What a session body needs from the blueprint
#[derive(Debug, Clone)]
pub struct CapturePlan {
    pub capture: CaptureConfig,
    /// Same order as spawned
    pub sensors: Vec<SensorConfig>,
}

impl CapturePlan {
    pub fn from_blueprint(blueprint: &CaptureBlueprint) -> Self {
        Self {
            capture: blueprint.capture.clone(),
            sensors: blueprint.vehicle.sensors.clone(),
        }
    }
}

/// Outcome of a completed capture
#[derive(Debug, Clone)]
pub struct CaptureReport {
    pub termination: Termination,
    pub stats: CaptureStats,
}

/// Enter synchronous mode, run the capture loop, restore the world
///
/// The world settings are restored on every path, a panic inside the loop
/// included (the panic resumes afterwards). A restore failure is reported
/// only when the loop itself succeeded.
#[instrument(
    name = "capture_run",
    skip_all,
    fields(sensors = plan.sensors.len(), frame_rate = plan.capture.frame_rate)
)]
pub async fn run_capture<C, S>(
    parts: SessionParts<'_, C, S>,
    plan: CapturePlan,
    stop: StopSignal,
) -> Result<CaptureReport, CaptureError>
where
    C: CarlaClient,
    S: TraceSink,
{
    let SessionParts {
        factory,
        graph,
        writer,
    } = parts;

    let vehicle = graph
        .vehicle_id()
        .ok_or(CaptureError::InvalidState("no vehicle in runtime graph"))?;
    let sources = factory.sensor_sources(graph, &plan.sensors)?;

    let mut sync = SyncMode::new(factory.client(), sources, plan.capture.frame_rate)?;
    sync.enter().await?;

    let mut capture = CaptureLoop::new(LoopOptions::from(&plan.capture), declare_metadata());
    let body = capture.run(&mut sync, factory.client(), vehicle, writer, &stop);
    let outcome = AssertUnwindSafe(body).catch_unwind().await;
    let exited = sync.exit().await;

    let result = match outcome {
        Ok(result) => result,
        Err(payload) => {
            match &exited {
                Ok(()) => error!("capture loop panicked, world settings restored"),
                Err(e) => {
                    error!(error = %e, "capture loop panicked, failed to restore world settings")
                }
            }
            panic::resume_unwind(payload);
        }
    };

    match (result, exited) {
        (Ok(termination), Ok(())) => Ok(CaptureReport {
            termination,
            stats: capture.stats().clone(),
        }),
        (Ok(_), Err(e)) => Err(e.into()),
        (Err(e), Err(exit_err)) => {
            warn!(error = %exit_err, "failed to restore world settings");
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
    }
}
