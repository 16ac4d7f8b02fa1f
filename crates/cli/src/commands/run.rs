//! `run` command implementation.

use anyhow::{Context, Result};
use capture::StopSignal;
use contracts::CaptureBlueprint;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    apply_overrides(&mut blueprint, args);
    config_loader::ConfigLoader::validate(&blueprint)
        .map_err(CliError::from)
        .context("Configuration invalid after CLI overrides")?;

    info!(
        map = %blueprint.world.map,
        host = %blueprint.world.carla_host,
        port = blueprint.world.carla_port,
        vehicle = %blueprint.vehicle.blueprint,
        sensors = blueprint.vehicle.sensors.len(),
        output = %blueprint.output.directory,
        "Configuration loaded"
    );

    let pipeline = Pipeline::new(PipelineConfig {
        blueprint,
        metrics_port: (args.metrics_port != 0).then_some(args.metrics_port),
        dry_run: args.dry_run,
    });

    let stop = StopSignal::new();
    let capture = pipeline.run(stop.clone());
    tokio::pin!(capture);

    info!("Starting capture...");

    // A signal only requests the stop; the session still releases its actors.
    let result = tokio::select! {
        result = &mut capture => result,
        _ = shutdown_signal() => {
            warn!("Received shutdown signal, stopping capture...");
            stop.stop();
            capture.await
        }
    };

    let stats = result.context("Capture failed")?;
    info!(
        frames = stats.frames,
        termination = ?stats.termination,
        duration_secs = stats.duration.as_secs_f64(),
        fps = format!("{:.2}", stats.fps()),
        "Capture completed successfully"
    );
    stats.print_summary();

    info!("CARLA XVIZ finished");
    Ok(())
}

/// Apply command-line overrides on top of the loaded configuration
fn apply_overrides(blueprint: &mut CaptureBlueprint, args: &RunArgs) {
    if let Some(ref host) = args.host {
        info!(host = %host, "Overriding CARLA host from CLI");
        blueprint.world.carla_host = host.clone();
    }
    if let Some(port) = args.port {
        info!(port = %port, "Overriding CARLA port from CLI");
        blueprint.world.carla_port = port;
    }
    if let Some(ref output) = args.output {
        info!(output = %output.display(), "Overriding output directory from CLI");
        blueprint.output.directory = output.display().to_string();
    }
    if let Some(max_frames) = args.max_frames {
        info!(max_frames, "Overriding frame limit from CLI");
        blueprint.capture.max_frames = max_frames;
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
