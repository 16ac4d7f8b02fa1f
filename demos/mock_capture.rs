//! Mock Capture Example
//!
//! Runs a short capture against MockCarlaClient and writes the XVIZ trace
//! directory, stage by stage, without the CLI.
//!
//! Run with: cargo run -p demos --bin mock_capture [config.toml]

use std::path::Path;

use actor_factory::MockCarlaClient;
use capture::{provision, run_capture, CapturePlan, StopSignal};
use config_loader::{ConfigFormat, ConfigLoader};
use contracts::CaptureBlueprint;
use futures::FutureExt;
use trace_writer::{DirectorySource, XvizJsonWriter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    tracing::info!("Starting Mock Capture Demo");

    // ==== Stage 1: Use default config or load from file ====
    let mut blueprint = if let Some(path) = std::env::args().nth(1) {
        tracing::info!(path = %path, "Loading capture config");
        ConfigLoader::load_from_path(Path::new(&path))?
    } else {
        create_demo_blueprint()?
    };
    if blueprint.capture.max_frames == 0 {
        blueprint.capture.max_frames = 90;
    }

    // ==== Stage 2: Connect, load map, spawn vehicle + sensors, open writer ====
    let session = provision(MockCarlaClient::new(), &blueprint, |output| {
        let source = DirectorySource::new(&output.directory, output.recreate)?;
        Ok(XvizJsonWriter::new("xviz", source))
    })
    .await?;
    tracing::info!(actors = session.graph().len(), "Session provisioned");

    // ==== Stage 3: Capture inside the session scope ====
    let stop = StopSignal::new();
    let ctrl_c = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.stop();
        }
    });

    let plan = CapturePlan::from_blueprint(&blueprint);
    let report = session
        .scope(move |parts| run_capture(parts, plan, stop).boxed())
        .await?;

    // ==== Stage 4: Report ====
    tracing::info!(
        termination = ?report.termination,
        frames = report.stats.frames,
        first_frame = ?report.stats.first_frame,
        last_frame = ?report.stats.last_frame,
        output = %blueprint.output.directory,
        "Demo complete"
    );
    Ok(())
}

fn create_demo_blueprint() -> Result<CaptureBlueprint, Box<dyn std::error::Error>> {
    let blueprint = ConfigLoader::load_from_str(
        r#"
[world]
map = "/Game/Carla/Maps/Town01"

[vehicle]
id = "ego"
blueprint = "vehicle.jeep.wrangler_rubicon"

[[vehicle.sensors]]
id = "camera_rgb"
sensor_type = "camera"

[output]
directory = "demo_output"
"#,
        ConfigFormat::Toml,
    )?;
    Ok(blueprint)
}
