//! `info` command implementation.

use std::collections::HashMap;

use anyhow::{Context, Result};
use contracts::CaptureBlueprint;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    world: WorldInfo,
    vehicle: VehicleInfo,
    capture: CaptureInfo,
    output: OutputInfo,
}

#[derive(Serialize)]
struct WorldInfo {
    map: String,
    carla_host: String,
    carla_port: u16,
    client_timeout_sec: f64,
}

#[derive(Serialize)]
struct VehicleInfo {
    id: String,
    blueprint: String,
    autopilot: bool,
    sensor_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sensors: Vec<SensorInfo>,
}

#[derive(Serialize)]
struct SensorInfo {
    id: String,
    sensor_type: String,
    blueprint: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    attributes: HashMap<String, String>,
}

#[derive(Serialize)]
struct CaptureInfo {
    frame_rate: f64,
    fixed_delta_seconds: f64,
    tick_timeout_sec: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_frames: Option<u64>,
    follow_spectator: bool,
}

#[derive(Serialize)]
struct OutputInfo {
    directory: String,
    recreate: bool,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args);
    }

    Ok(())
}

fn build_config_info(blueprint: &CaptureBlueprint, args: &InfoArgs) -> ConfigInfo {
    let vehicle = &blueprint.vehicle;
    let sensors = if args.sensors {
        vehicle
            .sensors
            .iter()
            .map(|s| SensorInfo {
                id: s.id.clone(),
                sensor_type: format!("{:?}", s.sensor_type),
                blueprint: s.sensor_type.blueprint().to_string(),
                attributes: s.attributes.clone(),
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        world: WorldInfo {
            map: blueprint.world.map.clone(),
            carla_host: blueprint.world.carla_host.clone(),
            carla_port: blueprint.world.carla_port,
            client_timeout_sec: blueprint.world.client_timeout_sec,
        },
        vehicle: VehicleInfo {
            id: vehicle.id.clone(),
            blueprint: vehicle.blueprint.clone(),
            autopilot: vehicle.autopilot,
            sensor_count: vehicle.sensors.len(),
            sensors,
        },
        capture: CaptureInfo {
            frame_rate: blueprint.capture.frame_rate,
            fixed_delta_seconds: blueprint.capture.fixed_delta_seconds(),
            tick_timeout_sec: blueprint.capture.tick_timeout_sec,
            max_frames: blueprint.capture.frame_limit(),
            follow_spectator: blueprint.capture.follow_spectator,
        },
        output: OutputInfo {
            directory: blueprint.output.directory.clone(),
            recreate: blueprint.output.recreate,
        },
    }
}

fn print_config_info(blueprint: &CaptureBlueprint, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               CARLA XVIZ Configuration                       ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📍 World");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Map: {}", blueprint.world.map);
    println!(
        "   └─ CARLA Server: {}:{}",
        blueprint.world.carla_host, blueprint.world.carla_port
    );

    let vehicle = &blueprint.vehicle;
    println!("\n🚗 Vehicle");
    println!("   ├─ {} ({})", vehicle.id, vehicle.blueprint);
    println!("   ├─ Autopilot: {}", vehicle.autopilot);
    if args.sensors && !vehicle.sensors.is_empty() {
        println!("   └─ 📷 Sensors ({}):", vehicle.sensors.len());
        for (j, sensor) in vehicle.sensors.iter().enumerate() {
            let sensor_prefix = if j == vehicle.sensors.len() - 1 {
                "└─"
            } else {
                "├─"
            };
            println!(
                "        {} {} ({})",
                sensor_prefix,
                sensor.id,
                sensor.sensor_type.blueprint()
            );
        }
    } else {
        println!("   └─ {} sensors", vehicle.sensors.len());
    }

    let capture = &blueprint.capture;
    println!("\n⚙️  Capture");
    println!("   ├─ Frame rate: {} Hz", capture.frame_rate);
    println!("   ├─ Tick timeout: {}s", capture.tick_timeout_sec);
    match capture.frame_limit() {
        Some(limit) => println!("   ├─ Max frames: {}", limit),
        None => println!("   ├─ Max frames: unlimited"),
    }
    println!(
        "   └─ Spectator: {}",
        if capture.follow_spectator {
            format!("follow (+{} m)", capture.spectator_height)
        } else {
            "fixed".to_string()
        }
    );

    println!("\n📤 Output");
    println!("   └─ {} (recreate: {})", blueprint.output.directory, blueprint.output.recreate);

    println!();
}
