//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::CaptureBlueprint;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    map: String,
    vehicle: String,
    sensor_count: usize,
    frame_rate: f64,
    max_frames: u64,
    output: String,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    map: blueprint.world.map.clone(),
                    vehicle: blueprint.vehicle.blueprint.clone(),
                    sensor_count: blueprint.vehicle.sensors.len(),
                    frame_rate: blueprint.capture.frame_rate,
                    max_frames: blueprint.capture.max_frames,
                    output: blueprint.output.directory.clone(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &CaptureBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.vehicle.sensors.is_empty() {
        warnings.push(format!(
            "Vehicle '{}' has no sensors - ticks are not tied to sensor data",
            blueprint.vehicle.id
        ));
    }

    if blueprint.capture.max_frames == 0 {
        warnings.push("capture.max_frames is 0 - capture runs until stopped".to_string());
    }

    let period = blueprint.capture.fixed_delta_seconds();
    if blueprint.capture.tick_timeout_sec < period {
        warnings.push(format!(
            "capture.tick_timeout_sec ({}) is shorter than one frame ({:.3}s)",
            blueprint.capture.tick_timeout_sec, period
        ));
    }

    if !blueprint.output.recreate {
        warnings.push(
            "output.recreate is false - files from an earlier trace may remain".to_string(),
        );
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Map: {}", summary.map);
            println!("  Vehicle: {}", summary.vehicle);
            println!("  Sensors: {}", summary.sensor_count);
            println!("  Frame rate: {} Hz", summary.frame_rate);
            println!("  Output: {}", summary.output);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn valid_config_with_warnings() {
        let file = write_config(
            r#"
[world]
map = "Town01"

[vehicle]
id = "ego"
blueprint = "vehicle.tesla.model3"
"#,
        );
        let result = validate_config(&ValidateArgs {
            config: file.path().to_path_buf(),
            json: true,
        });

        assert!(result.valid);
        let summary = result.summary.unwrap();
        assert_eq!(summary.sensor_count, 0);
        assert_eq!(summary.frame_rate, 30.0);
        let warnings = result.warnings.unwrap();
        assert!(warnings.iter().any(|w| w.contains("no sensors")));
        assert!(warnings.iter().any(|w| w.contains("max_frames")));
    }

    #[test]
    fn invalid_config_reports_error() {
        let file = write_config(
            r#"
[world]
map = "Town01"

[vehicle]
id = "ego"
blueprint = ""
"#,
        );
        let result = validate_config(&ValidateArgs {
            config: file.path().to_path_buf(),
            json: false,
        });
        assert!(!result.valid);
        assert!(result.error.is_some());
    }

    #[test]
    fn missing_file() {
        let result = validate_config(&ValidateArgs {
            config: "/nonexistent/config.toml".into(),
            json: false,
        });
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("File not found"));
    }
}
