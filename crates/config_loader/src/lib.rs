//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Validate configuration legality
//! - Generate `CaptureBlueprint`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("capture.toml")).unwrap();
//! println!("Map: {}", blueprint.world.map);
//! ```

mod parser;
mod validator;

pub use contracts::CaptureBlueprint;
pub use parser::ConfigFormat;
pub use validator::MAX_TIMEOUT_SEC;

use contracts::ContractError;
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<CaptureBlueprint, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<CaptureBlueprint, ContractError> {
        Self::parse_and_validate(content, format)
    }

    /// Validate an already-built blueprint (e.g. after CLI overrides)
    pub fn validate(blueprint: &CaptureBlueprint) -> Result<(), ContractError> {
        validator::validate(blueprint)
    }

    /// Serialize CaptureBlueprint to TOML string
    pub fn to_toml(blueprint: &CaptureBlueprint) -> Result<String, ContractError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize CaptureBlueprint to JSON string
    pub fn to_json(blueprint: &CaptureBlueprint) -> Result<String, ContractError> {
        serde_json::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Parse and validate configuration content
    fn parse_and_validate(
        content: &str,
        format: ConfigFormat,
    ) -> Result<CaptureBlueprint, ContractError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORDER_TOML: &str = r#"
[world]
map = "/Game/Carla/Maps/Town01"

[vehicle]
id = "ego"
blueprint = "vehicle.jeep.wrangler_rubicon"
[vehicle.spawn_point]
location = { x = 230.0, y = 55.4, z = 0.1 }
rotation = { pitch = 0.0, yaw = 180.0, roll = 0.0 }

[[vehicle.sensors]]
id = "camera_rgb"
sensor_type = "camera"
transform = { location = { x = -5.5, y = 0.0, z = 2.8 }, rotation = { pitch = -15.0, yaw = 0.0, roll = 0.0 } }

[[vehicle.sensors]]
id = "lidar"
sensor_type = "lidar"
transform = { location = { x = 1.5, y = 0.0, z = 2.4 }, rotation = { pitch = 0.0, yaw = 0.0, roll = 0.0 } }
attributes = { range = "200", channels = "32", rotation_frequency = "30" }

[capture]
frame_rate = 30.0
max_frames = 300
"#;

    #[test]
    fn test_load_from_str_toml() {
        let bp = ConfigLoader::load_from_str(RECORDER_TOML, ConfigFormat::Toml).unwrap();
        assert_eq!(bp.world.map, "/Game/Carla/Maps/Town01");
        assert_eq!(bp.vehicle.sensors.len(), 2);
        assert_eq!(bp.vehicle.sensors[0].transform.rotation.pitch, -15.0);
        assert_eq!(bp.capture.frame_limit(), Some(300));
    }

    #[test]
    fn test_round_trip_toml() {
        let bp = ConfigLoader::load_from_str(RECORDER_TOML, ConfigFormat::Toml).unwrap();
        let serialized = ConfigLoader::to_toml(&bp).unwrap();
        let bp2 = ConfigLoader::load_from_str(&serialized, ConfigFormat::Toml).unwrap();
        assert_eq!(bp.world.map, bp2.world.map);
        assert_eq!(bp.vehicle.sensors.len(), bp2.vehicle.sensors.len());
        assert_eq!(bp.vehicle.spawn_point, bp2.vehicle.spawn_point);
    }

    #[test]
    fn test_round_trip_json() {
        let bp = ConfigLoader::load_from_str(RECORDER_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&bp).unwrap();
        let bp2 = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(bp.vehicle.blueprint, bp2.vehicle.blueprint);
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let content = r#"
[world]
map = "Town01"

[vehicle]
id = "ego"
blueprint = "vehicle.test"

[[vehicle.sensors]]
id = "cam"
sensor_type = "camera"

[[vehicle.sensors]]
id = "cam"
sensor_type = "lidar"
"#;
        let err = ConfigLoader::load_from_str(content, ConfigFormat::Toml).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_overflowing_tick_timeout_rejected() {
        let content = r#"
[world]
map = "Town01"

[vehicle]
id = "ego"
blueprint = "vehicle.test"

[capture]
tick_timeout_sec = 1e20
"#;
        let err = ConfigLoader::load_from_str(content, ConfigFormat::Toml).unwrap_err();
        assert!(err.to_string().contains("tick_timeout_sec"), "got: {err}");
    }

    #[test]
    fn test_load_from_path_detects_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.toml");
        std::fs::write(&path, RECORDER_TOML).unwrap();
        let bp = ConfigLoader::load_from_path(&path).unwrap();
        assert_eq!(bp.vehicle.id, "ego");

        let bad = dir.path().join("capture.yaml");
        std::fs::write(&bad, RECORDER_TOML).unwrap();
        let err = ConfigLoader::load_from_path(&bad).unwrap_err();
        assert!(err.to_string().contains("unsupported"));
    }
}
