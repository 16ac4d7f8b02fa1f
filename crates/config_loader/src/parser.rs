//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON (可选) 格式。

use contracts::{CaptureBlueprint, ContractError};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// 解析 TOML 格式配置
pub fn parse_toml(content: &str) -> Result<CaptureBlueprint, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 解析 JSON 格式配置
pub fn parse_json(content: &str) -> Result<CaptureBlueprint, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 根据格式解析配置
pub fn parse(content: &str, format: ConfigFormat) -> Result<CaptureBlueprint, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::SensorType;

    #[test]
    fn test_parse_toml_minimal() {
        let content = r#"
[world]
map = "Town01"

[vehicle]
id = "ego"
blueprint = "vehicle.jeep.wrangler_rubicon"

[[vehicle.sensors]]
id = "lidar"
sensor_type = "lidar"
attributes = { range = "200" }
"#;
        let bp = parse_toml(content).unwrap();
        assert_eq!(bp.world.map, "Town01");
        assert_eq!(bp.world.carla_port, 2000);
        assert!(bp.vehicle.autopilot);
        assert!(bp.vehicle.spawn_point.is_none());
        assert_eq!(bp.vehicle.sensors.len(), 1);
        assert_eq!(bp.vehicle.sensors[0].sensor_type, SensorType::Lidar);
        assert_eq!(bp.vehicle.sensors[0].attributes["range"], "200");
        // 省略的段落使用默认值
        assert_eq!(bp.capture.frame_rate, 30.0);
        assert_eq!(bp.output.directory, "output");
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "world": { "map": "Town01" },
            "vehicle": {
                "id": "ego",
                "blueprint": "vehicle.jeep.wrangler_rubicon",
                "spawn_point": {
                    "location": { "x": 230.0, "y": 55.4, "z": 0.1 },
                    "rotation": { "pitch": 0.0, "yaw": 180.0, "roll": 0.0 }
                },
                "sensors": [{
                    "id": "camera_rgb",
                    "sensor_type": "camera"
                }]
            },
            "capture": { "max_frames": 100 }
        }"#;
        let bp = parse_json(content).unwrap();
        let spawn = bp.vehicle.spawn_point.unwrap();
        assert_eq!(spawn.rotation.yaw, 180.0);
        assert_eq!(bp.capture.frame_limit(), Some(100));
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let content = "invalid toml [[[";
        let err = parse_toml(content).unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_missing_vehicle_section() {
        let content = r#"
[world]
map = "Town01"
"#;
        assert!(parse_toml(content).is_err());
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_extension("toml"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("TOML"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("json"),
            Some(ConfigFormat::Json)
        );
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
