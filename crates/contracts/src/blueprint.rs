//! CaptureBlueprint - Config Loader 输出
//!
//! 描述一次采集会话的完整配置：地图、车辆、传感器、采集节奏、输出目录。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的采集会话蓝图
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CaptureBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 世界设置
    #[validate(nested)]
    pub world: WorldConfig,

    /// 被驾驶的车辆 (单车会话)
    #[validate(nested)]
    pub vehicle: VehicleConfig,

    /// 采集循环配置
    #[serde(default)]
    #[validate(nested)]
    pub capture: CaptureConfig,

    /// 输出配置
    #[serde(default)]
    #[validate(nested)]
    pub output: OutputConfig,
}

/// 世界配置：地图与服务器地址
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WorldConfig {
    /// 地图名称 (e.g., "/Game/Carla/Maps/Town01" 或 "Town01")
    #[validate(length(min = 1, message = "map cannot be empty"))]
    pub map: String,

    /// CARLA 服务器地址
    #[serde(default = "default_carla_host")]
    pub carla_host: String,

    /// CARLA 服务器端口
    #[serde(default = "default_carla_port")]
    pub carla_port: u16,

    /// 客户端 RPC 超时 (秒)
    #[serde(default = "default_client_timeout")]
    #[validate(range(exclusive_min = 0.0, message = "client_timeout_sec must be > 0"))]
    pub client_timeout_sec: f64,
}

fn default_carla_host() -> String {
    "localhost".to_string()
}

fn default_carla_port() -> u16 {
    2000
}

fn default_client_timeout() -> f64 {
    2.0
}

/// 车辆配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct VehicleConfig {
    /// 唯一标识符
    #[validate(length(min = 1, message = "vehicle id cannot be empty"))]
    pub id: String,

    /// 蓝图名称 (e.g., "vehicle.jeep.wrangler_rubicon")
    #[validate(length(min = 1, message = "vehicle blueprint cannot be empty"))]
    pub blueprint: String,

    /// 初始位姿，None 时使用地图推荐出生点
    #[serde(default)]
    pub spawn_point: Option<Transform>,

    /// 是否开启自动驾驶
    #[serde(default = "default_autopilot")]
    pub autopilot: bool,

    /// 挂载的传感器列表 (按 spawn 顺序)
    #[serde(default)]
    pub sensors: Vec<SensorConfig>,
}

fn default_autopilot() -> bool {
    true
}

/// 3D 变换：位置 + 旋转
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// 位置 (x, y, z) 单位：米
    pub location: Location,

    /// 旋转 (pitch, yaw, roll) 单位：度
    pub rotation: Rotation,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
}

impl Transform {
    pub fn new(location: Location, rotation: Rotation) -> Self {
        Self { location, rotation }
    }

    /// 沿世界 z 轴抬高，旋转不变
    pub fn raised(&self, dz: f64) -> Self {
        Self {
            location: Location {
                z: self.location.z + dz,
                ..self.location
            },
            rotation: self.rotation,
        }
    }
}

/// 传感器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    /// 唯一标识符
    pub id: String,

    /// 传感器类型
    pub sensor_type: SensorType,

    /// 相对于父 actor 的挂载位姿
    #[serde(default)]
    pub transform: Transform,

    /// 传感器特定属性 (e.g., lidar range / channels)
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

/// 传感器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorType {
    Camera,
    Lidar,
    Imu,
    Gnss,
    Radar,
}

impl SensorType {
    /// 对应的 CARLA 蓝图名称
    pub fn blueprint(&self) -> &'static str {
        match self {
            SensorType::Camera => "sensor.camera.rgb",
            SensorType::Lidar => "sensor.lidar.ray_cast",
            SensorType::Imu => "sensor.other.imu",
            SensorType::Gnss => "sensor.other.gnss",
            SensorType::Radar => "sensor.other.radar",
        }
    }
}

/// 采集循环配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CaptureConfig {
    /// 固定帧率 (Hz)，同时决定 fixed_delta_seconds 和时间戳换算
    #[serde(default = "default_frame_rate")]
    #[validate(range(exclusive_min = 0.0, message = "frame_rate must be > 0"))]
    pub frame_rate: f64,

    /// 单次 tick 的最大等待时间 (秒)
    #[serde(default = "default_tick_timeout")]
    #[validate(range(exclusive_min = 0.0, message = "tick_timeout_sec must be > 0"))]
    pub tick_timeout_sec: f64,

    /// 最大采集帧数，0 表示直到外部停止
    #[serde(default)]
    pub max_frames: u64,

    /// 是否让观察视角跟随车辆
    #[serde(default = "default_follow_spectator")]
    pub follow_spectator: bool,

    /// 观察视角相对车辆的抬高 (米)
    #[serde(default = "default_spectator_height")]
    pub spectator_height: f64,
}

fn default_frame_rate() -> f64 {
    30.0
}

fn default_tick_timeout() -> f64 {
    2.0
}

fn default_follow_spectator() -> bool {
    true
}

fn default_spectator_height() -> f64 {
    2.5
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            frame_rate: default_frame_rate(),
            tick_timeout_sec: default_tick_timeout(),
            max_frames: 0,
            follow_spectator: default_follow_spectator(),
            spectator_height: default_spectator_height(),
        }
    }
}

impl CaptureConfig {
    /// 帧数上限 (None = 不限)
    pub fn frame_limit(&self) -> Option<u64> {
        (self.max_frames > 0).then_some(self.max_frames)
    }

    /// 每帧仿真步长 (秒)
    pub fn fixed_delta_seconds(&self) -> f64 {
        1.0 / self.frame_rate
    }
}

/// 输出配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OutputConfig {
    /// XVIZ 输出目录
    #[serde(default = "default_output_directory")]
    #[validate(length(min = 1, message = "output directory cannot be empty"))]
    pub directory: String,

    /// 会话开始时是否清空并重建目录
    #[serde(default = "default_recreate")]
    pub recreate: bool,
}

fn default_output_directory() -> String {
    "output".to_string()
}

fn default_recreate() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
            recreate: default_recreate(),
        }
    }
}
