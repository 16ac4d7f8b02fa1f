//! SensorReading - 传感器回调输出
//!
//! 单帧传感器数据。采集核心只关心帧号，不解析载荷。

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::SensorType;

/// 传感器读数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorReading {
    /// 传感器 ID
    pub sensor_id: String,

    /// 传感器类型
    pub sensor_type: SensorType,

    /// CARLA 帧号，用于和 snapshot 对齐
    pub frame: u64,

    /// CARLA 仿真时间戳 (seconds)
    pub timestamp: f64,

    /// 原始载荷 (零拷贝，不解析)
    #[serde(default)]
    pub payload: Bytes,
}

impl SensorReading {
    /// 创建不带载荷的读数
    pub fn new(
        sensor_id: impl Into<String>,
        sensor_type: SensorType,
        frame: u64,
        timestamp: f64,
    ) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            sensor_type,
            frame,
            timestamp,
            payload: Bytes::new(),
        }
    }

    /// 附加载荷
    pub fn with_payload(mut self, payload: Bytes) -> Self {
        self.payload = payload;
        self
    }
}
