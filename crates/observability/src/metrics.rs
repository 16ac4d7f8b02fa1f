//! 采集指标模块
//!
//! 采集循环、trace 输出的 Prometheus 指标，以及用于结束摘要的在线统计。

use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit,
};

pub const FRAMES_CAPTURED: &str = "carla_xviz_frames_captured_total";
pub const LAST_FRAME: &str = "carla_xviz_last_frame";
pub const TICK_LATENCY: &str = "carla_xviz_tick_latency_ms";
pub const TRACE_BYTES: &str = "carla_xviz_trace_bytes_total";
pub const CAPTURE_FAILURES: &str = "carla_xviz_capture_failures_total";
pub const CAPTURE_RUNNING: &str = "carla_xviz_capture_running";

/// 注册指标说明，exporter 安装后调用一次
pub fn describe_metrics() {
    describe_counter!(FRAMES_CAPTURED, "State updates written to the trace");
    describe_gauge!(LAST_FRAME, "Simulator frame of the last written update");
    describe_histogram!(
        TICK_LATENCY,
        Unit::Milliseconds,
        "Time from tick request to synchronized snapshot"
    );
    describe_counter!(TRACE_BYTES, Unit::Bytes, "Bytes persisted per trace sink");
    describe_counter!(CAPTURE_FAILURES, "Capture loop failures by error kind");
    describe_gauge!(CAPTURE_RUNNING, "1 while the capture loop is running");
}

/// 记录一帧成功写出
///
/// 每条 state update 写入 trace 后调用。
pub fn record_frame_captured(frame: u64, tick_latency_ms: f64) {
    counter!(FRAMES_CAPTURED).increment(1);
    gauge!(LAST_FRAME).set(frame as f64);
    histogram!(TICK_LATENCY).record(tick_latency_ms);
}

/// 记录写出的 trace 字节数
pub fn record_trace_bytes(sink_name: &str, bytes: usize) {
    counter!(
        TRACE_BYTES,
        "sink" => sink_name.to_string()
    )
    .increment(bytes as u64);
}

/// 记录采集失败 (按错误类别)
pub fn record_capture_failure(kind: &'static str) {
    counter!(CAPTURE_FAILURES, "kind" => kind).increment(1);
}

/// 采集循环是否在运行 (1 / 0)
pub fn record_capture_state(running: bool) {
    gauge!(CAPTURE_RUNNING).set(if running { 1.0 } else { 0.0 });
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary::from(self)
    }
}
