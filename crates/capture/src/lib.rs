//! # Capture
//!
//! CARLA → XVIZ 帧同步采集核心。
//!
//! ## 组成
//!
//! - [`declare_metadata`]: 固定的 XVIZ stream 声明
//! - [`FrameEncoder`]: 帧号 + 车辆位姿 → `xviz/state_update`
//! - [`CaptureLoop`]: Idle → Running → Terminated 的同步采集状态机
//! - [`CaptureSession`]: 持有 actors 与 writer，任何退出路径都按逆序释放
//!
//! ## 数据流
//!
//! ```text
//! provision ──▶ CaptureSession::scope ──▶ run_capture
//!                    │                       │ SyncMode::enter
//!                    │                       │ CaptureLoop::run ── tick ─▶ encode ─▶ write
//!                    │                       │ SyncMode::exit
//!                    ▼
//!              release: close writer → destroy sensors (reverse) → destroy vehicle
//! ```

mod capture_loop;
mod declarator;
mod encoder;
mod error;
mod run;
mod session;
mod stop;

pub use capture_loop::{CaptureLoop, CaptureStats, LoopOptions, LoopState, Termination};
pub use declarator::{declare_metadata, CIRCLE_STREAM, POINTS_STREAM, VEHICLE_POSE_STREAM};
pub use encoder::{FrameEncoder, INDICATOR_COLORS, INDICATOR_ID, INDICATOR_POINTS};
pub use error::CaptureError;
pub use run::{run_capture, CapturePlan, CaptureReport};
pub use session::{provision, CaptureSession, SessionParts};
pub use stop::StopSignal;
