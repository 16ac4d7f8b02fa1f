//! Synchronized capture loop
//!
//! ```text
//! Idle ──run──▶ Running ──stop signal──▶ Terminated(Cancelled)
//!                  │     ──frame limit──▶ Terminated(FrameLimit)
//!                  └─────── error ──────▶ Terminated(Failed)
//! ```

use std::time::Duration;

use contracts::{
    ActorId, ActorView, CaptureConfig, TickSource, TraceSink, XvizMessage, XvizMetadata,
};
use observability::RunningStats;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::{CaptureError, FrameEncoder, StopSignal};

/// Why a loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Stop signal observed
    Cancelled,
    /// `max_frames` messages written
    FrameLimit,
    /// An error ended the loop
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Terminated(Termination),
}

/// Loop parameters
#[derive(Debug, Clone, PartialEq)]
pub struct LoopOptions {
    pub frame_rate: f64,
    pub tick_timeout: Duration,
    pub max_frames: Option<u64>,
    /// Spectator offset above the vehicle, None disables following
    pub spectator_height: Option<f64>,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self::from(&CaptureConfig::default())
    }
}

impl From<&CaptureConfig> for LoopOptions {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            frame_rate: config.frame_rate,
            tick_timeout: timeout_from_secs(config.tick_timeout_sec),
            max_frames: config.frame_limit(),
            spectator_height: config
                .follow_spectator
                .then_some(config.spectator_height),
        }
    }
}

/// Seconds to `Duration`, saturating instead of panicking on overflow
///
/// Negative or NaN input yields zero.
pub(crate) fn timeout_from_secs(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(if secs > 0.0 {
        Duration::MAX
    } else {
        Duration::ZERO
    })
}

/// Totals of one run
#[derive(Debug, Clone, Default)]
pub struct CaptureStats {
    /// State updates written
    pub frames: u64,
    pub first_frame: Option<u64>,
    pub last_frame: Option<u64>,
    /// Tick wait (ms)
    pub tick_latency: RunningStats,
}

impl CaptureStats {
    fn record(&mut self, frame: u64, tick_latency_ms: f64) {
        self.frames += 1;
        self.first_frame.get_or_insert(frame);
        self.last_frame = Some(frame);
        self.tick_latency.push(tick_latency_ms);
    }
}

/// 单次采集会话的状态机
///
/// 元数据在进入 Running 时写出且只写一次；之后每次成功 tick 写出一条
/// state update，帧号严格递增。任何错误都终止循环并向上传播，不做重试。
pub struct CaptureLoop {
    options: LoopOptions,
    metadata: XvizMetadata,
    encoder: FrameEncoder,
    state: LoopState,
    stats: CaptureStats,
}

impl CaptureLoop {
    pub fn new(options: LoopOptions, metadata: XvizMetadata) -> Self {
        let encoder = FrameEncoder::new(options.frame_rate);
        Self {
            options,
            metadata,
            encoder,
            state: LoopState::Idle,
            stats: CaptureStats::default(),
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stats(&self) -> &CaptureStats {
        &self.stats
    }

    pub fn metadata(&self) -> &XvizMetadata {
        &self.metadata
    }

    /// Capture until stopped, the frame limit, or the first error
    ///
    /// Can only run once.
    #[instrument(
        name = "capture_loop_run",
        skip(self, ticker, view, writer, stop),
        fields(sink = %writer.name(), frame_rate = self.options.frame_rate)
    )]
    pub async fn run<T, V, S>(
        &mut self,
        ticker: &mut T,
        view: &V,
        vehicle: ActorId,
        writer: &mut S,
        stop: &StopSignal,
    ) -> Result<Termination, CaptureError>
    where
        T: TickSource,
        V: ActorView + Sync,
        S: TraceSink,
    {
        if self.state != LoopState::Idle {
            return Err(CaptureError::InvalidState("capture loop already ran"));
        }
        self.state = LoopState::Running;
        observability::record_capture_state(true);
        info!(max_frames = ?self.options.max_frames, "capture started");

        let result = self.drive(ticker, view, vehicle, writer, stop).await;
        observability::record_capture_state(false);

        match &result {
            Ok(termination) => {
                self.state = LoopState::Terminated(*termination);
                info!(
                    termination = ?termination,
                    frames = self.stats.frames,
                    last_frame = ?self.stats.last_frame,
                    "capture finished"
                );
            }
            Err(e) => {
                self.state = LoopState::Terminated(Termination::Failed);
                observability::record_capture_failure(e.kind());
                warn!(
                    error = %e,
                    frames = self.stats.frames,
                    last_frame = ?self.stats.last_frame,
                    "capture failed"
                );
            }
        }
        result
    }

    async fn drive<T, V, S>(
        &mut self,
        ticker: &mut T,
        view: &V,
        vehicle: ActorId,
        writer: &mut S,
        stop: &StopSignal,
    ) -> Result<Termination, CaptureError>
    where
        T: TickSource,
        V: ActorView + Sync,
        S: TraceSink,
    {
        writer
            .write(&XvizMessage::Metadata(self.metadata.clone()))
            .await
            .map_err(|e| CaptureError::write(None, e))?;

        let progress_every = (self.options.frame_rate.round() as u64).max(1);

        loop {
            if stop.is_stopped() {
                return Ok(Termination::Cancelled);
            }

            let pose = view
                .actor_transform(vehicle)
                .await
                .map_err(CaptureError::Pose)?;

            if stop.is_stopped() {
                return Ok(Termination::Cancelled);
            }

            let started = Instant::now();
            let tick = ticker
                .tick(self.options.tick_timeout)
                .await
                .map_err(CaptureError::Tick)?;
            let tick_latency_ms = started.elapsed().as_secs_f64() * 1000.0;

            let frame = tick.frame();
            if let Some(previous) = self.stats.last_frame {
                if frame <= previous {
                    return Err(CaptureError::FrameOrder { previous, frame });
                }
            }

            if let Some(height) = self.options.spectator_height {
                view.set_spectator_transform(pose.raised(height))
                    .await
                    .map_err(CaptureError::Spectator)?;
            }

            let message = self.encoder.encode(&self.metadata, frame, &pose);
            writer
                .write(&message)
                .await
                .map_err(|e| CaptureError::write(Some(frame), e))?;

            self.stats.record(frame, tick_latency_ms);
            observability::record_frame_captured(frame, tick_latency_ms);
            debug!(frame, readings = tick.readings.len(), "frame captured");
            if self.stats.frames % progress_every == 0 {
                info!(
                    frame,
                    frames = self.stats.frames,
                    tick_latency_ms = self.stats.tick_latency.mean(),
                    "capture progress"
                );
            }

            if self
                .options
                .max_frames
                .is_some_and(|limit| self.stats.frames >= limit)
            {
                return Ok(Termination::FrameLimit);
            }
        }
    }
}
