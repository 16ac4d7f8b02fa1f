//! SyncMode - synchronous-mode context and tick primitive

use std::time::Duration;

use contracts::{ContractError, SensorSource, SimWorld, SyncTick, TickSource, WorldSettings};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::error::SyncModeError;
use crate::lane::{LaneMiss, SensorLane};

/// Per-sensor queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Synchronous-mode context over a simulated world
///
/// Lifecycle: [`enter`](Self::enter) → `tick` × N → [`exit`](Self::exit).
/// `exit` restores the world settings captured by `enter` and is safe to call
/// more than once.
pub struct SyncMode<'w, W: SimWorld + Sync> {
    world: &'w W,
    frame_rate: f64,
    lanes: Vec<SensorLane>,
    saved_settings: Option<WorldSettings>,
    entered: bool,
    last_frame: Option<u64>,
}

impl<'w, W: SimWorld + Sync> SyncMode<'w, W> {
    /// Create a context for `sources`, in the order readings should be reported
    pub fn new(
        world: &'w W,
        sources: Vec<Box<dyn SensorSource>>,
        frame_rate: f64,
    ) -> Result<Self, SyncModeError> {
        Self::with_capacity(world, sources, frame_rate, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(
        world: &'w W,
        sources: Vec<Box<dyn SensorSource>>,
        frame_rate: f64,
        capacity: usize,
    ) -> Result<Self, SyncModeError> {
        if !(frame_rate.is_finite() && frame_rate > 0.0) {
            return Err(SyncModeError::InvalidFrameRate(frame_rate));
        }
        let lanes = sources
            .into_iter()
            .map(|source| SensorLane::new(source, capacity.max(1)))
            .collect();
        Ok(Self {
            world,
            frame_rate,
            lanes,
            saved_settings: None,
            entered: false,
            last_frame: None,
        })
    }

    pub fn sensor_ids(&self) -> Vec<&str> {
        self.lanes.iter().map(|l| l.sensor_id()).collect()
    }

    pub fn is_entered(&self) -> bool {
        self.entered
    }

    /// Frame index of the last successful tick
    pub fn last_frame(&self) -> Option<u64> {
        self.last_frame
    }

    /// Switch to synchronous mode and start every sensor
    #[instrument(name = "sync_mode_enter", skip(self), fields(frame_rate = self.frame_rate, sensors = self.lanes.len()))]
    pub async fn enter(&mut self) -> Result<(), SyncModeError> {
        if self.entered {
            return Err(SyncModeError::AlreadyEntered);
        }

        let original = self.world.settings().await?;
        self.world
            .apply_settings(WorldSettings::synchronous(self.frame_rate))
            .await?;
        self.saved_settings = Some(original);

        for lane in &mut self.lanes {
            lane.listen();
        }
        self.entered = true;

        info!(
            fixed_delta_seconds = 1.0 / self.frame_rate,
            "synchronous mode entered"
        );
        Ok(())
    }

    /// Stop every sensor and restore the original world settings
    #[instrument(name = "sync_mode_exit", skip(self))]
    pub async fn exit(&mut self) -> Result<(), SyncModeError> {
        if !self.entered {
            return Ok(());
        }
        self.entered = false;

        for lane in &self.lanes {
            lane.stop();
        }

        if let Some(original) = self.saved_settings.take() {
            self.world.apply_settings(original).await?;
        }
        info!(last_frame = ?self.last_frame, "synchronous mode exited");
        Ok(())
    }

    /// Advance the world one step and collect one reading per sensor for
    /// exactly that step
    ///
    /// Readings older than the snapshot are discarded. A newer reading means
    /// the producer skipped ahead and is reported as [`ContractError::Desync`].
    #[instrument(name = "sync_mode_tick", skip(self), fields(timeout_ms = timeout.as_millis() as u64))]
    pub async fn next_tick(&mut self, timeout: Duration) -> Result<SyncTick, ContractError> {
        if !self.entered {
            return Err(SyncModeError::NotEntered.into());
        }

        let started = Instant::now();
        let deadline = started + timeout;
        let snapshot = self.world.tick().await?;
        let frame = snapshot.frame;

        let mut readings = Vec::with_capacity(self.lanes.len());
        for (idx, lane) in self.lanes.iter().enumerate() {
            match lane.next_for(frame, deadline).await {
                Ok(reading) => readings.push(reading),
                Err(miss) => {
                    return Err(self.miss_error(idx, miss, frame, started));
                }
            }
        }

        let waited = started.elapsed();
        metrics::histogram!("sync_mode_tick_wait_seconds").record(waited.as_secs_f64());
        debug!(frame, waited_ms = waited.as_millis() as u64, "tick complete");

        self.last_frame = Some(frame);
        Ok(SyncTick { snapshot, readings })
    }

    fn miss_error(&self, idx: usize, miss: LaneMiss, frame: u64, started: Instant) -> ContractError {
        let sensor_id = self.lanes[idx].sensor_id().to_string();
        match miss {
            LaneMiss::Timeout => {
                // 剩余队列只做非阻塞检查，用于报告缺失列表
                let mut missing = vec![sensor_id];
                for lane in &self.lanes[idx + 1..] {
                    if lane.try_next_for(frame).is_err() {
                        missing.push(lane.sensor_id().to_string());
                    }
                }
                let waited_ms = started.elapsed().as_millis() as u64;
                metrics::counter!("sync_mode_timeouts_total").increment(1);
                warn!(frame, waited_ms, ?missing, "tick timed out");
                ContractError::SyncTimeout {
                    frame,
                    waited_ms,
                    missing,
                }
            }
            LaneMiss::Ahead(actual) => {
                warn!(sensor_id = %sensor_id, expected = frame, actual, "sensor desynchronized");
                ContractError::Desync {
                    sensor_id,
                    expected: frame,
                    actual,
                }
            }
            LaneMiss::Closed => {
                warn!(sensor_id = %sensor_id, frame, "sensor queue closed");
                ContractError::SensorDisconnected { sensor_id }
            }
        }
    }
}

impl<W: SimWorld + Sync> TickSource for SyncMode<'_, W> {
    async fn tick(&mut self, timeout: Duration) -> Result<SyncTick, ContractError> {
        self.next_tick(timeout).await
    }
}

impl<W: SimWorld + Sync> Drop for SyncMode<'_, W> {
    fn drop(&mut self) {
        if self.entered {
            warn!("sync mode dropped without exit, world settings not restored");
            for lane in &self.lanes {
                if lane.is_listening() {
                    lane.stop();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use actor_factory::{ActorFactory, CarlaClient, MockCarlaClient, MockConfig, RuntimeGraph};
    use contracts::{SensorConfig, SensorType, Transform, VehicleConfig};

    const TIMEOUT: Duration = Duration::from_millis(50);

    fn vehicle() -> VehicleConfig {
        let sensor = |id: &str, sensor_type| SensorConfig {
            id: id.to_string(),
            sensor_type,
            transform: Transform::default(),
            attributes: HashMap::new(),
        };
        VehicleConfig {
            id: "ego".into(),
            blueprint: "vehicle.jeep.wrangler_rubicon".into(),
            spawn_point: None,
            autopilot: true,
            sensors: vec![
                sensor("camera_rgb", SensorType::Camera),
                sensor("lidar", SensorType::Lidar),
            ],
        }
    }

    async fn provision(config: MockConfig) -> (ActorFactory<MockCarlaClient>, RuntimeGraph) {
        let mut client = MockCarlaClient::with_config(config);
        client
            .connect("localhost", 2000, Duration::from_secs(2))
            .await
            .unwrap();
        let factory = ActorFactory::new(client);
        let graph = factory.spawn_vehicle_with_sensors(&vehicle()).await.unwrap();
        (factory, graph)
    }

    fn sources(
        factory: &ActorFactory<MockCarlaClient>,
        graph: &RuntimeGraph,
    ) -> Vec<Box<dyn SensorSource>> {
        factory.sensor_sources(graph, &vehicle().sensors).unwrap()
    }

    #[tokio::test]
    async fn enter_tick_exit_round() {
        let (factory, graph) = provision(MockConfig::default()).await;
        let mut sync = SyncMode::new(factory.client(), sources(&factory, &graph), 30.0).unwrap();

        sync.enter().await.unwrap();
        let settings = factory.client().current_settings();
        assert!(settings.synchronous_mode);
        assert!((settings.fixed_delta_seconds.unwrap() - 1.0 / 30.0).abs() < 1e-12);

        for expected in 1..=3 {
            let tick = sync.next_tick(TIMEOUT).await.unwrap();
            assert_eq!(tick.frame(), expected);
            assert!(tick.is_aligned());
            let ids: Vec<_> = tick.readings.iter().map(|r| r.sensor_id.as_str()).collect();
            assert_eq!(ids, vec!["camera_rgb", "lidar"]);
        }
        assert_eq!(sync.last_frame(), Some(3));

        sync.exit().await.unwrap();
        sync.exit().await.unwrap();
        assert!(!factory.client().current_settings().synchronous_mode);
    }

    #[tokio::test]
    async fn stale_readings_are_discarded() {
        let (factory, graph) = provision(MockConfig {
            stale_readings: true,
            ..Default::default()
        })
        .await;
        let mut sync = SyncMode::new(factory.client(), sources(&factory, &graph), 30.0).unwrap();
        sync.enter().await.unwrap();

        for expected in 1..=3 {
            let tick = TickSource::tick(&mut sync, TIMEOUT).await.unwrap();
            assert_eq!(tick.frame(), expected);
            assert!(tick.is_aligned());
        }
        sync.exit().await.unwrap();
    }

    #[tokio::test]
    async fn silent_sensors_time_out() {
        let (factory, graph) = provision(MockConfig {
            silent_from_tick: Some(2),
            ..Default::default()
        })
        .await;
        let mut sync = SyncMode::new(factory.client(), sources(&factory, &graph), 30.0).unwrap();
        sync.enter().await.unwrap();

        sync.next_tick(TIMEOUT).await.unwrap();
        let err = sync.next_tick(TIMEOUT).await.unwrap_err();
        match err {
            ContractError::SyncTimeout {
                frame,
                waited_ms,
                missing,
            } => {
                assert_eq!(frame, 2);
                assert!(waited_ms >= 40, "waited {waited_ms}ms");
                assert_eq!(missing, vec!["camera_rgb", "lidar"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        sync.exit().await.unwrap();
    }

    #[tokio::test]
    async fn future_frame_is_desync() {
        let (factory, graph) = provision(MockConfig {
            desync_at_tick: Some(1),
            ..Default::default()
        })
        .await;
        let mut sync = SyncMode::new(factory.client(), sources(&factory, &graph), 30.0).unwrap();
        sync.enter().await.unwrap();

        let err = sync.next_tick(TIMEOUT).await.unwrap_err();
        assert!(matches!(
            err,
            ContractError::Desync { ref sensor_id, expected: 1, actual: 2 } if sensor_id == "camera_rgb"
        ));
        sync.exit().await.unwrap();
    }

    #[tokio::test]
    async fn destroyed_sensor_disconnects() {
        let (factory, graph) = provision(MockConfig::default()).await;
        let mut sync = SyncMode::new(factory.client(), sources(&factory, &graph), 30.0).unwrap();
        sync.enter().await.unwrap();

        let lidar = graph.sensors[1].actor_id;
        factory.client().destroy_actor(lidar).await.unwrap();

        let err = sync.next_tick(TIMEOUT).await.unwrap_err();
        assert!(matches!(
            err,
            ContractError::SensorDisconnected { ref sensor_id } if sensor_id == "lidar"
        ));
        sync.exit().await.unwrap();
    }

    #[tokio::test]
    async fn tick_requires_enter() {
        let (factory, graph) = provision(MockConfig::default()).await;
        let mut sync = SyncMode::new(factory.client(), sources(&factory, &graph), 30.0).unwrap();
        assert!(sync.next_tick(TIMEOUT).await.is_err());

        sync.enter().await.unwrap();
        assert!(matches!(
            sync.enter().await,
            Err(SyncModeError::AlreadyEntered)
        ));
        sync.exit().await.unwrap();
    }

    #[tokio::test]
    async fn rejects_bad_frame_rate() {
        let (factory, _graph) = provision(MockConfig::default()).await;
        assert!(matches!(
            SyncMode::new(factory.client(), Vec::new(), 0.0),
            Err(SyncModeError::InvalidFrameRate(_))
        ));
    }
}
