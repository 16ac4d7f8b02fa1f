//! CaptureSession - 会话资源所有权与有序释放
//!
//! 获取顺序：车辆 → 传感器 → writer；释放顺序严格相反：
//! writer.close() → 传感器 (spawn 逆序) → 车辆。

use std::panic::AssertUnwindSafe;

use actor_factory::{ActorFactory, CarlaClient};
use contracts::{CaptureBlueprint, ContractError, OutputConfig, RuntimeGraph, TraceSink};
use futures::future::{BoxFuture, FutureExt};
use tracing::{error, info, instrument, warn};

use crate::capture_loop::timeout_from_secs;
use crate::CaptureError;

/// Borrowed view of a live session, handed to the scope body
pub struct SessionParts<'s, C: CarlaClient, S: TraceSink> {
    pub factory: &'s ActorFactory<C>,
    pub graph: &'s RuntimeGraph,
    pub writer: &'s mut S,
}

/// 采集会话
///
/// 独占持有 ActorFactory (含客户端)、RuntimeGraph 和 trace writer。
/// [`scope`](Self::scope) 是唯一的使用方式：无论 body 正常返回、出错还是
/// panic，都会先执行 [`release`](Self::release)。
pub struct CaptureSession<C: CarlaClient, S: TraceSink> {
    factory: ActorFactory<C>,
    graph: RuntimeGraph,
    writer: Option<S>,
    released: bool,
}

impl<C: CarlaClient, S: TraceSink> CaptureSession<C, S> {
    pub fn new(factory: ActorFactory<C>, graph: RuntimeGraph, writer: S) -> Self {
        Self {
            factory,
            graph,
            writer: Some(writer),
            released: false,
        }
    }

    pub fn graph(&self) -> &RuntimeGraph {
        &self.graph
    }

    pub fn factory(&self) -> &ActorFactory<C> {
        &self.factory
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Run `body` with the session's resources, then release them
    ///
    /// A panic in `body` is caught, the session released, and the panic
    /// resumed. A body error takes precedence over a release error.
    pub async fn scope<T, F>(mut self, body: F) -> Result<T, CaptureError>
    where
        F: for<'s> FnOnce(SessionParts<'s, C, S>) -> BoxFuture<'s, Result<T, CaptureError>>,
    {
        let outcome = match self.writer.as_mut() {
            Some(writer) => {
                let parts = SessionParts {
                    factory: &self.factory,
                    graph: &self.graph,
                    writer,
                };
                AssertUnwindSafe(body(parts)).catch_unwind().await
            }
            None => Ok(Err(CaptureError::InvalidState("session already released"))),
        };

        let released = self.release().await;

        match outcome {
            Err(panic) => {
                error!("capture body panicked, session released");
                std::panic::resume_unwind(panic)
            }
            Ok(Err(e)) => {
                if let Err(release_err) = released {
                    warn!(error = %release_err, "release also failed");
                }
                Err(e)
            }
            Ok(Ok(value)) => released.map(|()| value),
        }
    }

    /// Close the writer, then destroy sensors (reverse spawn order) and the vehicle
    ///
    /// Only the first call has an effect. Actor teardown continues past
    /// individual failures; a close failure is returned after teardown.
    #[instrument(
        name = "capture_session_release",
        skip(self),
        fields(actors = self.graph.len())
    )]
    pub async fn release(&mut self) -> Result<(), CaptureError> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let closed = match self.writer.take() {
            Some(mut writer) => writer.close().await.map_err(|e| {
                error!(sink = %writer.name(), error = %e, "failed to close trace");
                CaptureError::Close(e)
            }),
            None => Ok(()),
        };

        self.factory.teardown(&self.graph).await;
        info!("session released");
        closed
    }
}

impl<C: CarlaClient, S: TraceSink> Drop for CaptureSession<C, S> {
    fn drop(&mut self) {
        if !self.released {
            warn!(
                actors = self.graph.len(),
                "CaptureSession dropped without release, actors may leak"
            );
        }
    }
}

/// Connect, load the map, spawn the vehicle with its sensors, open the writer
///
/// Actors spawned before a later step fails are destroyed before returning.
#[instrument(
    name = "capture_provision",
    skip_all,
    fields(
        host = %blueprint.world.carla_host,
        port = blueprint.world.carla_port,
        map = %blueprint.world.map
    )
)]
pub async fn provision<C, S, F>(
    mut client: C,
    blueprint: &CaptureBlueprint,
    open_writer: F,
) -> Result<CaptureSession<C, S>, CaptureError>
where
    C: CarlaClient,
    S: TraceSink,
    F: FnOnce(&OutputConfig) -> Result<S, ContractError>,
{
    let world = &blueprint.world;
    client
        .connect(
            &world.carla_host,
            world.carla_port,
            timeout_from_secs(world.client_timeout_sec),
        )
        .await?;

    let factory = ActorFactory::new(client);
    factory.ensure_map(&world.map).await?;
    let graph = factory.spawn_vehicle_with_sensors(&blueprint.vehicle).await?;

    let writer = match open_writer(&blueprint.output) {
        Ok(writer) => writer,
        Err(e) => {
            error!(error = %e, directory = %blueprint.output.directory, "failed to open output");
            factory.teardown(&graph).await;
            return Err(CaptureError::Output(e));
        }
    };

    info!(
        actors = graph.len(),
        sink = %writer.name(),
        "session provisioned"
    );
    Ok(CaptureSession::new(factory, graph, writer))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use actor_factory::{EventLog, MockCarlaClient, MockConfig};
    use contracts::{
        CaptureConfig, ConfigVersion, SensorConfig, SensorType, Transform, VehicleConfig,
        WorldConfig, XvizMessage,
    };
    use trace_writer::{MemorySource, XvizJsonWriter};

    use super::*;
    use crate::{run_capture, CapturePlan, StopSignal, Termination};

    /// Sink that records its close in the simulator's event log
    struct EventSink {
        events: EventLog,
        messages: usize,
        fail_close: bool,
        panic_on_write: Option<usize>,
    }

    impl EventSink {
        fn new(events: EventLog) -> Self {
            Self {
                events,
                messages: 0,
                fail_close: false,
                panic_on_write: None,
            }
        }
    }

    impl TraceSink for EventSink {
        fn name(&self) -> &str {
            "events"
        }

        async fn write(&mut self, _message: &XvizMessage) -> Result<(), ContractError> {
            self.messages += 1;
            if self.panic_on_write == Some(self.messages) {
                panic!("sink exploded on write {}", self.messages);
            }
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            self.events
                .lock()
                .unwrap()
                .push(format!("close:{}", self.messages));
            if self.fail_close {
                return Err(ContractError::sink_write("events", "close failed"));
            }
            Ok(())
        }
    }

    /// Forwards to `inner` and records every close in the event log
    struct CloseLogged<S> {
        inner: S,
        events: EventLog,
    }

    impl<S: TraceSink> TraceSink for CloseLogged<S> {
        fn name(&self) -> &str {
            self.inner.name()
        }

        async fn write(&mut self, message: &XvizMessage) -> Result<(), ContractError> {
            self.inner.write(message).await
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            self.inner.flush().await
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            self.events
                .lock()
                .unwrap()
                .push(format!("close:{}", self.inner.name()));
            self.inner.close().await
        }
    }

    fn blueprint(max_frames: u64) -> CaptureBlueprint {
        let sensor = |id: &str, sensor_type| SensorConfig {
            id: id.to_string(),
            sensor_type,
            transform: Transform::default(),
            attributes: HashMap::new(),
        };
        CaptureBlueprint {
            version: ConfigVersion::V1,
            world: WorldConfig {
                map: "/Game/Carla/Maps/Town01".into(),
                carla_host: "localhost".into(),
                carla_port: 2000,
                client_timeout_sec: 2.0,
            },
            vehicle: VehicleConfig {
                id: "ego".into(),
                blueprint: "vehicle.jeep.wrangler_rubicon".into(),
                spawn_point: None,
                autopilot: true,
                sensors: vec![
                    sensor("camera_rgb", SensorType::Camera),
                    sensor("lidar", SensorType::Lidar),
                ],
            },
            capture: CaptureConfig {
                max_frames,
                tick_timeout_sec: 0.2,
                ..Default::default()
            },
            output: Default::default(),
        }
    }

    fn release_events(events: &EventLog) -> Vec<String> {
        events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.starts_with("close") || e.starts_with("destroy"))
            .cloned()
            .collect()
    }

    #[tokio::test]
    async fn frame_limit_then_ordered_release() {
        let client = MockCarlaClient::new();
        let events = client.event_log();
        let blueprint = blueprint(3);
        let plan = CapturePlan::from_blueprint(&blueprint);

        let session = provision(client, &blueprint, |_| Ok(EventSink::new(events.clone())))
            .await
            .unwrap();
        assert_eq!(session.graph().len(), 3);

        let report = session
            .scope(move |parts| run_capture(parts, plan, StopSignal::new()).boxed())
            .await
            .unwrap();

        assert_eq!(report.termination, Termination::FrameLimit);
        assert_eq!(report.stats.frames, 3);
        assert_eq!(
            release_events(&events),
            vec!["close:4", "destroy:1002", "destroy:1001", "destroy:1000"]
        );
        assert!(events.lock().unwrap().iter().any(|e| e.starts_with("load_map:")));
    }

    #[tokio::test]
    async fn timeout_on_fifth_tick_closes_once() {
        let client = MockCarlaClient::with_config(MockConfig {
            silent_from_tick: Some(5),
            ..Default::default()
        });
        let events = client.event_log();
        let blueprint = blueprint(0);
        let plan = CapturePlan::from_blueprint(&blueprint);
        let source = MemorySource::new();
        let files = source.clone();
        let close_log = events.clone();

        let session = provision(client, &blueprint, move |_| {
            Ok(CloseLogged {
                inner: XvizJsonWriter::new("xviz", source),
                events: close_log,
            })
        })
        .await
        .unwrap();

        let err = session
            .scope(move |parts| run_capture(parts, plan, StopSignal::new()).boxed())
            .await
            .unwrap_err();

        assert!(err.is_sync_failure(), "unexpected error: {err}");
        // metadata + 4 updates + index
        assert_eq!(files.len(), 6);
        assert!(files.get("0-frame.json").is_some());
        assert!(files.get("5-frame.json").is_some());
        assert!(files.get("6-frame.json").is_none());
        assert_eq!(
            release_events(&events),
            vec!["close:xviz", "destroy:1002", "destroy:1001", "destroy:1000"]
        );
    }

    #[tokio::test]
    async fn panic_mid_capture_restores_world_settings() {
        let client = MockCarlaClient::new();
        let events = client.event_log();
        let blueprint = blueprint(0);
        let plan = CapturePlan::from_blueprint(&blueprint);

        let sink_events = events.clone();
        let session = provision(client, &blueprint, move |_| {
            let mut sink = EventSink::new(sink_events);
            // metadata and two updates go through, the third update panics
            sink.panic_on_write = Some(4);
            Ok(sink)
        })
        .await
        .unwrap();

        let scoped =
            session.scope(move |parts| run_capture(parts, plan, StopSignal::new()).boxed());
        let outcome = AssertUnwindSafe(scoped).catch_unwind().await;
        assert!(outcome.is_err());

        let lifecycle: Vec<String> = events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| {
                e.starts_with("apply_settings") || e.starts_with("close") || e.starts_with("destroy")
            })
            .cloned()
            .collect();
        assert_eq!(
            lifecycle,
            vec![
                "apply_settings:sync=true",
                "apply_settings:sync=false",
                "close:4",
                "destroy:1002",
                "destroy:1001",
                "destroy:1000",
            ]
        );
    }

    #[tokio::test]
    async fn cancelled_before_first_tick() {
        let client = MockCarlaClient::new();
        let events = client.event_log();
        let blueprint = blueprint(0);
        let plan = CapturePlan::from_blueprint(&blueprint);
        let stop = StopSignal::new();
        stop.stop();

        let session = provision(client, &blueprint, |_| Ok(EventSink::new(events.clone())))
            .await
            .unwrap();
        let report = session
            .scope(move |parts| run_capture(parts, plan, stop).boxed())
            .await
            .unwrap();

        assert_eq!(report.termination, Termination::Cancelled);
        assert_eq!(report.stats.frames, 0);
        assert_eq!(release_events(&events)[0], "close:1");
    }

    #[tokio::test]
    async fn panic_in_body_still_releases() {
        let client = MockCarlaClient::new();
        let events = client.event_log();
        let blueprint = blueprint(0);

        let session = provision(client, &blueprint, |_| Ok(EventSink::new(events.clone())))
            .await
            .unwrap();

        let explode = true;
        let scoped = session.scope(move |_parts| {
            async move {
                if explode {
                    panic!("boom");
                }
                Ok::<(), CaptureError>(())
            }
            .boxed()
        });
        let outcome = AssertUnwindSafe(scoped).catch_unwind().await;
        assert!(outcome.is_err());

        assert_eq!(
            release_events(&events),
            vec!["close:0", "destroy:1002", "destroy:1001", "destroy:1000"]
        );
    }

    #[tokio::test]
    async fn body_error_wins_over_close_error() {
        let client = MockCarlaClient::new();
        let events = client.event_log();
        let blueprint = blueprint(0);

        let session = provision(client, &blueprint, |_| {
            let mut sink = EventSink::new(events.clone());
            sink.fail_close = true;
            Ok(sink)
        })
        .await
        .unwrap();

        let err = session
            .scope(|_parts| async { Err::<(), _>(CaptureError::InvalidState("body")) }.boxed())
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::InvalidState("body")));
        assert_eq!(release_events(&events).len(), 4);
    }

    #[tokio::test]
    async fn close_error_surfaces_after_teardown() {
        let client = MockCarlaClient::new();
        let events = client.event_log();
        let blueprint = blueprint(0);

        let session = provision(client, &blueprint, |_| {
            let mut sink = EventSink::new(events.clone());
            sink.fail_close = true;
            Ok(sink)
        })
        .await
        .unwrap();

        let err = session
            .scope(|_parts| async { Ok::<_, CaptureError>(7) }.boxed())
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::Close(_)));
        assert_eq!(
            release_events(&events),
            vec!["close:0", "destroy:1002", "destroy:1001", "destroy:1000"]
        );
    }

    #[tokio::test]
    async fn writer_failure_rolls_back_actors() {
        let client = MockCarlaClient::new();
        let events = client.event_log();

        let result = provision(client, &blueprint(0), |_| {
            Err::<EventSink, _>(ContractError::sink_write("events", "permission denied"))
        })
        .await;

        assert!(matches!(result, Err(CaptureError::Output(_))));
        assert_eq!(
            release_events(&events),
            vec!["destroy:1002", "destroy:1001", "destroy:1000"]
        );
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let client = MockCarlaClient::new();
        let events = client.event_log();
        let mut session = provision(client, &blueprint(0), |_| Ok(EventSink::new(events.clone())))
            .await
            .unwrap();

        session.release().await.unwrap();
        session.release().await.unwrap();
        assert!(session.is_released());
        assert_eq!(release_events(&events).len(), 4);
    }
}
