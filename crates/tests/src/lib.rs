//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置 -> 会话 -> 采集循环 -> XVIZ 目录 的完整链路（Mock，无需 CARLA）
//! - 失败路径下的资源释放顺序
//! - 真实 CARLA 冒烟测试（`real-carla` feature，默认忽略）

#[cfg(test)]
mod contract_tests {
    use contracts::{TraceSink, XvizMessage};

    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
    }

    #[test]
    fn declared_metadata_passes_validation() {
        let metadata = capture::declare_metadata();
        assert!(xviz::validate_metadata(&metadata).is_ok());

        let message = XvizMessage::Metadata(metadata);
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["type"], "xviz/metadata");
        assert_eq!(
            value["data"]["streams"]["/vehicle_pose"]["category"],
            "POSE"
        );
    }

    fn assert_sink<S: TraceSink>() {}

    #[test]
    fn writers_are_trace_sinks() {
        assert_sink::<trace_writer::LogSink>();
        assert_sink::<trace_writer::XvizJsonWriter<trace_writer::MemorySource>>();
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::path::Path;

    use actor_factory::{MockCarlaClient, MockConfig};
    use capture::{
        provision, run_capture, CaptureError, CapturePlan, StopSignal, Termination,
        POINTS_STREAM, VEHICLE_POSE_STREAM,
    };
    use contracts::{CaptureBlueprint, ContractError, XvizMessage};
    use futures::FutureExt;
    use serde_json::Value;
    use trace_writer::{DirectorySource, MemorySource, TraceIndex, XvizJsonWriter};

    const CONFIG: &str = r#"
[world]
map = "/Game/Carla/Maps/Town01"

[vehicle]
id = "ego"
blueprint = "vehicle.jeep.wrangler_rubicon"
autopilot = true

[[vehicle.sensors]]
id = "camera_rgb"
sensor_type = "camera"
transform = { location = { x = 1.5, y = 0.0, z = 2.4 }, rotation = { pitch = 0.0, yaw = 0.0, roll = 0.0 } }

[[vehicle.sensors]]
id = "lidar"
sensor_type = "lidar"

[capture]
frame_rate = 30.0
tick_timeout_sec = 0.5
max_frames = 10
"#;

    fn blueprint() -> CaptureBlueprint {
        config_loader::ConfigLoader::load_from_str(CONFIG, config_loader::ConfigFormat::Toml)
            .unwrap()
    }

    fn read_json(dir: &Path, file: &str) -> Value {
        let bytes = std::fs::read(dir.join(file)).unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Config -> provision -> capture -> XVIZ directory, all on the mock simulator
    #[tokio::test]
    async fn test_e2e_mock_capture_to_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("trace");
        let mut blueprint = blueprint();
        blueprint.output.directory = out.display().to_string();

        let session = provision(MockCarlaClient::new(), &blueprint, |output| {
            let source = DirectorySource::new(&output.directory, output.recreate)?;
            Ok(XvizJsonWriter::new("xviz", source))
        })
        .await
        .unwrap();

        let plan = CapturePlan::from_blueprint(&blueprint);
        let report = session
            .scope(move |parts| run_capture(parts, plan, StopSignal::new()).boxed())
            .await
            .unwrap();

        assert_eq!(report.termination, Termination::FrameLimit);
        assert_eq!(report.stats.frames, 10);

        // metadata first
        let metadata = read_json(&out, "1-frame.json");
        assert_eq!(metadata["type"], "xviz/metadata");
        let declared: Vec<&str> = metadata["data"]["streams"]
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();

        // one update per frame, timestamp = frame / frame_rate
        for frame in 1..=10u64 {
            let update = read_json(&out, &format!("{}-frame.json", frame + 1));
            assert_eq!(update["type"], "xviz/state_update");
            let set = &update["data"]["updates"][0];
            let expected = frame as f64 / 30.0;
            assert!((set["timestamp"].as_f64().unwrap() - expected).abs() < 1e-9);
            assert!(set["poses"][VEHICLE_POSE_STREAM].is_object());
            assert!(set["primitives"][POINTS_STREAM].is_object());

            for stream in set["poses"]
                .as_object()
                .unwrap()
                .keys()
                .chain(set["primitives"].as_object().unwrap().keys())
            {
                assert!(declared.contains(&stream.as_str()), "{stream} undeclared");
            }
        }
        assert!(!out.join("12-frame.json").exists());

        let index: TraceIndex =
            serde_json::from_value(read_json(&out, "0-frame.json")).unwrap();
        assert_eq!(index.messages.len(), 10);
        assert_eq!(index.messages[0].2, 2);
        assert_eq!(index.messages[9].3, "11-frame");
        assert!((index.start_time - 1.0 / 30.0).abs() < 1e-9);
        assert!((index.end_time - 10.0 / 30.0).abs() < 1e-9);
    }

    /// Vehicle moves under autopilot, so poses must differ between first and last frame
    #[tokio::test]
    async fn test_e2e_vehicle_pose_advances() {
        let source = MemorySource::new();
        let mut blueprint = blueprint();
        blueprint.capture.max_frames = 5;

        let writer_source = source.clone();
        let session = provision(MockCarlaClient::new(), &blueprint, move |_| {
            Ok(XvizJsonWriter::new("memory", writer_source))
        })
        .await
        .unwrap();

        let plan = CapturePlan::from_blueprint(&blueprint);
        session
            .scope(move |parts| run_capture(parts, plan, StopSignal::new()).boxed())
            .await
            .unwrap();

        let position = |file: &str| -> [f64; 3] {
            let message: XvizMessage =
                serde_json::from_slice(&source.get(file).unwrap()).unwrap();
            message.as_state_update().unwrap().updates[0].poses[VEHICLE_POSE_STREAM].position
        };
        let first = position("2-frame.json");
        let last = position("6-frame.json");
        assert_ne!(first, last);
    }

    /// A sensor skipping ahead fails the capture, and the session still releases in order
    #[tokio::test]
    async fn test_e2e_desync_releases_session() {
        let client = MockCarlaClient::with_config(MockConfig {
            desync_at_tick: Some(3),
            ..Default::default()
        });
        let events = client.event_log();
        let source = MemorySource::new();
        let blueprint = blueprint();

        let writer_source = source.clone();
        let session = provision(client, &blueprint, move |_| {
            Ok(XvizJsonWriter::new("memory", writer_source))
        })
        .await
        .unwrap();

        let plan = CapturePlan::from_blueprint(&blueprint);
        let err = session
            .scope(move |parts| run_capture(parts, plan, StopSignal::new()).boxed())
            .await
            .unwrap_err();

        assert!(err.is_sync_failure(), "{err}");
        assert!(matches!(
            err,
            CaptureError::Tick(ContractError::Desync { expected: 3, actual: 4, .. })
        ));

        // metadata + two frames, index written on close
        assert!(source.get("3-frame.json").is_some());
        assert!(source.get("4-frame.json").is_none());
        let index: TraceIndex =
            serde_json::from_slice(&source.get("0-frame.json").unwrap()).unwrap();
        assert_eq!(index.messages.len(), 2);

        // sensors before vehicle, newest first
        let destroys: Vec<String> = events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.starts_with("destroy"))
            .cloned()
            .collect();
        assert_eq!(destroys, vec!["destroy:1002", "destroy:1001", "destroy:1000"]);

        // the world is back in asynchronous mode
        let settings_events: Vec<String> = events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.starts_with("apply_settings"))
            .cloned()
            .collect();
        assert_eq!(settings_events.len(), 2);
    }

    /// Stopping before the first tick still yields a well-formed trace
    #[tokio::test]
    async fn test_e2e_stop_before_first_frame() {
        let source = MemorySource::new();
        let blueprint = blueprint();
        let stop = StopSignal::new();
        stop.stop();

        let writer_source = source.clone();
        let session = provision(MockCarlaClient::new(), &blueprint, move |_| {
            Ok(XvizJsonWriter::new("memory", writer_source))
        })
        .await
        .unwrap();

        let plan = CapturePlan::from_blueprint(&blueprint);
        let report = session
            .scope(move |parts| run_capture(parts, plan, stop).boxed())
            .await
            .unwrap();

        assert_eq!(report.termination, Termination::Cancelled);
        assert_eq!(report.stats.frames, 0);
        assert_eq!(source.names(), vec!["0-frame.json", "1-frame.json"]);
        let index: TraceIndex =
            serde_json::from_slice(&source.get("0-frame.json").unwrap()).unwrap();
        assert!(index.messages.is_empty());
    }
}

/// Smoke test against a live simulator on localhost:2000
#[cfg(all(test, feature = "real-carla"))]
mod real_carla_tests {
    use actor_factory::RealCarlaClient;
    use capture::{provision, run_capture, CapturePlan, StopSignal, Termination};
    use futures::FutureExt;
    use trace_writer::LogSink;

    #[tokio::test]
    #[ignore = "requires CARLA server"]
    async fn test_real_carla_short_capture() {
        let mut blueprint = config_loader::ConfigLoader::load_from_str(
            r#"
[world]
map = "Town01"

[vehicle]
id = "ego"
blueprint = "vehicle.tesla.model3"

[[vehicle.sensors]]
id = "camera_rgb"
sensor_type = "camera"
"#,
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();
        blueprint.capture.max_frames = 30;

        let session = provision(RealCarlaClient::new(), &blueprint, |_| {
            Ok(LogSink::new("smoke"))
        })
        .await
        .unwrap();

        let plan = CapturePlan::from_blueprint(&blueprint);
        let report = session
            .scope(move |parts| run_capture(parts, plan, StopSignal::new()).boxed())
            .await
            .unwrap();
        assert_eq!(report.termination, Termination::FrameLimit);
        assert_eq!(report.stats.frames, 30);
    }
}
