//! Mock CARLA 客户端
//!
//! 用于单元测试和无服务器运行的 mock 实现，支持注入失败场景。
//!
//! 世界按 tick 推进：每次 `tick()` 帧号加一，开启自动驾驶的车辆沿朝向前进，
//! 所有正在监听的 mock 传感器收到该帧的读数。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use contracts::{
    ActorId, ActorView, ContractError, Location, SensorSource, SensorType, SimWorld, Snapshot,
    Transform, WorldSettings,
};
use tracing::{debug, instrument};

use crate::client::CarlaClient;
use crate::error::{ActorFactoryError, Result};
use crate::mock_sensor::{lock, MockSensor, MockSensorConfig, SensorTap};

/// 异步模式下 mock 世界的步长 (秒)
const VARIABLE_STEP_SECONDS: f64 = 0.05;

/// 共享事件日志，按发生顺序记录 mock 世界中的操作
pub type EventLog = Arc<Mutex<Vec<String>>>;

/// Mock 客户端配置
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// 连接后的当前地图
    pub initial_map: String,
    /// 应该 spawn 失败的蓝图名称
    pub fail_blueprints: Vec<String>,
    /// 应该失败的 destroy actor IDs
    pub fail_destroy: Vec<ActorId>,
    /// 地图加载失败
    pub fail_map_load: bool,
    /// 移动观察视角失败
    pub fail_spectator: bool,
    /// 第一次 tick 之前的帧号
    pub start_frame: u64,
    /// 自动驾驶车速 (m/s)
    pub vehicle_speed: f64,
    /// 从第 N 次 tick (1 起) 开始传感器不再产出数据
    pub silent_from_tick: Option<u64>,
    /// 第 N 次 tick 时传感器产出下一帧的数据
    pub desync_at_tick: Option<u64>,
    /// 每次 tick 先重发上一帧的旧数据
    pub stale_readings: bool,
    /// 传感器载荷配置
    pub sensor: MockSensorConfig,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            initial_map: "Carla/Maps/Town10HD_Opt".to_string(),
            fail_blueprints: Vec::new(),
            fail_destroy: Vec::new(),
            fail_map_load: false,
            fail_spectator: false,
            start_frame: 0,
            vehicle_speed: 10.0,
            silent_from_tick: None,
            desync_at_tick: None,
            stale_readings: false,
            sensor: MockSensorConfig::default(),
        }
    }
}

enum MockActor {
    Vehicle {
        transform: Transform,
        autopilot: bool,
    },
    Sensor {
        parent: ActorId,
        tap: Arc<SensorTap>,
    },
}

#[derive(Debug, Default, Clone, Copy)]
struct WorldClock {
    frame: u64,
    ticks: u64,
    elapsed_seconds: f64,
}

/// Mock CARLA 客户端
pub struct MockCarlaClient {
    /// 配置（可注入失败场景）
    config: MockConfig,
    /// Actor ID 计数器
    next_actor_id: AtomicU32,
    /// 已创建的 actors
    actors: Mutex<HashMap<ActorId, MockActor>>,
    /// 连接状态
    connected: AtomicBool,
    map: Mutex<String>,
    settings: Mutex<WorldSettings>,
    clock: Mutex<WorldClock>,
    spectator: Mutex<Transform>,
    events: EventLog,
}

impl MockCarlaClient {
    /// 创建默认 mock 客户端
    pub fn new() -> Self {
        Self::with_config(MockConfig::default())
    }

    /// 使用配置创建 mock 客户端
    pub fn with_config(config: MockConfig) -> Self {
        let clock = WorldClock {
            frame: config.start_frame,
            ..Default::default()
        };
        Self {
            map: Mutex::new(config.initial_map.clone()),
            config,
            next_actor_id: AtomicU32::new(1000), // 从 1000 开始，便于识别
            actors: Mutex::new(HashMap::new()),
            connected: AtomicBool::new(false),
            settings: Mutex::new(WorldSettings::default()),
            clock: Mutex::new(clock),
            spectator: Mutex::new(Transform::default()),
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// 使用外部事件日志 (与测试 sink 共享顺序)
    pub fn with_event_log(mut self, events: EventLog) -> Self {
        self.events = events;
        self
    }

    /// 获取当前已创建的 actor 数量
    pub fn actor_count(&self) -> usize {
        lock(&self.actors).len()
    }

    /// 获取所有已创建的 actor IDs
    pub fn all_actor_ids(&self) -> Vec<ActorId> {
        let mut ids: Vec<_> = lock(&self.actors).keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// 事件日志句柄
    pub fn event_log(&self) -> EventLog {
        self.events.clone()
    }

    /// 事件日志快照
    pub fn events(&self) -> Vec<String> {
        lock(&self.events).clone()
    }

    /// 当前观察视角
    pub fn spectator_transform(&self) -> Transform {
        *lock(&self.spectator)
    }

    /// 当前世界设置
    pub fn current_settings(&self) -> WorldSettings {
        *lock(&self.settings)
    }

    /// 当前帧号
    pub fn frame(&self) -> u64 {
        lock(&self.clock).frame
    }

    fn allocate_actor_id(&self) -> ActorId {
        self.next_actor_id.fetch_add(1, Ordering::SeqCst)
    }

    fn record(&self, event: String) {
        lock(&self.events).push(event);
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ActorFactoryError::connection("not connected"))
        }
    }

    fn ensure_world(&self) -> std::result::Result<(), ContractError> {
        self.ensure_connected().map_err(ContractError::from)
    }

    fn advance_vehicles(&self, dt: f64) {
        let speed = self.config.vehicle_speed;
        for actor in lock(&self.actors).values_mut() {
            if let MockActor::Vehicle {
                transform,
                autopilot: true,
            } = actor
            {
                let yaw = transform.rotation.yaw.to_radians();
                transform.location.x += speed * dt * yaw.cos();
                transform.location.y += speed * dt * yaw.sin();
            }
        }
    }

    fn emit_sensor_data(&self, snapshot: Snapshot, tick: u64) {
        if self.config.silent_from_tick.is_some_and(|n| tick >= n) {
            debug!(tick, "mock sensors silent");
            return;
        }

        let taps: Vec<Arc<SensorTap>> = lock(&self.actors)
            .values()
            .filter_map(|actor| match actor {
                MockActor::Sensor { tap, .. } => Some(tap.clone()),
                MockActor::Vehicle { .. } => None,
            })
            .collect();

        let frame = if self.config.desync_at_tick == Some(tick) {
            snapshot.frame + 1
        } else {
            snapshot.frame
        };

        for tap in taps {
            if self.config.stale_readings && snapshot.frame > 0 {
                tap.emit(snapshot.frame - 1, snapshot.elapsed_seconds);
            }
            tap.emit(frame, snapshot.elapsed_seconds);
        }
    }
}

impl Default for MockCarlaClient {
    fn default() -> Self {
        Self::new()
    }
}

impl CarlaClient for MockCarlaClient {
    #[instrument(name = "mock_carla_connect", skip(self, timeout), fields(host = %host, port))]
    async fn connect(&mut self, host: &str, port: u16, timeout: Duration) -> Result<()> {
        let _ = timeout;
        self.connected.store(true, Ordering::SeqCst);
        self.record(format!("connect:{host}:{port}"));
        Ok(())
    }

    async fn current_map(&self) -> Result<String> {
        self.ensure_connected()?;
        Ok(lock(&self.map).clone())
    }

    #[instrument(name = "mock_carla_load_map", skip(self), fields(map = %map))]
    async fn load_map(&self, map: &str) -> Result<()> {
        self.ensure_connected()?;
        if self.config.fail_map_load {
            return Err(ActorFactoryError::map_load(map, "mock failure"));
        }

        // CARLA 报告的地图名不带 /Game/ 前缀
        let name = map.trim_start_matches("/Game/").to_string();
        *lock(&self.map) = name;
        // 加载地图会清空当前 episode 的所有 actors
        lock(&self.actors).clear();
        self.record(format!("load_map:{map}"));
        Ok(())
    }

    #[instrument(
        name = "mock_carla_spawn_vehicle",
        skip(self, transform),
        fields(blueprint = %blueprint, has_transform = transform.is_some())
    )]
    async fn spawn_vehicle(
        &self,
        blueprint: &str,
        transform: Option<Transform>,
        autopilot: bool,
    ) -> Result<ActorId> {
        self.ensure_connected()?;

        if self.config.fail_blueprints.iter().any(|b| b == blueprint) {
            return Err(ActorFactoryError::vehicle_spawn(blueprint, "mock failure"));
        }

        let actor_id = self.allocate_actor_id();
        lock(&self.actors).insert(
            actor_id,
            MockActor::Vehicle {
                transform: transform.unwrap_or_default(),
                autopilot,
            },
        );
        self.record(format!("spawn:{blueprint}:{actor_id}"));
        Ok(actor_id)
    }

    #[instrument(
        name = "mock_carla_spawn_sensor",
        skip(self, _transform, _attributes),
        fields(blueprint = %blueprint, parent_id)
    )]
    async fn spawn_sensor(
        &self,
        blueprint: &str,
        _transform: Transform,
        parent_id: ActorId,
        _attributes: &HashMap<String, String>,
    ) -> Result<ActorId> {
        self.ensure_connected()?;

        let mut actors = lock(&self.actors);

        // 验证 parent 存在
        if !matches!(actors.get(&parent_id), Some(MockActor::Vehicle { .. })) {
            return Err(ActorFactoryError::sensor_spawn(
                blueprint,
                format!("actor_{parent_id}"),
                "parent vehicle not found",
            ));
        }

        if self.config.fail_blueprints.iter().any(|b| b == blueprint) {
            return Err(ActorFactoryError::sensor_spawn(
                blueprint,
                format!("actor_{parent_id}"),
                "mock failure",
            ));
        }

        let actor_id = self.allocate_actor_id();
        actors.insert(
            actor_id,
            MockActor::Sensor {
                parent: parent_id,
                tap: SensorTap::new(),
            },
        );
        drop(actors);
        self.record(format!("spawn:{blueprint}:{actor_id}"));
        Ok(actor_id)
    }

    #[instrument(name = "mock_carla_destroy_actor", skip(self), fields(actor_id))]
    async fn destroy_actor(&self, actor_id: ActorId) -> Result<()> {
        if self.config.fail_destroy.contains(&actor_id) {
            return Err(ActorFactoryError::DestroyFailed {
                actor_id,
                message: "mock failure".into(),
            });
        }

        // 幂等：即使不存在也返回 Ok
        let removed = lock(&self.actors).remove(&actor_id);
        if let Some(actor) = removed {
            if let MockActor::Sensor { tap, .. } = actor {
                tap.detach();
            }
            self.record(format!("destroy:{actor_id}"));
        }
        Ok(())
    }

    #[instrument(name = "mock_carla_actor_exists", skip(self), fields(actor_id))]
    async fn actor_exists(&self, actor_id: ActorId) -> Result<bool> {
        Ok(lock(&self.actors).contains_key(&actor_id))
    }

    fn get_sensor_source(
        &self,
        actor_id: ActorId,
        sensor_id: String,
        sensor_type: SensorType,
    ) -> Option<Box<dyn SensorSource>> {
        let actors = lock(&self.actors);
        match actors.get(&actor_id) {
            Some(MockActor::Sensor { tap, .. }) => Some(Box::new(MockSensor::new(
                sensor_id,
                sensor_type,
                self.config.sensor.clone(),
                tap.clone(),
            ))),
            _ => None,
        }
    }
}

impl SimWorld for MockCarlaClient {
    async fn settings(&self) -> std::result::Result<WorldSettings, ContractError> {
        self.ensure_world()?;
        Ok(*lock(&self.settings))
    }

    async fn apply_settings(
        &self,
        settings: WorldSettings,
    ) -> std::result::Result<(), ContractError> {
        self.ensure_world()?;
        *lock(&self.settings) = settings;
        self.record(format!(
            "apply_settings:sync={}",
            settings.synchronous_mode
        ));
        Ok(())
    }

    #[instrument(name = "mock_carla_tick", skip(self))]
    async fn tick(&self) -> std::result::Result<Snapshot, ContractError> {
        self.ensure_world()?;

        let dt = lock(&self.settings)
            .fixed_delta_seconds
            .unwrap_or(VARIABLE_STEP_SECONDS);
        let (snapshot, tick) = {
            let mut clock = lock(&self.clock);
            clock.frame += 1;
            clock.ticks += 1;
            clock.elapsed_seconds += dt;
            (
                Snapshot {
                    frame: clock.frame,
                    elapsed_seconds: clock.elapsed_seconds,
                },
                clock.ticks,
            )
        };

        self.advance_vehicles(dt);
        self.emit_sensor_data(snapshot, tick);
        debug!(frame = snapshot.frame, "mock world ticked");
        Ok(snapshot)
    }
}

impl ActorView for MockCarlaClient {
    async fn actor_transform(
        &self,
        actor_id: ActorId,
    ) -> std::result::Result<Transform, ContractError> {
        self.ensure_world()?;
        let actors = lock(&self.actors);
        match actors.get(&actor_id) {
            Some(MockActor::Vehicle { transform, .. }) => Ok(*transform),
            // 传感器近似为父车辆位姿
            Some(MockActor::Sensor { parent, .. }) => match actors.get(parent) {
                Some(MockActor::Vehicle { transform, .. }) => Ok(*transform),
                _ => Err(ContractError::CarlaActorNotFound { actor_id: *parent }),
            },
            None => Err(ContractError::CarlaActorNotFound { actor_id }),
        }
    }

    async fn set_spectator_transform(
        &self,
        transform: Transform,
    ) -> std::result::Result<(), ContractError> {
        self.ensure_world()?;
        if self.config.fail_spectator {
            return Err(ContractError::carla_world("mock spectator failure"));
        }
        *lock(&self.spectator) = transform;
        Ok(())
    }
}

/// 原始录制脚本使用的出生点
pub fn recorder_spawn_point() -> Transform {
    Transform::new(
        Location {
            x: 230.0,
            y: 55.4,
            z: 0.1,
        },
        contracts::Rotation {
            pitch: 0.0,
            yaw: 180.0,
            roll: 0.0,
        },
    )
}
