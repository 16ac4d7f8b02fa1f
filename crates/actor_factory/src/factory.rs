//! ActorFactory 核心实现
//!
//! 从 CaptureBlueprint spawn actors，管理生命周期。

use contracts::{ActorId, RuntimeGraph, SensorConfig, SensorSource, VehicleConfig};
use tracing::{error, info, instrument, warn};

use crate::client::CarlaClient;
use crate::error::{ActorFactoryError, Result};

/// Actor Factory
///
/// 负责加载地图、从 VehicleConfig spawn 车辆和传感器，
/// 并提供 teardown 和回滚能力。
pub struct ActorFactory<C: CarlaClient> {
    client: C,
}

impl<C: CarlaClient> ActorFactory<C> {
    /// 创建新的 ActorFactory
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// 底层客户端 (世界控制 / 位姿读取)
    pub fn client(&self) -> &C {
        &self.client
    }

    /// 确保目标地图处于激活状态
    ///
    /// 当请求的地图名以当前地图名结尾时 (e.g. `/Game/Carla/Maps/Town01` 与
    /// `Carla/Maps/Town01`) 不做任何事。返回是否真的加载了地图。
    #[instrument(name = "actor_factory_ensure_map", skip(self), fields(map = %map))]
    pub async fn ensure_map(&self, map: &str) -> Result<bool> {
        let current = self.client.current_map().await?;
        if map_is_active(map, &current) {
            info!(current = %current, "map already active");
            return Ok(false);
        }

        info!(current = %current, "loading map");
        self.client.load_map(map).await.map_err(|e| match e {
            e @ ActorFactoryError::MapLoadFailed { .. } => e,
            other => ActorFactoryError::map_load(map, other.to_string()),
        })?;
        Ok(true)
    }

    /// Spawn 车辆及其所有传感器
    ///
    /// # 原子性保证
    /// 如果任何 spawn 失败，会按逆序销毁所有已创建的 actors 后返回错误。
    #[instrument(
        name = "actor_factory_spawn_vehicle_with_sensors",
        skip(self, config),
        fields(vehicle_id = %config.id, sensor_count = config.sensors.len())
    )]
    pub async fn spawn_vehicle_with_sensors(&self, config: &VehicleConfig) -> Result<RuntimeGraph> {
        let mut graph = RuntimeGraph::new();

        let vehicle_actor_id = self.spawn_vehicle_actor(config).await?;
        graph.register_vehicle(config.id.clone(), vehicle_actor_id);

        for sensor_config in &config.sensors {
            match self
                .spawn_sensor_actor(vehicle_actor_id, config, sensor_config)
                .await
            {
                Ok(sensor_actor_id) => {
                    graph.register_sensor(sensor_config.id.clone(), sensor_actor_id);
                }
                Err(e) => {
                    // 回滚该 vehicle 的所有 sensors 和 vehicle 本身
                    warn!(
                        sensor_id = %sensor_config.id,
                        vehicle_id = %config.id,
                        error = %e,
                        "sensor spawn failed, rolling back"
                    );
                    self.teardown(&graph).await;
                    return Err(e);
                }
            }
        }

        info!(
            vehicle_actor_id,
            sensors = graph.sensors.len(),
            "vehicle and sensors spawned successfully"
        );

        Ok(graph)
    }

    /// 为 RuntimeGraph 中的每个传感器获取数据源，顺序与 spawn 顺序一致
    pub fn sensor_sources(
        &self,
        graph: &RuntimeGraph,
        configs: &[SensorConfig],
    ) -> Result<Vec<Box<dyn SensorSource>>> {
        graph
            .sensors
            .iter()
            .map(|spawned| {
                let config = configs
                    .iter()
                    .find(|c| c.id == spawned.config_id)
                    .ok_or_else(|| {
                        ActorFactoryError::sensor_spawn(
                            spawned.config_id.clone(),
                            "unknown",
                            "sensor missing from configuration",
                        )
                    })?;
                self.client
                    .get_sensor_source(spawned.actor_id, config.id.clone(), config.sensor_type)
                    .ok_or_else(|| {
                        ActorFactoryError::sensor_spawn(
                            config.id.clone(),
                            "unknown",
                            format!("actor {} is not a live sensor", spawned.actor_id),
                        )
                    })
            })
            .collect()
    }

    /// 销毁 RuntimeGraph 中的所有 actors
    ///
    /// 顺序：传感器 (spawn 逆序)，最后是车辆。
    ///
    /// # 幂等性
    /// 多次调用安全，不存在的 actor 会被忽略；单个 actor 销毁失败只记录日志，
    /// 不影响其余 actor 的销毁。
    #[instrument(
        name = "actor_factory_teardown",
        skip(self, graph),
        fields(actor_count = graph.len())
    )]
    pub async fn teardown(&self, graph: &RuntimeGraph) {
        info!("starting teardown");

        for actor in graph.teardown_order() {
            self.destroy_actor_safe(actor.actor_id, &actor.config_id)
                .await;
        }

        info!("teardown completed");
    }

    /// 安全销毁 actor（忽略错误，仅记录日志）
    #[instrument(
        name = "actor_factory_destroy_actor",
        skip(self, config_id),
        fields(actor_id, config_id = %config_id)
    )]
    async fn destroy_actor_safe(&self, actor_id: ActorId, config_id: &str) {
        info!(actor_id, config_id, "destroying actor");

        if let Err(e) = self.client.destroy_actor(actor_id).await {
            error!(
                actor_id,
                config_id,
                error = %e,
                "failed to destroy actor"
            );
        }
    }

    #[instrument(
        name = "actor_factory_spawn_vehicle_actor",
        skip(self, config),
        fields(vehicle_id = %config.id)
    )]
    async fn spawn_vehicle_actor(&self, config: &VehicleConfig) -> Result<ActorId> {
        info!(blueprint = %config.blueprint, autopilot = config.autopilot, "spawning vehicle");
        let actor_id = self
            .client
            .spawn_vehicle(&config.blueprint, config.spawn_point, config.autopilot)
            .await
            .map_err(|e| ActorFactoryError::vehicle_spawn(config.id.clone(), e.to_string()))?;

        info!(actor_id, "vehicle spawned successfully");
        Ok(actor_id)
    }

    #[instrument(
        name = "actor_factory_spawn_sensor_actor",
        skip(self, vehicle_config, sensor_config),
        fields(sensor_id = %sensor_config.id, vehicle_id = %vehicle_config.id)
    )]
    async fn spawn_sensor_actor(
        &self,
        vehicle_actor_id: ActorId,
        vehicle_config: &VehicleConfig,
        sensor_config: &SensorConfig,
    ) -> Result<ActorId> {
        info!(sensor_type = ?sensor_config.sensor_type, "spawning sensor");

        self.client
            .spawn_sensor(
                sensor_config.sensor_type.blueprint(),
                sensor_config.transform,
                vehicle_actor_id,
                &sensor_config.attributes,
            )
            .await
            .map_err(|e| {
                ActorFactoryError::sensor_spawn(
                    sensor_config.id.clone(),
                    vehicle_config.id.clone(),
                    e.to_string(),
                )
            })
            .inspect(|&actor_id| {
                info!(actor_id, "sensor spawned and attached successfully");
            })
    }
}

/// 请求的地图名是否以当前地图名结尾 (当前名为空时视为未加载)
fn map_is_active(requested: &str, current: &str) -> bool {
    !current.is_empty() && requested.ends_with(current)
}
