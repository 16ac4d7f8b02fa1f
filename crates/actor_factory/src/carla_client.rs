//! Real CARLA client implementation
//!
//! Connects to CARLA server using carla-rust crate.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use carla::client::{ActorBase, Client, Sensor, Vehicle, World};
use carla::geom::{Location, Rotation, Transform as CarlaTransform};
use contracts::{
    ActorId, ActorView, ContractError, SensorSource, SensorType, SimWorld, Snapshot, Transform,
    WorldSettings,
};
use tracing::{debug, info, instrument, warn};

use crate::carla_sensor_source::CarlaSensorSource;
use crate::client::CarlaClient;
use crate::error::{ActorFactoryError, Result};

/// Real CARLA client
///
/// Wraps carla-rust's Client, implements CarlaClient trait.
/// Uses Mutex for interior mutability, allowing `&self` methods to modify World.
#[derive(Default, Clone)]
pub struct RealCarlaClient {
    /// CARLA client
    client: Arc<Mutex<Option<Client>>>,
    /// World reference (uses Mutex for interior mutability)
    world: Arc<Mutex<Option<World>>>,
    /// Settings apply timeout
    timeout: Duration,
    /// Created actors list (for teardown)
    actors: Arc<Mutex<HashMap<ActorId, ActorType>>>,
}

/// Actor type enumeration
#[derive(Clone)]
enum ActorType {
    Vehicle(Vehicle),
    Sensor(Sensor),
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RealCarlaClient {
    /// Create new client (disconnected state)
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            ..Default::default()
        }
    }

    /// Access World with mutable reference, ensuring connected
    fn with_world_mut<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut World) -> Result<R>,
    {
        let mut world_guard = lock(&self.world);
        let world = world_guard
            .as_mut()
            .ok_or_else(|| ActorFactoryError::connection("not connected to CARLA server"))?;
        f(world)
    }

    /// Same as `with_world_mut`, for world-level contract operations
    fn with_world<R, F>(&self, f: F) -> std::result::Result<R, ContractError>
    where
        F: FnOnce(&mut World) -> std::result::Result<R, ContractError>,
    {
        let mut world_guard = lock(&self.world);
        let world = world_guard.as_mut().ok_or_else(|| ContractError::CarlaConnection {
            message: "not connected to CARLA server".into(),
        })?;
        f(world)
    }

    /// Save actor to registry for teardown
    fn store_actor(&self, actor_id: ActorId, actor: ActorType) {
        lock(&self.actors).insert(actor_id, actor);
    }

    fn select_vehicle_transform(
        world: &mut World,
        blueprint: &str,
        transform: Option<Transform>,
    ) -> Result<CarlaTransform> {
        if let Some(transform) = transform {
            return Ok(to_carla_transform(transform));
        }
        let transform = world
            .map()
            .recommended_spawn_points()
            .get(0)
            .cloned()
            .ok_or_else(|| {
                ActorFactoryError::vehicle_spawn(blueprint, "no recommended spawn points")
            })?;
        info!(vehicle_blueprint = blueprint, point = ?transform.location, "using default spawn point");
        Ok(transform)
    }

    fn create_vehicle(
        world: &mut World,
        blueprint: &str,
        transform: Option<Transform>,
    ) -> Result<Vehicle> {
        let bp_library = world.blueprint_library();
        let vehicle_bp = bp_library.find(blueprint).ok_or_else(|| {
            ActorFactoryError::vehicle_spawn(blueprint, format!("blueprint '{blueprint}' not found"))
        })?;

        let carla_transform = Self::select_vehicle_transform(world, blueprint, transform)?;
        let actor = world
            .spawn_actor(&vehicle_bp, &carla_transform)
            .map_err(|e| ActorFactoryError::vehicle_spawn(blueprint, e.to_string()))?;

        Vehicle::try_from(actor).map_err(|_| {
            ActorFactoryError::vehicle_spawn(blueprint, "spawned actor is not a vehicle")
        })
    }

    fn parent_vehicle_for_sensor(
        &self,
        sensor_blueprint: &str,
        parent_id: ActorId,
    ) -> Result<Vehicle> {
        match lock(&self.actors).get(&parent_id) {
            Some(ActorType::Vehicle(v)) => Ok(v.clone()),
            _ => Err(ActorFactoryError::sensor_spawn(
                sensor_blueprint,
                format!("actor_{parent_id}"),
                "parent vehicle not found",
            )),
        }
    }

    fn create_sensor(
        world: &mut World,
        blueprint: &str,
        transform: Transform,
        parent_actor: &Vehicle,
        parent_id: ActorId,
        attributes: &HashMap<String, String>,
    ) -> Result<Sensor> {
        let bp_library = world.blueprint_library();
        let mut sensor_bp = bp_library.find(blueprint).ok_or_else(|| {
            ActorFactoryError::sensor_spawn(
                blueprint,
                format!("actor_{parent_id}"),
                format!("blueprint '{blueprint}' not found"),
            )
        })?;

        for (key, value) in attributes {
            if !sensor_bp.set_attribute(key, value) {
                warn!(key, value, "failed to set sensor attribute");
            }
        }

        let actor = world
            .spawn_actor_attached(
                &sensor_bp,
                &to_carla_transform(transform),
                parent_actor,
                None,
            )
            .map_err(|e| {
                ActorFactoryError::sensor_spawn(blueprint, format!("actor_{parent_id}"), e.to_string())
            })?;

        Sensor::try_from(actor).map_err(|_| {
            ActorFactoryError::sensor_spawn(
                blueprint,
                format!("actor_{parent_id}"),
                "spawned actor is not a sensor",
            )
        })
    }

    fn destroy_vehicle_actor(vehicle: Vehicle, actor_id: ActorId) {
        if !vehicle.destroy() {
            warn!(actor_id, "destroy vehicle returned false");
        }
    }

    fn destroy_sensor_actor(sensor: Sensor, actor_id: ActorId) {
        if sensor.is_listening() {
            sensor.stop();
        }
        if !sensor.destroy() {
            warn!(actor_id, "destroy sensor returned false");
        }
    }

    /// Get underlying CARLA Sensor object
    pub fn get_sensor(&self, actor_id: ActorId) -> Option<Sensor> {
        match lock(&self.actors).get(&actor_id) {
            Some(ActorType::Sensor(sensor)) => Some(sensor.clone()),
            _ => None,
        }
    }
}

/// Convert internal Transform to CARLA Transform
fn to_carla_transform(transform: Transform) -> CarlaTransform {
    let location = Location {
        x: transform.location.x as f32,
        y: transform.location.y as f32,
        z: transform.location.z as f32,
    };
    let rotation = Rotation {
        pitch: transform.rotation.pitch as f32,
        yaw: transform.rotation.yaw as f32,
        roll: transform.rotation.roll as f32,
    };
    CarlaTransform { location, rotation }
}

/// Convert CARLA Transform to internal Transform
fn from_carla_transform(transform: &CarlaTransform) -> Transform {
    Transform::new(
        contracts::Location {
            x: transform.location.x as f64,
            y: transform.location.y as f64,
            z: transform.location.z as f64,
        },
        contracts::Rotation {
            pitch: transform.rotation.pitch as f64,
            yaw: transform.rotation.yaw as f64,
            roll: transform.rotation.roll as f64,
        },
    )
}

impl CarlaClient for RealCarlaClient {
    #[instrument(name = "real_carla_connect", skip(self, timeout), fields(host = %host, port))]
    async fn connect(&mut self, host: &str, port: u16, timeout: Duration) -> Result<()> {
        let mut client = Client::connect(host, port, None);
        client.set_timeout(timeout);
        let world = client.world();

        info!(
            map = %world.map().name(),
            "connected to CARLA server"
        );

        self.timeout = timeout;
        *lock(&self.client) = Some(client);
        *lock(&self.world) = Some(world);

        Ok(())
    }

    async fn current_map(&self) -> Result<String> {
        self.with_world_mut(|world| Ok(world.map().name().to_string()))
    }

    #[instrument(name = "real_carla_load_map", skip(self), fields(map = %map))]
    async fn load_map(&self, map: &str) -> Result<()> {
        let world = {
            let mut client_guard = lock(&self.client);
            let client = client_guard
                .as_mut()
                .ok_or_else(|| ActorFactoryError::connection("not connected to CARLA server"))?;
            client.load_world(map)
        };
        // 旧 episode 的 actor 句柄全部失效
        lock(&self.actors).clear();
        *lock(&self.world) = Some(world);
        info!("map loaded");
        Ok(())
    }

    #[instrument(
        name = "real_carla_spawn_vehicle",
        skip(self, transform),
        fields(blueprint = %blueprint, autopilot)
    )]
    async fn spawn_vehicle(
        &self,
        blueprint: &str,
        transform: Option<Transform>,
        autopilot: bool,
    ) -> Result<ActorId> {
        let vehicle =
            self.with_world_mut(|world| Self::create_vehicle(world, blueprint, transform))?;
        let actor_id = vehicle.id();

        if autopilot {
            vehicle.set_autopilot(true);
            info!(actor_id, "autopilot enabled for vehicle");
        }
        debug!(actor_id, blueprint, "vehicle spawned");
        self.store_actor(actor_id, ActorType::Vehicle(vehicle));

        Ok(actor_id)
    }

    #[instrument(
        name = "real_carla_spawn_sensor",
        skip(self, transform, attributes),
        fields(blueprint = %blueprint, parent_id)
    )]
    async fn spawn_sensor(
        &self,
        blueprint: &str,
        transform: Transform,
        parent_id: ActorId,
        attributes: &HashMap<String, String>,
    ) -> Result<ActorId> {
        let parent_actor = self.parent_vehicle_for_sensor(blueprint, parent_id)?;
        let sensor = self.with_world_mut(|world| {
            Self::create_sensor(
                world,
                blueprint,
                transform,
                &parent_actor,
                parent_id,
                attributes,
            )
        })?;

        let actor_id = sensor.id();

        debug!(actor_id, blueprint, parent_id, "sensor spawned and attached");
        self.store_actor(actor_id, ActorType::Sensor(sensor));

        Ok(actor_id)
    }

    #[instrument(name = "real_carla_destroy_actor", skip(self), fields(actor_id))]
    async fn destroy_actor(&self, actor_id: ActorId) -> Result<()> {
        let removed = lock(&self.actors).remove(&actor_id);

        if let Some(actor) = removed {
            match actor {
                ActorType::Vehicle(v) => Self::destroy_vehicle_actor(v, actor_id),
                ActorType::Sensor(s) => Self::destroy_sensor_actor(s, actor_id),
            }
            debug!(actor_id, "actor destroyed");
        }

        // Idempotent: return Ok even if not exists
        Ok(())
    }

    #[instrument(name = "real_carla_actor_exists", skip(self), fields(actor_id))]
    async fn actor_exists(&self, actor_id: ActorId) -> Result<bool> {
        Ok(lock(&self.actors).contains_key(&actor_id))
    }

    fn get_sensor_source(
        &self,
        actor_id: ActorId,
        sensor_id: String,
        sensor_type: SensorType,
    ) -> Option<Box<dyn SensorSource>> {
        let sensor = self.get_sensor(actor_id)?;
        Some(Box::new(CarlaSensorSource::new(
            sensor_id,
            sensor_type,
            sensor,
        )))
    }
}

impl SimWorld for RealCarlaClient {
    async fn settings(&self) -> std::result::Result<WorldSettings, ContractError> {
        self.with_world(|world| {
            let settings = world.settings();
            Ok(WorldSettings {
                synchronous_mode: settings.synchronous_mode,
                fixed_delta_seconds: settings.fixed_delta_seconds,
            })
        })
    }

    #[instrument(name = "real_carla_apply_settings", skip(self), fields(sync = settings.synchronous_mode))]
    async fn apply_settings(
        &self,
        settings: WorldSettings,
    ) -> std::result::Result<(), ContractError> {
        let timeout = self.timeout;
        self.with_world(|world| {
            let mut episode = world.settings();
            episode.synchronous_mode = settings.synchronous_mode;
            episode.fixed_delta_seconds = settings.fixed_delta_seconds;
            world.apply_settings(&episode, timeout);
            Ok(())
        })
    }

    async fn tick(&self) -> std::result::Result<Snapshot, ContractError> {
        self.with_world(|world| {
            let frame = world.tick();
            let snapshot = world.snapshot();
            Ok(Snapshot {
                frame: frame as u64,
                elapsed_seconds: snapshot.timestamp().elapsed_seconds,
            })
        })
    }
}

impl ActorView for RealCarlaClient {
    async fn actor_transform(
        &self,
        actor_id: ActorId,
    ) -> std::result::Result<Transform, ContractError> {
        let transform = match lock(&self.actors).get(&actor_id) {
            Some(ActorType::Vehicle(v)) => v.transform(),
            Some(ActorType::Sensor(s)) => s.transform(),
            None => return Err(ContractError::CarlaActorNotFound { actor_id }),
        };
        Ok(from_carla_transform(&transform))
    }

    async fn set_spectator_transform(
        &self,
        transform: Transform,
    ) -> std::result::Result<(), ContractError> {
        self.with_world(|world| {
            world.spectator().set_transform(&to_carla_transform(transform));
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    // Real client tests require CARLA server running
    // These tests are marked as ignore, only run when server is available

    use super::*;

    #[tokio::test]
    #[ignore = "requires CARLA server"]
    async fn test_real_client_connect() {
        let mut client = RealCarlaClient::new();
        client
            .connect("localhost", 2000, Duration::from_secs(2))
            .await
            .unwrap();
        assert!(!client.current_map().await.unwrap().is_empty());
    }

    #[test]
    fn transform_conversion_keeps_fields() {
        let tf = Transform::new(
            contracts::Location {
                x: 230.0,
                y: 55.5,
                z: 0.5,
            },
            contracts::Rotation {
                pitch: 0.0,
                yaw: 180.0,
                roll: 0.0,
            },
        );
        let back = from_carla_transform(&to_carla_transform(tf));
        assert_eq!(back, tf);
    }
}
