//! Vehicles: shared state, model lifecycle and per-kind dispatch.

mod aircraft;
mod cybertruck;

use std::fmt;

use glam::{DMat4, DVec3};
use serde::{Deserialize, Serialize};

pub use aircraft::{Aircraft, AircraftConfig};
pub use cybertruck::{Cybertruck, CybertruckConfig};

use crate::error::{Error, Result};
use crate::geo::{self, Geodetic};
use crate::host::{Environment, ModelHandle, ModelRequest};
use crate::input::InputState;

// ============================================================================
// Identity
// ============================================================================

/// Unique vehicle identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VehicleId(pub String);

impl VehicleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VehicleId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// The closed set of vehicle kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VehicleKind {
    Car,
    Aircraft,
}

impl fmt::Display for VehicleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VehicleKind::Car => f.write_str("car"),
            VehicleKind::Aircraft => f.write_str("aircraft"),
        }
    }
}

// ============================================================================
// State
// ============================================================================

/// Complete, serializable snapshot of a vehicle's kinematic state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleState {
    /// ECEF position (m).
    pub position: DVec3,
    /// Heading clockwise from north (rad).
    pub heading: f64,
    /// Pitch, nose up positive (rad).
    pub pitch: f64,
    /// Roll, right wing down positive (rad).
    pub roll: f64,
    /// Signed forward velocity (m/s).
    pub velocity: f64,
    /// Absolute speed (m/s).
    pub speed: f64,
}

impl VehicleState {
    /// Stationary, level state at a position.
    pub fn at(position: DVec3, heading: f64) -> Self {
        Self {
            position,
            heading,
            ..Default::default()
        }
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite()
            && self.heading.is_finite()
            && self.pitch.is_finite()
            && self.roll.is_finite()
            && self.velocity.is_finite()
            && self.speed.is_finite()
    }

    pub fn geodetic(&self) -> Geodetic {
        geo::ecef_to_geodetic(self.position)
    }
}

/// Model to load for a vehicle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelDescriptor {
    pub url: String,
    pub scale: f64,
}

impl Default for ModelDescriptor {
    fn default() -> Self {
        Self {
            url: String::new(),
            scale: 1.0,
        }
    }
}

/// Model loading progress.
#[derive(Debug)]
enum ModelStatus {
    Unloaded,
    Loading(async_channel::Receiver<Result<ModelHandle>>),
    Ready(ModelHandle),
    Failed(Error),
}

/// State and model lifecycle shared by every vehicle kind.
#[derive(Debug)]
pub struct VehicleBody {
    id: VehicleId,
    model: ModelDescriptor,
    status: ModelStatus,
    state: VehicleState,
}

impl VehicleBody {
    pub fn new(id: VehicleId, model: ModelDescriptor, state: VehicleState) -> Self {
        Self {
            id,
            model,
            status: ModelStatus::Unloaded,
            state,
        }
    }

    pub fn id(&self) -> &VehicleId {
        &self.id
    }

    pub fn state(&self) -> &VehicleState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut VehicleState {
        &mut self.state
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.status, ModelStatus::Ready(_))
    }

    /// Load failure, if the model could not be loaded.
    pub fn load_error(&self) -> Option<&Error> {
        match &self.status {
            ModelStatus::Failed(e) => Some(e),
            _ => None,
        }
    }

    pub fn model_handle(&self) -> Option<ModelHandle> {
        match self.status {
            ModelStatus::Ready(handle) => Some(handle),
            _ => None,
        }
    }

    /// Models a terrain query must ignore so the vehicle never hits itself.
    pub fn exclude(&self) -> Vec<ModelHandle> {
        self.model_handle().into_iter().collect()
    }

    /// Start loading the model. The vehicle becomes ready once a later
    /// [`VehicleBody::poll_ready`] observes the result.
    pub fn initialize(&mut self, env: &Environment) {
        if !matches!(self.status, ModelStatus::Unloaded) {
            return;
        }
        let request = ModelRequest {
            url: self.model.url.clone(),
            scale: self.model.scale,
            position: self.state.position,
            heading: self.state.heading,
        };
        let load = env.scene.load_model(request);
        let (tx, rx) = async_channel::bounded(1);
        env.spawner.spawn(Box::pin(async move {
            let result = load.await;
            let _ = tx.send(result).await;
        }));
        self.status = ModelStatus::Loading(rx);
    }

    /// Check for a finished model load. Returns the ready flag.
    pub fn poll_ready(&mut self) -> bool {
        let ModelStatus::Loading(rx) = &self.status else {
            return self.is_ready();
        };
        match rx.try_recv() {
            Ok(Ok(handle)) => {
                tracing::info!(vehicle = %self.id, url = %self.model.url, "vehicle model ready");
                self.status = ModelStatus::Ready(handle);
            }
            Ok(Err(e)) => {
                tracing::warn!(vehicle = %self.id, "vehicle model failed to load: {e}");
                self.status = ModelStatus::Failed(e);
            }
            Err(async_channel::TryRecvError::Empty) => {}
            Err(async_channel::TryRecvError::Closed) => {
                let e = Error::ModelLoad {
                    url: self.model.url.clone(),
                    message: "load task dropped".to_string(),
                };
                tracing::warn!(vehicle = %self.id, "vehicle model failed to load: {e}");
                self.status = ModelStatus::Failed(e);
            }
        }
        self.is_ready()
    }

    /// Release host resources. The vehicle is unready afterwards.
    ///
    /// A model still loading is released as soon as the load finishes.
    pub fn destroy(&mut self, env: &Environment) {
        match std::mem::replace(&mut self.status, ModelStatus::Unloaded) {
            ModelStatus::Ready(handle) => env.scene.release_model(handle),
            ModelStatus::Loading(rx) => {
                let scene = env.scene.clone();
                env.spawner.spawn(Box::pin(async move {
                    if let Ok(Ok(handle)) = rx.recv().await {
                        scene.release_model(handle);
                    }
                }));
            }
            ModelStatus::Unloaded | ModelStatus::Failed(_) => {}
        }
    }
}

// ============================================================================
// Vehicle
// ============================================================================

/// A simulated vehicle.
#[derive(Debug)]
pub enum Vehicle {
    Car(Cybertruck),
    Aircraft(Aircraft),
}

impl Vehicle {
    pub fn body(&self) -> &VehicleBody {
        match self {
            Vehicle::Car(car) => car.body(),
            Vehicle::Aircraft(aircraft) => aircraft.body(),
        }
    }

    fn body_mut(&mut self) -> &mut VehicleBody {
        match self {
            Vehicle::Car(car) => car.body_mut(),
            Vehicle::Aircraft(aircraft) => aircraft.body_mut(),
        }
    }

    pub fn id(&self) -> &VehicleId {
        self.body().id()
    }

    pub fn kind(&self) -> VehicleKind {
        match self {
            Vehicle::Car(_) => VehicleKind::Car,
            Vehicle::Aircraft(_) => VehicleKind::Aircraft,
        }
    }

    pub fn initialize(&mut self, env: &Environment) {
        self.body_mut().initialize(env);
    }

    pub fn poll_ready(&mut self) -> bool {
        self.body_mut().poll_ready()
    }

    pub fn is_ready(&self) -> bool {
        self.body().is_ready()
    }

    /// Advance one tick. Unready vehicles do not move.
    ///
    /// A tick that would leave a non-finite state is rolled back and reported.
    pub fn update(&mut self, dt: f64, input: &InputState, env: &Environment) -> Result<()> {
        if !self.is_ready() {
            return Ok(());
        }
        let before = *self.state();
        match self {
            Vehicle::Car(car) => car.update(dt, input, env),
            Vehicle::Aircraft(aircraft) => aircraft.update(dt, input, env),
        }
        if self.state().is_finite() {
            Ok(())
        } else {
            let id = self.id().clone();
            self.set_state(before);
            Err(Error::NonFiniteState { id })
        }
    }

    pub fn state(&self) -> &VehicleState {
        self.body().state()
    }

    /// Replace the kinematic state and reset the physics to match it.
    pub fn set_state(&mut self, state: VehicleState) {
        match self {
            Vehicle::Car(car) => car.set_state(state),
            Vehicle::Aircraft(aircraft) => aircraft.set_state(state),
        }
    }

    /// Release host resources.
    pub fn destroy(&mut self, env: &Environment) {
        self.body_mut().destroy(env);
    }

    /// Model-to-world transform for the render host.
    pub fn model_matrix(&self) -> DMat4 {
        let s = self.state();
        geo::model_matrix(s.position, s.heading, s.pitch, s.roll)
    }

    pub fn collision_enabled(&self) -> bool {
        match self {
            Vehicle::Car(car) => car.collision_detection(),
            Vehicle::Aircraft(aircraft) => aircraft.collision_detection(),
        }
    }

    pub fn set_collision_enabled(&mut self, enabled: bool) {
        match self {
            Vehicle::Car(car) => car.set_collision_detection(enabled),
            Vehicle::Aircraft(aircraft) => aircraft.set_collision_detection(enabled),
        }
    }

    /// Ground-following flag. Aircraft never follow the ground.
    pub fn rover_mode(&self) -> bool {
        match self {
            Vehicle::Car(car) => car.rover_mode(),
            Vehicle::Aircraft(_) => false,
        }
    }

    pub fn is_crashed(&self) -> bool {
        match self {
            Vehicle::Car(_) => false,
            Vehicle::Aircraft(aircraft) => aircraft.is_crashed(),
        }
    }

    /// Last accepted ground height, for ground vehicles.
    pub fn baseline(&self) -> Option<f64> {
        match self {
            Vehicle::Car(car) => car.sampler().baseline(),
            Vehicle::Aircraft(_) => None,
        }
    }

    pub fn as_car_mut(&mut self) -> Option<&mut Cybertruck> {
        match self {
            Vehicle::Car(car) => Some(car),
            Vehicle::Aircraft(_) => None,
        }
    }

    pub fn as_aircraft_mut(&mut self) -> Option<&mut Aircraft> {
        match self {
            Vehicle::Aircraft(aircraft) => Some(aircraft),
            Vehicle::Car(_) => None,
        }
    }
}

impl From<Cybertruck> for Vehicle {
    fn from(car: Cybertruck) -> Self {
        Vehicle::Car(car)
    }
}

impl From<Aircraft> for Vehicle {
    fn from(aircraft: Aircraft) -> Self {
        Vehicle::Aircraft(aircraft)
    }
}

/// Move `position` horizontally by `distance` along `heading`, keeping its
/// height above the ellipsoid.
pub(crate) fn advance_horizontally(position: DVec3, heading: f64, distance: f64) -> DVec3 {
    if distance == 0.0 {
        return position;
    }
    let height = geo::height_of(position);
    let frame = geo::EnuFrame::from_ecef(position);
    geo::with_height(frame.to_world(geo::heading_to_local(heading) * distance), height)
}
