//! Vehicle and aircraft simulation on a globe.
//!
//! The crate advances a ground vehicle or an aircraft over ECEF coordinates
//! from player input, follows terrain reported by a host, detects collisions,
//! places a follow camera, and republishes state as events. It has no
//! renderer dependency: the host implements [`host::SceneHost`],
//! [`host::TerrainQuery`] and [`async_runtime::TaskSpawner`] and calls
//! [`Simulation::frame`] once per rendered frame.

pub mod async_runtime;
pub mod bridge;
pub mod camera;
pub mod config;
pub mod constants;
pub mod error;
pub mod game;
pub mod game_loop;
pub mod geo;
pub mod ground;
pub mod host;
pub mod input;
pub mod manager;
pub mod physics;
pub mod vehicle;

pub use async_runtime::{BoxFuture, QueuedSpawner, TaskSpawner};
pub use bridge::{Command, GameBridge, GameEvent, VehicleStateData};
pub use camera::{CameraManager, CameraMode, CameraPlacement};
pub use config::SimConfig;
pub use error::{Error, Result};
pub use game::Simulation;
pub use game_loop::{GameLoop, Updatable};
pub use geo::{EnuFrame, Geodetic};
pub use ground::{GroundSample, GroundSampler};
pub use host::{Environment, ModelHandle, ModelRequest, SceneHost, TerrainQuery};
pub use input::{Action, InputManager, InputState};
pub use manager::{ActiveVehicle, ActiveVehicleView, VehicleManager};
pub use vehicle::{Vehicle, VehicleId, VehicleKind, VehicleState};
