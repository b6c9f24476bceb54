//! Bevy host for the geodrive simulation.
//!
//! Provides the scene, terrain and task-spawning services the simulation
//! core needs, forwards keyboard input into it and mirrors its vehicles and
//! camera into the ECS.

pub mod async_runtime;
pub mod floating_origin;
pub mod launch_params;
pub mod mesh;
pub mod sim;
pub mod telemetry;
pub mod terrain;
