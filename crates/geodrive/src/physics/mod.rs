//! Vehicle and aircraft dynamics.
//!
//! Pure functions and state machines that can be tested in isolation, with no
//! dependency on the scene host.

pub mod aircraft;
pub mod collision;
pub mod ground;

pub use aircraft::{AircraftPhysics, AircraftPhysicsConfig, FlightInput, FlightOutput};
pub use collision::{CollisionProbe, ProbeConfig, ProbeResult};
pub use ground::{DriveInput, DriveOutput, VehiclePhysics, VehiclePhysicsConfig};

/// Move `current` toward `target` by at most `max_delta`.
pub fn move_toward(current: f64, target: f64, max_delta: f64) -> f64 {
    let diff = target - current;
    if diff.abs() <= max_delta {
        target
    } else {
        current + diff.signum() * max_delta
    }
}

/// Frame-rate independent exponential smoothing factor for a response rate
/// (1/s) over `dt` seconds.
pub fn smoothing_factor(response: f64, dt: f64) -> f64 {
    1.0 - (-response.max(0.0) * dt).exp()
}

/// Ease `current` toward `target` with an exponential response, moving no
/// more than `max_rate * dt`.
pub fn ease_toward(current: f64, target: f64, response: f64, max_rate: f64, dt: f64) -> f64 {
    let step = (target - current) * smoothing_factor(response, dt);
    let limit = max_rate.max(0.0) * dt;
    current + step.clamp(-limit, limit)
}

/// Sanitize a frame delta: negative or non-finite values become zero.
pub(crate) fn sanitize_dt(dt: f64) -> f64 {
    if dt.is_finite() { dt.max(0.0) } else { 0.0 }
}
