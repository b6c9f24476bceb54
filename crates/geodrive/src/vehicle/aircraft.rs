//! Aircraft with a terminal crash state.

use serde::{Deserialize, Serialize};

use super::{ModelDescriptor, VehicleBody, VehicleId, VehicleState, advance_horizontally};
use crate::geo;
use crate::host::Environment;
use crate::input::{Action, InputState};
use crate::physics::{
    AircraftPhysics, AircraftPhysicsConfig, CollisionProbe, FlightInput, ProbeConfig,
};

/// Configuration for the aircraft.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AircraftConfig {
    pub physics: AircraftPhysicsConfig,
    pub probe: ProbeConfig,
    pub model: ModelDescriptor,
}

impl Default for AircraftConfig {
    fn default() -> Self {
        Self {
            physics: AircraftPhysicsConfig::default(),
            probe: ProbeConfig::aircraft(),
            model: ModelDescriptor {
                url: "./aircraft.glb".to_string(),
                scale: 1.0,
            },
        }
    }
}

/// The player's aircraft.
#[derive(Debug)]
pub struct Aircraft {
    body: VehicleBody,
    physics: AircraftPhysics,
    probe: CollisionProbe,
    crashed: bool,
}

impl Aircraft {
    pub fn new(id: VehicleId, config: AircraftConfig, state: VehicleState) -> Self {
        Self {
            body: VehicleBody::new(id, config.model, state),
            physics: AircraftPhysics::new(config.physics),
            probe: CollisionProbe::new(config.probe),
            crashed: false,
        }
    }

    pub fn body(&self) -> &VehicleBody {
        &self.body
    }

    pub(super) fn body_mut(&mut self) -> &mut VehicleBody {
        &mut self.body
    }

    pub fn physics(&self) -> &AircraftPhysics {
        &self.physics
    }

    pub fn is_crashed(&self) -> bool {
        self.crashed
    }

    /// Clear the crash latch and return to level flight at minimum speed.
    pub fn reset_crash(&mut self) {
        if self.crashed {
            tracing::info!(vehicle = %self.body.id(), "crash reset");
        }
        self.crashed = false;
        self.physics.reset();
    }

    pub fn collision_detection(&self) -> bool {
        self.probe.is_enabled()
    }

    pub fn set_collision_detection(&mut self, enabled: bool) {
        self.probe.set_enabled(enabled);
    }

    pub(super) fn set_state(&mut self, state: VehicleState) {
        *self.body.state_mut() = state;
        self.physics.reset();
    }

    pub(super) fn update(&mut self, dt: f64, input: &InputState, env: &Environment) {
        if self.crashed {
            return;
        }

        let controls = FlightInput {
            throttle: input.value(Action::Throttle),
            brake: input.value(Action::Brake),
            turn: input.axis(Action::TurnRight, Action::TurnLeft),
            roll: input.axis(Action::RollRight, Action::RollLeft),
            climb: input.axis(Action::Climb, Action::Descend),
        };
        let out = self.physics.update(dt, &controls);

        let mut s = *self.body.state();
        s.heading = geo::wrap_angle(s.heading + out.yaw_rate * crate::physics::sanitize_dt(dt));
        s.position = advance_horizontally(s.position, s.heading, out.forward_distance);
        if out.vertical_distance != 0.0 {
            let up = geo::EnuFrame::from_ecef(s.position).up;
            s.position += up * out.vertical_distance;
        }
        s.pitch = out.pitch;
        s.roll = out.roll;
        s.velocity = out.speed;
        s.speed = out.speed;

        let exclude = self.body.exclude();
        if let Some(hit) = self
            .probe
            .check(env.terrain.as_ref(), s.position, s.heading, &exclude)
        {
            if hit.any() {
                tracing::warn!(
                    vehicle = %self.body.id(),
                    grounded = hit.grounded,
                    obstruction = hit.obstruction_ahead,
                    "aircraft crashed"
                );
                self.crashed = true;
                s.velocity = 0.0;
                s.speed = 0.0;
            }
        }

        *self.body.state_mut() = s;
    }
}
