//! Ground vehicle with optional terrain following.

use serde::{Deserialize, Serialize};

use super::{ModelDescriptor, VehicleBody, VehicleId, VehicleState, advance_horizontally};
use crate::geo;
use crate::ground::{GroundSampler, GroundSamplerConfig};
use crate::host::Environment;
use crate::input::{Action, InputState};
use crate::physics::{
    CollisionProbe, DriveInput, ProbeConfig, VehiclePhysics, VehiclePhysicsConfig,
    sanitize_dt, smoothing_factor,
};

/// Configuration for the ground vehicle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CybertruckConfig {
    pub physics: VehiclePhysicsConfig,
    pub probe: ProbeConfig,
    pub sampler: GroundSamplerConfig,
    pub model: ModelDescriptor,
    /// Height kept above the sampled ground (m).
    pub clearance: f64,
    /// Heading only changes above this speed (m/s).
    pub heading_speed_threshold: f64,
    /// Pitch/roll trim easing response (1/s).
    pub attitude_response: f64,
    /// Pitch trim change per unit of manual input (degrees).
    pub pitch_trim_step_deg: f64,
    /// Roll trim change per unit of manual input (degrees).
    pub roll_trim_step_deg: f64,
    /// Start in ground-following mode.
    pub rover_mode: bool,
}

impl Default for CybertruckConfig {
    fn default() -> Self {
        Self {
            physics: VehiclePhysicsConfig::default(),
            probe: ProbeConfig::ground_vehicle(),
            sampler: GroundSamplerConfig::default(),
            model: ModelDescriptor {
                url: "./monster-truck.glb".to_string(),
                scale: 10.0,
            },
            clearance: 0.5,
            heading_speed_threshold: 0.1,
            attitude_response: 3.0,
            pitch_trim_step_deg: 0.8,
            roll_trim_step_deg: 2.5,
            rover_mode: true,
        }
    }
}

/// The player's ground vehicle.
#[derive(Debug)]
pub struct Cybertruck {
    body: VehicleBody,
    config: CybertruckConfig,
    physics: VehiclePhysics,
    sampler: GroundSampler,
    probe: CollisionProbe,
    rover_mode: bool,
    pitch_trim: f64,
    roll_trim: f64,
}

impl Cybertruck {
    pub fn new(
        id: VehicleId,
        config: CybertruckConfig,
        state: VehicleState,
        env: &Environment,
    ) -> Self {
        Self {
            body: VehicleBody::new(id, config.model.clone(), state),
            physics: VehiclePhysics::new(config.physics.clone()),
            sampler: GroundSampler::new(
                config.sampler.clone(),
                env.terrain.clone(),
                env.spawner.clone(),
            ),
            probe: CollisionProbe::new(config.probe.clone()),
            rover_mode: config.rover_mode,
            pitch_trim: 0.0,
            roll_trim: 0.0,
            config,
        }
    }

    pub fn body(&self) -> &VehicleBody {
        &self.body
    }

    pub(super) fn body_mut(&mut self) -> &mut VehicleBody {
        &mut self.body
    }

    pub fn physics(&self) -> &VehiclePhysics {
        &self.physics
    }

    pub fn sampler(&self) -> &GroundSampler {
        &self.sampler
    }

    pub fn rover_mode(&self) -> bool {
        self.rover_mode
    }

    pub fn set_rover_mode(&mut self, enabled: bool) {
        if self.rover_mode != enabled {
            tracing::info!(vehicle = %self.body.id(), enabled, "rover mode changed");
        }
        self.rover_mode = enabled;
    }

    /// Flip between ground-following and free mode. Returns the new mode.
    pub fn toggle_rover_mode(&mut self) -> bool {
        self.set_rover_mode(!self.rover_mode);
        self.rover_mode
    }

    pub fn collision_detection(&self) -> bool {
        self.probe.is_enabled()
    }

    pub fn set_collision_detection(&mut self, enabled: bool) {
        self.probe.set_enabled(enabled);
    }

    /// Flip collision detection. Returns the new state.
    pub fn toggle_collision_detection(&mut self) -> bool {
        let enabled = !self.probe.is_enabled();
        self.probe.set_enabled(enabled);
        tracing::info!(vehicle = %self.body.id(), enabled, "collision detection changed");
        enabled
    }

    /// Nudge the pitch and roll trim the body eases toward.
    ///
    /// Inputs are deltas scaled by the configured trim steps and accumulate
    /// across calls. Teleporting clears the trim.
    pub fn set_pitch_roll_input(&mut self, pitch_delta: f64, roll_delta: f64) {
        if pitch_delta.is_finite() {
            self.pitch_trim += pitch_delta * self.config.pitch_trim_step_deg.to_radians();
        }
        if roll_delta.is_finite() {
            self.roll_trim += roll_delta * self.config.roll_trim_step_deg.to_radians();
        }
    }

    /// Current pitch and roll trim targets (rad).
    pub fn trim(&self) -> (f64, f64) {
        (self.pitch_trim, self.roll_trim)
    }

    pub(super) fn set_state(&mut self, state: VehicleState) {
        *self.body.state_mut() = state;
        self.pitch_trim = 0.0;
        self.roll_trim = 0.0;
        self.physics.reset();
        self.sampler.reset();
    }

    pub(super) fn update(&mut self, dt: f64, input: &InputState, env: &Environment) {
        let dt = sanitize_dt(dt);
        let drive = DriveInput {
            throttle: input.value(Action::Throttle),
            brake: input.value(Action::Brake),
            steering: input.axis(Action::TurnRight, Action::TurnLeft),
        };
        let out = self.physics.update(dt, &drive);

        let mut s = *self.body.state();
        if out.speed > self.config.heading_speed_threshold {
            s.heading = geo::wrap_angle(s.heading + out.yaw_rate * dt);
        }
        s.position = advance_horizontally(s.position, s.heading, out.velocity * dt);

        let exclude = self.body.exclude();
        let baseline = self.sampler.update(dt, s.position, &exclude);
        if self.rover_mode {
            if let Some(ground) = baseline {
                s.position = geo::with_height(s.position, ground + self.config.clearance);
            }
        }

        if let Some(hit) = self
            .probe
            .check(env.terrain.as_ref(), s.position, s.heading, &exclude)
        {
            if hit.obstruction_ahead {
                tracing::debug!(vehicle = %self.body.id(), "obstruction ahead, bouncing back");
                s.position =
                    advance_horizontally(s.position, s.heading, -self.probe.config().bounce_distance);
                self.physics.stop();
            }
            if !self.rover_mode && hit.grounded {
                if let Some(ground) = hit.ground_height {
                    s.position = geo::with_height(s.position, ground + self.config.clearance);
                }
            }
        }

        let k = smoothing_factor(self.config.attitude_response, dt);
        s.pitch += (self.pitch_trim - s.pitch) * k;
        s.roll += (self.roll_trim - s.roll) * k;

        s.velocity = self.physics.velocity();
        s.speed = s.velocity.abs();
        *self.body.state_mut() = s;
    }
}
