//! Arcade aircraft dynamics.
//!
//! Speed, bank, climb and pitch each ease toward targets derived from input.
//! Pitch is cosmetic: vertical motion comes from the vertical velocity alone,
//! and forward motion always follows the horizontal heading.

use serde::{Deserialize, Serialize};

use super::{ease_toward, move_toward, sanitize_dt};

/// Tuning constants for the aircraft.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AircraftPhysicsConfig {
    /// Minimum airspeed (m/s). The aircraft never flies slower.
    pub min_speed: f64,
    /// Maximum airspeed (m/s).
    pub max_speed: f64,
    /// How fast throttle changes target and actual speed (m/s²).
    pub speed_change_rate: f64,
    /// Yaw rate at full turn input (degrees/s).
    pub turn_rate_deg: f64,
    /// Vertical speed at full climb input (m/s).
    pub climb_rate: f64,
    /// Sink acceleration applied when not climbing (m/s²).
    pub gravity: f64,
    /// Maximum roll rate (degrees/s).
    pub roll_rate_deg: f64,
    /// Bank limit (degrees).
    pub max_roll_deg: f64,
    /// Maximum pitch rate (degrees/s).
    pub pitch_rate_deg: f64,
    /// Pitch limit (degrees).
    pub max_pitch_deg: f64,
    /// Visual pitch at full climb input (degrees).
    pub climb_pitch_deg: f64,
    /// Roll easing response (1/s).
    pub roll_response: f64,
    /// Vertical speed easing response (1/s).
    pub vertical_response: f64,
    /// Pitch easing response (1/s).
    pub pitch_response: f64,
}

impl Default for AircraftPhysicsConfig {
    fn default() -> Self {
        Self {
            min_speed: 15.0,
            max_speed: 120.0,
            speed_change_rate: 25.0,
            turn_rate_deg: 45.0,
            climb_rate: 20.0,
            gravity: 2.0,
            roll_rate_deg: 60.0,
            max_roll_deg: 45.0,
            pitch_rate_deg: 60.0,
            max_pitch_deg: 60.0,
            climb_pitch_deg: 30.0,
            roll_response: 9.75,
            vertical_response: 6.3,
            pitch_response: 5.0,
        }
    }
}

/// Control input for one step. All axes are in `[-1, 1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FlightInput {
    /// Speed up (0 to 1).
    pub throttle: f64,
    /// Slow down (0 to 1).
    pub brake: f64,
    /// Direct yaw input, positive = right.
    pub turn: f64,
    /// Bank input, positive = right wing down.
    pub roll: f64,
    /// Climb input, positive = up.
    pub climb: f64,
}

/// Result of one physics step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FlightOutput {
    /// Distance travelled along the horizontal heading (m).
    pub forward_distance: f64,
    /// Distance travelled along local up (m).
    pub vertical_distance: f64,
    /// Heading change rate (rad/s).
    pub yaw_rate: f64,
    /// Airspeed (m/s).
    pub speed: f64,
    /// Vertical speed (m/s).
    pub vertical_velocity: f64,
    /// Bank angle (rad).
    pub roll: f64,
    /// Visual pitch (rad).
    pub pitch: f64,
}

/// Aircraft dynamics for one aircraft.
#[derive(Clone, Debug)]
pub struct AircraftPhysics {
    config: AircraftPhysicsConfig,
    target_speed: f64,
    speed: f64,
    roll: f64,
    pitch: f64,
    vertical_velocity: f64,
}

impl AircraftPhysics {
    pub fn new(config: AircraftPhysicsConfig) -> Self {
        let min_speed = config.min_speed;
        Self {
            config,
            target_speed: min_speed,
            speed: min_speed,
            roll: 0.0,
            pitch: 0.0,
            vertical_velocity: 0.0,
        }
    }

    pub fn config(&self) -> &AircraftPhysicsConfig {
        &self.config
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn target_speed(&self) -> f64 {
        self.target_speed
    }

    pub fn roll(&self) -> f64 {
        self.roll
    }

    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    pub fn vertical_velocity(&self) -> f64 {
        self.vertical_velocity
    }

    /// Return to level flight at minimum speed.
    pub fn reset(&mut self) {
        self.target_speed = self.config.min_speed;
        self.speed = self.config.min_speed;
        self.roll = 0.0;
        self.pitch = 0.0;
        self.vertical_velocity = 0.0;
    }

    fn speed_bounds(&self) -> (f64, f64) {
        let min = self.config.min_speed.max(0.0);
        (min, self.config.max_speed.max(min))
    }

    /// Advance the dynamics by `dt` seconds.
    pub fn update(&mut self, dt: f64, input: &FlightInput) -> FlightOutput {
        let dt = sanitize_dt(dt);
        let c = &self.config;
        let axis = |v: f64| if v.is_finite() { v.clamp(-1.0, 1.0) } else { 0.0 };
        let throttle = axis(input.throttle).max(0.0);
        let brake = axis(input.brake).max(0.0);
        let turn = axis(input.turn);
        let roll_input = axis(input.roll);
        let climb = axis(input.climb);

        // Speed.
        let (min_speed, max_speed) = self.speed_bounds();
        let rate = c.speed_change_rate.max(0.0);
        self.target_speed =
            (self.target_speed + (throttle - brake) * rate * dt).clamp(min_speed, max_speed);
        self.speed = move_toward(self.speed, self.target_speed, rate * dt).clamp(min_speed, max_speed);

        // Bank.
        let max_roll = c.max_roll_deg.to_radians().abs();
        self.roll = ease_toward(
            self.roll,
            roll_input * max_roll,
            c.roll_response,
            c.roll_rate_deg.to_radians(),
            dt,
        )
        .clamp(-max_roll, max_roll);

        // Turning: direct input plus bank coupling.
        let bank = if max_roll > 0.0 {
            (self.roll / max_roll).clamp(-1.0, 1.0)
        } else {
            0.0
        };
        let yaw_rate = (turn + bank) * c.turn_rate_deg.to_radians();

        // Climb and sink.
        let target_vv = climb * c.climb_rate;
        self.vertical_velocity +=
            (target_vv - self.vertical_velocity) * super::smoothing_factor(c.vertical_response, dt);
        if climb <= 0.0 {
            self.vertical_velocity -= c.gravity.max(0.0) * dt;
        }

        // Visual pitch.
        let max_pitch = c.max_pitch_deg.to_radians().abs();
        let target_pitch = (climb * c.climb_pitch_deg.to_radians()).clamp(-max_pitch, max_pitch);
        self.pitch = ease_toward(
            self.pitch,
            target_pitch,
            c.pitch_response,
            c.pitch_rate_deg.to_radians(),
            dt,
        )
        .clamp(-max_pitch, max_pitch);

        FlightOutput {
            forward_distance: self.speed * dt,
            vertical_distance: self.vertical_velocity * dt,
            yaw_rate,
            speed: self.speed,
            vertical_velocity: self.vertical_velocity,
            roll: self.roll,
            pitch: self.pitch,
        }
    }
}
