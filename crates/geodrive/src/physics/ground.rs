//! Ground vehicle longitudinal and steering dynamics.
//!
//! Force-based speed model with Ackermann-style steering. Velocity is a signed
//! scalar along the vehicle's forward axis: positive forward, negative reverse.

use serde::{Deserialize, Serialize};

use super::{move_toward, sanitize_dt};
use crate::constants::{GRAVITY, STATIONARY_SPEED};

/// Tuning constants for a ground vehicle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehiclePhysicsConfig {
    /// Vehicle mass in kg.
    pub mass: f64,
    /// Forward drive force at full throttle (N).
    pub engine_force: f64,
    /// Braking force while moving forward (N).
    pub brake_force: f64,
    /// Reverse drive force when braking from a standstill (N).
    pub reverse_force: f64,
    /// Rolling resistance coefficient.
    pub rolling_resistance: f64,
    /// Quadratic air drag coefficient (N per (m/s)²).
    pub air_drag: f64,
    /// Natural deceleration with no pedal input (m/s²).
    pub coast_deceleration: f64,
    /// Top forward speed (m/s). Reverse is limited to half of this.
    pub max_speed: f64,
    /// Distance between axles (m).
    pub wheelbase: f64,
    /// Maximum front wheel angle (degrees).
    pub max_steering_deg: f64,
    /// Steering smoothing rate at speed (input units per second).
    pub steering_rate: f64,
    /// Steering smoothing rate when stationary.
    pub low_speed_steering_rate: f64,
    /// Speed at which steering smoothing reaches `steering_rate` (m/s).
    pub steering_rate_speed: f64,
    /// Speed above which the steering angle is reduced (m/s).
    pub steering_reduction_speed: f64,
    /// Lower bound of the steering reduction factor.
    pub min_steering_factor: f64,
}

impl Default for VehiclePhysicsConfig {
    fn default() -> Self {
        Self {
            // SI tuning for a pickup truck: roughly 4 s from rest to 100 km/h.
            mass: 2400.0,
            engine_force: 18_000.0,
            brake_force: 30_000.0,
            reverse_force: 8_000.0,
            rolling_resistance: 0.015,
            air_drag: 0.8,
            coast_deceleration: 1.5,
            // 120 km/h.
            max_speed: 33.33,
            // The truck model is rendered at 10x scale.
            wheelbase: 8.0,
            max_steering_deg: 15.0,
            steering_rate: 3.0,
            low_speed_steering_rate: 1.0,
            steering_rate_speed: 5.0,
            steering_reduction_speed: 12.0,
            min_steering_factor: 0.2,
        }
    }
}

/// Pedal and steering input for one step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DriveInput {
    /// Throttle (0 to 1).
    pub throttle: f64,
    /// Brake, or reverse when stationary (0 to 1).
    pub brake: f64,
    /// Steering (-1 to 1, positive = right).
    pub steering: f64,
}

/// Result of one physics step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DriveOutput {
    /// Signed velocity along the forward axis (m/s).
    pub velocity: f64,
    /// Absolute speed (m/s).
    pub speed: f64,
    /// Heading change rate (rad/s, positive = clockwise seen from above).
    pub yaw_rate: f64,
}

/// Ground vehicle dynamics for one vehicle.
#[derive(Clone, Debug)]
pub struct VehiclePhysics {
    config: VehiclePhysicsConfig,
    velocity: f64,
    steering: f64,
}

impl VehiclePhysics {
    pub fn new(config: VehiclePhysicsConfig) -> Self {
        Self {
            config,
            velocity: 0.0,
            steering: 0.0,
        }
    }

    pub fn config(&self) -> &VehiclePhysicsConfig {
        &self.config
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    /// Smoothed steering input.
    pub fn steering(&self) -> f64 {
        self.steering
    }

    /// Stop the vehicle and center the steering.
    pub fn reset(&mut self) {
        self.velocity = 0.0;
        self.steering = 0.0;
    }

    /// Kill forward motion, keeping the steering state.
    pub fn stop(&mut self) {
        self.velocity = 0.0;
    }

    /// Advance the dynamics by `dt` seconds.
    pub fn update(&mut self, dt: f64, input: &DriveInput) -> DriveOutput {
        let dt = sanitize_dt(dt);
        let throttle = finite_or_zero(input.throttle).clamp(0.0, 1.0);
        let brake = finite_or_zero(input.brake).clamp(0.0, 1.0);
        let steering_input = finite_or_zero(input.steering).clamp(-1.0, 1.0);

        self.velocity = self.next_velocity(dt, throttle, brake);
        self.update_steering(dt, steering_input);

        DriveOutput {
            velocity: self.velocity,
            speed: self.velocity.abs(),
            yaw_rate: self.yaw_rate(),
        }
    }

    fn next_velocity(&self, dt: f64, throttle: f64, brake: f64) -> f64 {
        let c = &self.config;
        let mass = c.mass.max(1.0);
        let v = self.velocity;

        // Braking while rolling forward stops at zero; reverse only engages
        // once the vehicle is (nearly) stationary.
        let braking_forward = brake > 0.0 && v > STATIONARY_SPEED;
        let mut drive = c.engine_force * throttle;
        if brake > 0.0 && !braking_forward {
            drive -= c.reverse_force * brake;
        }
        let mut next = v + drive / mass * dt;

        if braking_forward {
            next = move_toward(next, 0.0, c.brake_force * brake / mass * dt);
        }

        // Resistive forces only ever shrink the magnitude.
        let resistance = c.rolling_resistance * mass * GRAVITY + c.air_drag * v * v;
        if next.abs() > STATIONARY_SPEED {
            next = move_toward(next, 0.0, resistance / mass * dt);
        }

        if throttle == 0.0 && brake == 0.0 {
            next = move_toward(next, 0.0, c.coast_deceleration * dt);
        }

        let max_speed = c.max_speed.max(0.0);
        next.clamp(-max_speed * 0.5, max_speed)
    }

    fn update_steering(&mut self, dt: f64, target: f64) {
        let c = &self.config;
        let blend = if c.steering_rate_speed > 0.0 {
            (self.velocity.abs() / c.steering_rate_speed).min(1.0)
        } else {
            1.0
        };
        let rate = c.low_speed_steering_rate + (c.steering_rate - c.low_speed_steering_rate) * blend;
        self.steering = move_toward(self.steering, target, rate.max(0.0) * dt);
    }

    /// Steering angle reduction factor for the current speed.
    pub fn steering_factor(&self) -> f64 {
        steering_factor(&self.config, self.velocity.abs())
    }

    /// Front wheel angle in radians for the current smoothed steering.
    pub fn wheel_angle(&self) -> f64 {
        self.steering * self.config.max_steering_deg.to_radians() * self.steering_factor()
    }

    fn yaw_rate(&self) -> f64 {
        yaw_rate(self.config.wheelbase, self.wheel_angle(), self.velocity)
    }
}

/// Steering reduction factor at `speed`: 1 up to the reduction speed, then
/// linearly down toward the configured floor at top speed.
pub fn steering_factor(config: &VehiclePhysicsConfig, speed: f64) -> f64 {
    let start = config.steering_reduction_speed;
    if speed <= start {
        return 1.0;
    }
    let span = (config.max_speed - start).max(1.0e-6);
    (1.0 - (speed - start) / span).max(config.min_steering_factor.clamp(0.0, 1.0))
}

/// Ackermann yaw rate for a front wheel angle and signed velocity.
///
/// Zero wheelbase, zero angle or a stationary vehicle yields zero.
pub fn yaw_rate(wheelbase: f64, wheel_angle: f64, velocity: f64) -> f64 {
    if wheelbase <= 0.0 || wheel_angle.abs() < 1.0e-9 || velocity.abs() < STATIONARY_SPEED {
        return 0.0;
    }
    let radius = wheelbase / wheel_angle.abs().tan();
    if !radius.is_finite() || radius <= 0.0 {
        return 0.0;
    }
    velocity / radius * wheel_angle.signum()
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const DT: f64 = 1.0 / 60.0;

    fn run(physics: &mut VehiclePhysics, input: DriveInput, seconds: f64) -> DriveOutput {
        let mut out = DriveOutput::default();
        let steps = (seconds / DT).round() as usize;
        for _ in 0..steps {
            out = physics.update(DT, &input);
        }
        out
    }

    #[test]
    fn test_throttle_accelerates_to_max_speed() {
        let mut physics = VehiclePhysics::new(VehiclePhysicsConfig::default());
        let out = run(
            &mut physics,
            DriveInput {
                throttle: 1.0,
                ..Default::default()
            },
            1.0,
        );
        assert!(out.velocity > 3.0);

        let out = run(
            &mut physics,
            DriveInput {
                throttle: 1.0,
                ..Default::default()
            },
            60.0,
        );
        assert!((out.velocity - physics.config().max_speed).abs() < 1.0e-9);
    }

    #[test]
    fn test_default_tuning_reaches_highway_speed() {
        let config = VehiclePhysicsConfig::default();
        assert!((config.max_speed * 3.6 - 120.0).abs() < 0.1);

        let mut physics = VehiclePhysics::new(config);
        let throttle = DriveInput {
            throttle: 1.0,
            ..Default::default()
        };
        let kmh = |out: DriveOutput| out.velocity * 3.6;
        assert!(kmh(run(&mut physics, throttle, 3.0)) < 100.0);
        assert!(kmh(run(&mut physics, throttle, 2.0)) >= 100.0);
    }

    #[test]
    fn test_brake_stops_before_reversing() {
        let mut physics = VehiclePhysics::new(VehiclePhysicsConfig::default());
        run(
            &mut physics,
            DriveInput {
                throttle: 1.0,
                ..Default::default()
            },
            2.0,
        );
        let brake = DriveInput {
            brake: 1.0,
            ..Default::default()
        };

        let mut previous = physics.velocity();
        loop {
            let out = physics.update(DT, &brake);
            if previous > STATIONARY_SPEED {
                // This tick was a forward braking tick.
                assert!(out.velocity >= 0.0);
            }
            if out.velocity < 0.0 {
                break;
            }
            previous = out.velocity;
        }

        // Held brake keeps reversing up to the reverse limit.
        let out = run(&mut physics, brake, 60.0);
        assert!((out.velocity + physics.config().max_speed * 0.5).abs() < 1.0e-9);
    }

    #[test]
    fn test_steering_neutral_goes_straight() {
        let mut physics = VehiclePhysics::new(VehiclePhysicsConfig::default());
        let out = run(
            &mut physics,
            DriveInput {
                throttle: 1.0,
                ..Default::default()
            },
            3.0,
        );
        assert!(out.yaw_rate.abs() < f64::EPSILON);
    }

    #[test]
    fn test_right_steer_turns_clockwise() {
        let mut physics = VehiclePhysics::new(VehiclePhysicsConfig::default());
        let out = run(
            &mut physics,
            DriveInput {
                throttle: 0.5,
                steering: 1.0,
                ..Default::default()
            },
            2.0,
        );
        assert!(out.yaw_rate > 0.0);

        // Reversing with the same steering turns the other way.
        let mut physics = VehiclePhysics::new(VehiclePhysicsConfig::default());
        let out = run(
            &mut physics,
            DriveInput {
                brake: 1.0,
                steering: 1.0,
                ..Default::default()
            },
            2.0,
        );
        assert!(out.velocity < 0.0);
        assert!(out.yaw_rate < 0.0);
    }

    #[test]
    fn test_degenerate_geometry_is_straight() {
        assert!(yaw_rate(0.0, 0.2, 10.0).abs() < f64::EPSILON);
        assert!(yaw_rate(8.0, 0.0, 10.0).abs() < f64::EPSILON);
        assert!(yaw_rate(8.0, 0.2, 0.0).abs() < f64::EPSILON);
        assert!(yaw_rate(-1.0, 0.2, 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_high_speed_reduces_curvature() {
        let config = VehiclePhysicsConfig::default();
        let max_angle = config.max_steering_deg.to_radians();
        let curvature = |speed: f64| {
            let angle = max_angle * steering_factor(&config, speed);
            yaw_rate(config.wheelbase, angle, speed) / speed
        };

        let slow = curvature(config.steering_reduction_speed * 0.5);
        let fast = curvature(config.steering_reduction_speed + 10.0);
        assert!(fast < slow);

        // The reduction never goes below the floor.
        assert!(
            (steering_factor(&config, config.max_speed * 10.0) - config.min_steering_factor).abs()
                < f64::EPSILON
        );
    }

    #[test]
    fn test_steering_smoothing_is_slower_when_stationary() {
        let steer = DriveInput {
            steering: 1.0,
            ..Default::default()
        };
        let mut parked = VehiclePhysics::new(VehiclePhysicsConfig::default());
        parked.update(DT, &steer);

        let mut moving = VehiclePhysics::new(VehiclePhysicsConfig::default());
        run(
            &mut moving,
            DriveInput {
                throttle: 1.0,
                ..Default::default()
            },
            3.0,
        );
        moving.update(
            DT,
            &DriveInput {
                throttle: 1.0,
                steering: 1.0,
                ..Default::default()
            },
        );

        assert!(parked.steering() > 0.0);
        assert!(moving.steering() > parked.steering());
    }

    proptest! {
        #[test]
        fn test_speed_always_clamped(
            steps in prop::collection::vec((0.0f64..0.2, 0u8..4, -1.0f64..1.0), 1..200)
        ) {
            let mut physics = VehiclePhysics::new(VehiclePhysicsConfig::default());
            let max = physics.config().max_speed;
            for (dt, pedals, steering) in steps {
                let input = DriveInput {
                    throttle: f64::from(pedals & 1),
                    brake: f64::from((pedals >> 1) & 1),
                    steering,
                };
                let out = physics.update(dt, &input);
                prop_assert!(out.velocity <= max + 1.0e-9);
                prop_assert!(out.velocity >= -max * 0.5 - 1.0e-9);
                prop_assert!(out.yaw_rate.is_finite());
            }
        }

        #[test]
        fn test_zero_input_decays_monotonically(
            initial in -16.0f64..33.0,
            dts in prop::collection::vec(0.0f64..0.1, 1..100)
        ) {
            let mut physics = VehiclePhysics::new(VehiclePhysicsConfig::default());
            physics.velocity = initial;
            let mut previous = initial;
            for dt in dts {
                let out = physics.update(dt, &DriveInput::default());
                prop_assert!(out.velocity.abs() <= previous.abs() + 1.0e-12);
                // Never crosses zero.
                prop_assert!(out.velocity * previous >= 0.0);
                previous = out.velocity;
            }
        }

        #[test]
        fn test_zero_steering_never_yaws(
            pedals in prop::collection::vec(0u8..4, 1..100)
        ) {
            let mut physics = VehiclePhysics::new(VehiclePhysicsConfig::default());
            for p in pedals {
                let input = DriveInput {
                    throttle: f64::from(p & 1),
                    brake: f64::from((p >> 1) & 1),
                    steering: 0.0,
                };
                let out = physics.update(DT, &input);
                prop_assert!(out.yaw_rate.abs() < f64::EPSILON);
            }
        }
    }
}
