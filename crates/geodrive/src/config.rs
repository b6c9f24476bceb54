//! Simulation configuration.
//!
//! Every tuning constant lives here. Missing fields fall back to their
//! defaults, so a config file only needs to name what it changes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::bridge::BridgeConfig;
use crate::camera::CameraConfig;
use crate::error::{Error, Result};
use crate::game_loop::DEFAULT_MAX_FRAME_DT;
use crate::geo::Geodetic;
use crate::input::{self, Action};
use crate::manager::ManagerConfig;
use crate::vehicle::{AircraftConfig, CybertruckConfig};

/// Frame loop settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Longest frame delta passed to the systems (s).
    pub max_frame_dt: f64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_frame_dt: DEFAULT_MAX_FRAME_DT,
        }
    }
}

/// A named place on the globe.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpawnPoint {
    pub longitude: f64,
    pub latitude: f64,
    pub altitude: f64,
    /// Heading clockwise from north (degrees).
    #[serde(default)]
    pub heading_deg: f64,
}

impl SpawnPoint {
    pub fn geodetic(&self) -> Geodetic {
        Geodetic::new(self.longitude, self.latitude, self.altitude)
    }
}

/// Where vehicles start.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnConfig {
    /// Initial ground vehicle placement.
    pub car: SpawnPoint,
    /// Where a crashed aircraft restarts.
    pub restart: SpawnPoint,
    /// Height added when swapping from the ground vehicle to the aircraft (m).
    pub aircraft_lift: f64,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            car: SpawnPoint {
                longitude: 11.9746,
                latitude: 57.7089,
                altitude: 100.0,
                heading_deg: 0.0,
            },
            restart: SpawnPoint {
                longitude: 11.9746,
                latitude: 57.7089,
                altitude: 200.0,
                heading_deg: 0.0,
            },
            aircraft_lift: 50.0,
        }
    }
}

/// Complete simulation configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub game_loop: LoopConfig,
    /// Key code to action.
    pub bindings: BTreeMap<String, Action>,
    pub car: CybertruckConfig,
    pub aircraft: AircraftConfig,
    pub camera: CameraConfig,
    pub manager: ManagerConfig,
    pub bridge: BridgeConfig,
    pub spawn: SpawnConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            game_loop: LoopConfig::default(),
            bindings: input::default_bindings(),
            car: CybertruckConfig::default(),
            aircraft: AircraftConfig::default(),
            camera: CameraConfig::default(),
            manager: ManagerConfig::default(),
            bridge: BridgeConfig::default(),
            spawn: SpawnConfig::default(),
        }
    }
}

impl SimConfig {
    /// Parse a JSON config and check it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the simulation cannot run with.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("game_loop.max_frame_dt", self.game_loop.max_frame_dt),
            ("car.physics.mass", self.car.physics.mass),
            ("car.sampler.refresh_interval", self.car.sampler.refresh_interval),
            ("aircraft.physics.max_speed", self.aircraft.physics.max_speed),
            ("manager.poll_interval", self.manager.poll_interval),
            ("bridge.interval", self.bridge.interval),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::Config {
                    message: format!("{name} must be positive, got {value}"),
                });
            }
        }

        let physics = &self.aircraft.physics;
        if physics.min_speed > physics.max_speed {
            return Err(Error::Config {
                message: format!(
                    "aircraft.physics.min_speed ({}) exceeds max_speed ({})",
                    physics.min_speed, physics.max_speed
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_is_default() {
        assert_eq!(SimConfig::from_json("{}").unwrap(), SimConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config = SimConfig::from_json(
            r#"{
                "car": { "clearance": 0.8, "physics": { "max_speed": 20.0 } },
                "bindings": { "KeyW": "throttle", "KeyX": "switchCamera" }
            }"#,
        )
        .unwrap();
        assert!((config.car.clearance - 0.8).abs() < f64::EPSILON);
        assert!((config.car.physics.max_speed - 20.0).abs() < f64::EPSILON);
        // Untouched fields keep their defaults.
        assert!((config.car.physics.mass - 2400.0).abs() < f64::EPSILON);
        assert_eq!(config.bindings.len(), 2);
        assert_eq!(config.bindings["KeyX"], Action::SwitchCamera);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = SimConfig::from_json(r#"{ "bridge": { "interval": 0 } }"#).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));

        let err = SimConfig::from_json(
            r#"{ "aircraft": { "physics": { "min_speed": 200, "max_speed": 100 } } }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("min_speed"));

        assert!(matches!(
            SimConfig::from_json("not json"),
            Err(Error::Config { .. })
        ));
    }
}
