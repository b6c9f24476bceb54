//! Launch parameter parsing.
//!
//! On native, parameters are parsed from command-line arguments using clap.
//! On WASM, defaults are used (CLI argument parsing is not available).

use std::path::PathBuf;

use bevy::prelude::*;
use geodrive::config::SpawnPoint;
use geodrive::{CameraMode, Error, SimConfig, VehicleKind};

/// Default starting latitude (Gothenburg).
const DEFAULT_LAT: f64 = 57.7089;
/// Default starting longitude (Gothenburg).
const DEFAULT_LON: f64 = 11.9746;
/// Default starting altitude above the ellipsoid in meters.
const DEFAULT_ALTITUDE: f64 = 100.0;

/// Launch parameters for the client.
#[derive(Resource, Debug, Clone)]
pub struct LaunchParams {
    /// Starting latitude in degrees.
    pub lat: f64,
    /// Starting longitude in degrees.
    pub lon: f64,
    /// Starting altitude in meters.
    pub altitude: f64,
    /// Starting heading in degrees clockwise from north.
    pub heading: f64,
    /// Vehicle to start in.
    pub vehicle: VehicleKind,
    /// Initial camera mode.
    pub camera_mode: CameraMode,
    /// Optional JSON simulation config.
    pub config: Option<PathBuf>,
    /// Seed for the procedural terrain.
    pub seed: u64,
    /// Optional CSV telemetry file.
    pub telemetry: Option<PathBuf>,
}

impl Default for LaunchParams {
    fn default() -> Self {
        Self {
            lat: DEFAULT_LAT,
            lon: DEFAULT_LON,
            altitude: DEFAULT_ALTITUDE,
            heading: 0.0,
            vehicle: VehicleKind::Car,
            camera_mode: CameraMode::default(),
            config: None,
            seed: 0,
            telemetry: None,
        }
    }
}

impl LaunchParams {
    /// Simulation config from the optional config file, with the start point
    /// replaced by the launch coordinates.
    pub fn sim_config(&self) -> geodrive::Result<SimConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let json = std::fs::read_to_string(path).map_err(|e| Error::Config {
                    message: format!("{}: {e}", path.display()),
                })?;
                SimConfig::from_json(&json)?
            }
            None => SimConfig::default(),
        };

        config.spawn.car = SpawnPoint {
            longitude: self.lon,
            latitude: self.lat,
            altitude: self.altitude,
            heading_deg: self.heading,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(not(target_family = "wasm"))]
mod native {
    use clap::{Parser, ValueEnum};

    use super::*;

    #[derive(Clone, Copy, Debug, ValueEnum)]
    enum VehicleArg {
        Car,
        Aircraft,
    }

    impl From<VehicleArg> for VehicleKind {
        fn from(arg: VehicleArg) -> Self {
            match arg {
                VehicleArg::Car => VehicleKind::Car,
                VehicleArg::Aircraft => VehicleKind::Aircraft,
            }
        }
    }

    #[derive(Clone, Copy, Debug, ValueEnum)]
    enum CameraArg {
        FirstPerson,
        Chase,
        Chase2,
    }

    impl From<CameraArg> for CameraMode {
        fn from(arg: CameraArg) -> Self {
            match arg {
                CameraArg::FirstPerson => CameraMode::FirstPerson,
                CameraArg::Chase => CameraMode::Chase,
                CameraArg::Chase2 => CameraMode::Chase2,
            }
        }
    }

    #[derive(Parser, Debug)]
    #[command(about = "Drive and fly over procedural terrain on a globe")]
    pub(super) struct CliArgs {
        /// Starting latitude in degrees.
        #[arg(long, default_value_t = DEFAULT_LAT)]
        lat: f64,

        /// Starting longitude in degrees.
        #[arg(long, default_value_t = DEFAULT_LON)]
        lon: f64,

        /// Starting altitude in meters.
        #[arg(long, default_value_t = DEFAULT_ALTITUDE)]
        altitude: f64,

        /// Starting heading in degrees clockwise from north.
        #[arg(long, default_value_t = 0.0)]
        heading: f64,

        /// Vehicle to start in.
        #[arg(long, value_enum, default_value = "car")]
        vehicle: VehicleArg,

        /// Initial camera mode.
        #[arg(long, value_enum, default_value = "chase")]
        camera: CameraArg,

        /// JSON simulation config.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Seed for the procedural terrain.
        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Write per-frame CSV telemetry to this file.
        #[arg(long)]
        telemetry: Option<PathBuf>,
    }

    impl From<CliArgs> for LaunchParams {
        fn from(args: CliArgs) -> Self {
            LaunchParams {
                lat: args.lat,
                lon: args.lon,
                altitude: args.altitude,
                heading: args.heading,
                vehicle: args.vehicle.into(),
                camera_mode: args.camera.into(),
                config: args.config,
                seed: args.seed,
                telemetry: args.telemetry,
            }
        }
    }

    pub fn parse() -> LaunchParams {
        CliArgs::parse().into()
    }
}

/// Parse launch parameters from CLI args (native) or use defaults (WASM).
pub fn parse() -> LaunchParams {
    #[cfg(not(target_family = "wasm"))]
    {
        native::parse()
    }
    #[cfg(target_family = "wasm")]
    {
        LaunchParams::default()
    }
}
