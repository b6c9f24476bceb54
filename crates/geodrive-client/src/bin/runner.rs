//! Headless scripted run for tuning vehicle behaviour.
//!
//! Drives the ground vehicle, swaps to the aircraft and flies it, writing
//! per-frame CSV telemetry to stdout and a summary to stderr.
//!
//! Usage: `cargo run --bin geodrive-runner -- --seed 3 > telemetry.csv`

use std::time::Duration;

use bevy::app::ScheduleRunnerPlugin;
use bevy::prelude::*;
use geodrive::{GameEvent, VehicleKind, geo};
use geodrive_client::launch_params;
use geodrive_client::sim::{
    SimulationClock, SimulationEvent, SimulationPlugin, SimulationState, SimulationSystems,
    SimulationTelemetry, TerrainSource,
};
use geodrive_client::telemetry::StdoutTelemetryOutput;

/// Fixed timestep for the simulation (60 Hz).
const FIXED_TIMESTEP: f64 = 1.0 / 60.0;

/// Give up if no vehicle becomes active within this long (s).
const MAX_WAIT_TIME: f64 = 5.0;

/// Full-throttle driving before the turn starts (s).
const DRIVE_STRAIGHT_TIME: f64 = 8.0;
/// Duration of the right turn (s).
const DRIVE_TURN_TIME: f64 = 3.0;
/// Total driving time before swapping to the aircraft (s).
const DRIVE_TIME: f64 = 15.0;

/// Climb duration after take-off (s).
const CLIMB_TIME: f64 = 5.0;
/// Roll duration after the climb (s).
const BANK_TIME: f64 = 2.0;
/// Total flying time (s).
const FLY_TIME: f64 = 20.0;

/// State of the scripted run.
#[derive(Resource, Default)]
enum RunnerState {
    /// Waiting for the first vehicle to finish loading.
    #[default]
    WaitingForVehicle,
    /// Driving the ground vehicle.
    Drive { elapsed: f64 },
    /// Waiting for the aircraft to replace the ground vehicle.
    Swap { elapsed: f64 },
    /// Flying the aircraft.
    Fly { elapsed: f64 },
    /// Run complete.
    Complete,
}

/// Measurements accumulated during the run.
#[derive(Resource, Default)]
struct Measurements {
    elapsed: f64,
    car_max_speed: f64,
    car_distance: f64,
    car_min_clearance: Option<f64>,
    car_max_clearance: Option<f64>,
    aircraft_max_height: Option<f64>,
    aircraft_min_clearance: Option<f64>,
    crashes: usize,
    camera_changes: usize,
}

fn update_min(slot: &mut Option<f64>, value: f64) {
    *slot = Some(slot.map_or(value, |current| current.min(value)));
}

fn update_max(slot: &mut Option<f64>, value: f64) {
    *slot = Some(slot.map_or(value, |current| current.max(value)));
}

/// Press and release keys for the current phase.
fn drive_script(
    mut runner: ResMut<RunnerState>,
    mut keys: ResMut<ButtonInput<KeyCode>>,
    sim: Res<SimulationState>,
) {
    // No input plugin clears the just-pressed state, so do it here.
    keys.clear();

    let dt = sim.last_dt().unwrap_or(0.0);
    let active = sim
        .sim()
        .manager()
        .active_vehicle()
        .map(geodrive::Vehicle::kind);

    let next = match *runner {
        RunnerState::WaitingForVehicle => {
            if active == Some(VehicleKind::Car) {
                keys.press(KeyCode::KeyW);
                eprintln!("# Vehicle ready at t={:.2}s, driving", sim.sim().time());
                Some(RunnerState::Drive { elapsed: 0.0 })
            } else if sim.sim().time() > MAX_WAIT_TIME {
                eprintln!("# ERROR: vehicle never became active");
                Some(RunnerState::Complete)
            } else {
                None
            }
        }
        RunnerState::Drive { ref mut elapsed } => {
            *elapsed += dt;
            if *elapsed >= DRIVE_TIME {
                keys.release(KeyCode::KeyW);
                keys.press(KeyCode::KeyM);
                eprintln!("# Swapping to aircraft");
                Some(RunnerState::Swap { elapsed: 0.0 })
            } else {
                let turning = (DRIVE_STRAIGHT_TIME..DRIVE_STRAIGHT_TIME + DRIVE_TURN_TIME)
                    .contains(&*elapsed);
                if turning && !keys.pressed(KeyCode::KeyD) {
                    keys.press(KeyCode::KeyD);
                } else if !turning && keys.pressed(KeyCode::KeyD) {
                    keys.release(KeyCode::KeyD);
                }
                None
            }
        }
        RunnerState::Swap { ref mut elapsed } => {
            *elapsed += dt;
            keys.release(KeyCode::KeyM);
            if active == Some(VehicleKind::Aircraft) {
                keys.press(KeyCode::Space);
                eprintln!("# Aircraft active, climbing");
                Some(RunnerState::Fly { elapsed: 0.0 })
            } else if *elapsed > MAX_WAIT_TIME {
                eprintln!("# ERROR: aircraft never became active");
                Some(RunnerState::Complete)
            } else {
                None
            }
        }
        RunnerState::Fly { ref mut elapsed } => {
            *elapsed += dt;
            if *elapsed >= FLY_TIME {
                keys.release_all();
                Some(RunnerState::Complete)
            } else {
                if *elapsed >= CLIMB_TIME && keys.pressed(KeyCode::Space) {
                    keys.release(KeyCode::Space);
                    keys.press(KeyCode::KeyE);
                }
                if *elapsed >= CLIMB_TIME + BANK_TIME && keys.pressed(KeyCode::KeyE) {
                    keys.release(KeyCode::KeyE);
                }
                None
            }
        }
        RunnerState::Complete => None,
    };

    if let Some(next) = next {
        *runner = next;
    }
}

fn measure(
    sim: Res<SimulationState>,
    terrain: Res<TerrainSource>,
    mut events: MessageReader<SimulationEvent>,
    mut results: ResMut<Measurements>,
) {
    for SimulationEvent(event) in events.read() {
        match event {
            GameEvent::Crashed { crashed: true } => results.crashes += 1,
            GameEvent::CameraChanged { .. } => results.camera_changes += 1,
            _ => {}
        }
    }

    let Some(dt) = sim.last_dt() else {
        return;
    };
    results.elapsed += dt;

    let Some(active) = sim.sim().manager().view().get() else {
        return;
    };
    let clearance = terrain.0.clearance(active.state.position);
    match active.kind {
        VehicleKind::Car => {
            results.car_max_speed = results.car_max_speed.max(active.state.speed);
            results.car_distance += active.state.speed * dt;
            update_min(&mut results.car_min_clearance, clearance);
            update_max(&mut results.car_max_clearance, clearance);
        }
        VehicleKind::Aircraft => {
            update_max(
                &mut results.aircraft_max_height,
                geo::height_of(active.state.position),
            );
            update_min(&mut results.aircraft_min_clearance, clearance);
        }
    }
}

fn check_complete(
    runner: Res<RunnerState>,
    results: Res<Measurements>,
    mut exit: MessageWriter<AppExit>,
) {
    if !matches!(*runner, RunnerState::Complete) {
        return;
    }

    let fmt = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2} m"));

    eprintln!("#");
    eprintln!("# === Run Summary ===");
    eprintln!("# Simulated time: {:.2} s", results.elapsed);
    eprintln!("# Ground vehicle:");
    eprintln!(
        "#   Max speed: {:.2} m/s ({:.1} km/h)",
        results.car_max_speed,
        results.car_max_speed * 3.6
    );
    eprintln!("#   Distance: {:.1} m", results.car_distance);
    eprintln!(
        "#   Clearance: {} - {}",
        fmt(results.car_min_clearance),
        fmt(results.car_max_clearance)
    );
    eprintln!("# Aircraft:");
    eprintln!("#   Max height: {}", fmt(results.aircraft_max_height));
    eprintln!("#   Min clearance: {}", fmt(results.aircraft_min_clearance));
    eprintln!("#   Crashes: {}", results.crashes);

    exit.write(AppExit::Success);
}

fn main() {
    let mut params = launch_params::parse();
    if params.vehicle != VehicleKind::Car {
        eprintln!("# The scripted run always starts in the ground vehicle");
        params.vehicle = VehicleKind::Car;
    }

    let simulation =
        match SimulationPlugin::from_launch(&params, SimulationClock::Fixed(FIXED_TIMESTEP)) {
            Ok(plugin) => plugin,
            Err(e) => {
                eprintln!("# ERROR: {e}");
                std::process::exit(1);
            }
        };

    App::new()
        // Step as fast as possible; simulated time comes from the fixed clock.
        .add_plugins(MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::ZERO)))
        .add_plugins(simulation)
        .insert_resource(SimulationTelemetry::new(Box::new(StdoutTelemetryOutput)))
        .init_resource::<ButtonInput<KeyCode>>()
        .init_resource::<RunnerState>()
        .init_resource::<Measurements>()
        .add_systems(
            Update,
            (
                drive_script.before(SimulationSystems::Input),
                (measure, check_complete)
                    .chain()
                    .after(SimulationSystems::Publish),
            ),
        )
        .run();
}
