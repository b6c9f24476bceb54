//! Drive a ground vehicle or fly an aircraft over procedural terrain.
//!
//! Controls: WASD or arrows to drive, Space/Shift to climb and descend, Q/E
//! to roll, C to switch camera, M to swap vehicles, N to toggle
//! ground-following, B to toggle collision detection.

use bevy::light::light_consts::lux;
use bevy::prelude::*;
use geodrive_client::floating_origin::{FloatingOriginCamera, FloatingOriginPlugin};
use geodrive_client::launch_params;
use geodrive_client::sim::{
    SimulationClock, SimulationPlugin, SimulationState, SimulationTelemetry, SimulationViewPlugin,
    start_position,
};
use geodrive_client::telemetry::FileTelemetryOutput;

/// Plugin for the main application.
pub struct AppPlugin;

impl Plugin for AppPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins((FloatingOriginPlugin, SimulationViewPlugin))
            .insert_resource(ClearColor(Color::srgb(0.55, 0.7, 0.9)))
            .add_systems(Startup, setup_scene);
    }
}

/// Set up the camera and lighting. The camera is placed by the simulation
/// from the first tick onward.
fn setup_scene(mut commands: Commands, state: Res<SimulationState>) {
    let start = start_position(state.sim().config());
    let up = start.normalize().as_vec3();

    commands.spawn((
        Camera3d::default(),
        Transform::IDENTITY.looking_to(up.any_orthonormal_vector(), up),
        Projection::Perspective(PerspectiveProjection {
            fov: std::f32::consts::FRAC_PI_4,
            near: 0.5,
            far: 200_000.0,
            ..Default::default()
        }),
        FloatingOriginCamera::new(start),
    ));

    // Sun directly overhead at the start point.
    commands.spawn((
        DirectionalLight {
            color: Color::WHITE,
            illuminance: lux::AMBIENT_DAYLIGHT,
            shadows_enabled: true,
            ..default()
        },
        Transform::IDENTITY.looking_to(-up, up.any_orthonormal_vector()),
    ));

    tracing::info!(
        "Scene setup complete - WASD to drive, C to switch camera, M to swap vehicles"
    );
}

fn main() {
    // Initialize tracing for native platforms.
    #[cfg(not(target_family = "wasm"))]
    {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    // Initialize tracing for WASM (logs to browser console).
    #[cfg(target_family = "wasm")]
    {
        console_error_panic_hook::set_once();
        tracing_wasm::set_as_global_default();
    }

    let params = launch_params::parse();
    let simulation = match SimulationPlugin::from_launch(&params, SimulationClock::Realtime) {
        Ok(plugin) => plugin,
        Err(e) => {
            tracing::error!("failed to configure simulation: {e}");
            std::process::exit(1);
        }
    };

    let mut app = App::new();

    #[allow(unused_mut)]
    let mut window = Window {
        title: "geodrive".to_string(),
        resolution: (1600, 900).into(),
        position: WindowPosition::Centered(MonitorSelection::Primary),
        ..Default::default()
    };

    // WASM: Fit canvas to parent element and prevent browser event handling.
    #[cfg(target_family = "wasm")]
    {
        window.fit_canvas_to_parent = true;
        window.prevent_default_event_handling = true;
    }

    app.add_plugins(DefaultPlugins.set(WindowPlugin {
        primary_window: Some(window),
        ..Default::default()
    }));

    if let Some(path) = &params.telemetry {
        match FileTelemetryOutput::create(path) {
            Ok(output) => {
                app.insert_resource(SimulationTelemetry::new(Box::new(output)));
            }
            Err(e) => tracing::warn!("cannot open telemetry file {}: {e}", path.display()),
        }
    }

    app.insert_resource(params)
        .add_plugins((simulation, AppPlugin))
        .run();
}
