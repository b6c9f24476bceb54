//! Bevy integration for the simulation.
//!
//! [`SimulationPlugin`] owns the [`Simulation`] as a resource, feeds it
//! keyboard input, ticks it once per app update and republishes its events
//! as Bevy messages. [`SimulationViewPlugin`] mirrors vehicles, camera and
//! terrain into the scene and is only needed when rendering.

use std::sync::Arc;

use bevy::prelude::*;
use geodrive::{
    CameraMode, Command, Environment, GameEvent, QueuedSpawner, SimConfig, Simulation,
    TaskSpawner, VehicleId, VehicleKind,
};
use glam::DVec3;
use web_time::Instant;

use crate::async_runtime::BevyTaskSpawner;
use crate::floating_origin::{FloatingOriginCamera, WorldPosition};
use crate::launch_params::LaunchParams;
use crate::mesh::terrain_patch;
use crate::telemetry::{TelemetryOutput, TelemetrySnapshot, emit_telemetry_to, reset_telemetry_to};
use crate::terrain::{HeadlessSceneHost, RollingHills};

/// Mean height of the procedural terrain above the ellipsoid (m).
pub const TERRAIN_BASE_HEIGHT: f64 = 0.0;

/// Half the side length of the rendered terrain patch (m).
const TERRAIN_PATCH_HALF_EXTENT: f64 = 3000.0;

/// Vertices along each side of the rendered terrain patch.
const TERRAIN_PATCH_RESOLUTION: u32 = 161;

/// How the simulation measures frame time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SimulationClock {
    /// Wall-clock deltas, clamped by the game loop.
    Realtime,
    /// A constant delta per update, with background work completed
    /// synchronously after every tick.
    Fixed(f64),
}

/// Plugin that runs the simulation inside a Bevy app.
pub struct SimulationPlugin {
    pub config: SimConfig,
    pub start: VehicleKind,
    pub camera_mode: CameraMode,
    pub clock: SimulationClock,
    pub terrain_seed: u64,
}

impl SimulationPlugin {
    pub fn from_launch(params: &LaunchParams, clock: SimulationClock) -> geodrive::Result<Self> {
        Ok(Self {
            config: params.sim_config()?,
            start: params.vehicle,
            camera_mode: params.camera_mode,
            clock,
            terrain_seed: params.seed,
        })
    }
}

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        let spawn = self.config.spawn.car;
        let terrain = Arc::new(RollingHills::new(
            spawn.longitude,
            spawn.latitude,
            TERRAIN_BASE_HEIGHT,
            self.terrain_seed,
        ));

        let queued = matches!(self.clock, SimulationClock::Fixed(_))
            .then(|| Arc::new(QueuedSpawner::new()));
        let spawner: Arc<dyn TaskSpawner> = match &queued {
            Some(queued) => Arc::clone(queued) as Arc<dyn TaskSpawner>,
            None => Arc::new(BevyTaskSpawner),
        };
        let env = Environment::new(Arc::new(HeadlessSceneHost::new()), terrain.clone(), spawner);

        let mut sim = Simulation::new(self.config.clone(), env);
        sim.camera_mut().set_mode(self.camera_mode);
        let commands = SimulationCommands(sim.commands());

        app.insert_resource(SimulationState {
            sim,
            queued,
            clock: self.clock,
            start: self.start,
            last_dt: None,
        })
        .insert_resource(commands)
        .insert_resource(TerrainSource(terrain))
        .init_resource::<TextInputFocus>()
        .add_message::<SimulationEvent>()
        .configure_sets(
            Update,
            (
                SimulationSystems::Input,
                SimulationSystems::Tick,
                SimulationSystems::Publish,
            )
                .chain(),
        )
        .add_systems(Startup, start_simulation)
        .add_systems(
            Update,
            (
                (sync_text_input_focus, forward_keyboard)
                    .chain()
                    .in_set(SimulationSystems::Input),
                tick_simulation.in_set(SimulationSystems::Tick),
                (publish_events, record_telemetry).in_set(SimulationSystems::Publish),
            ),
        );
    }
}

/// Ordering of the simulation's systems within `Update`.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum SimulationSystems {
    Input,
    Tick,
    Publish,
}

/// The running simulation.
#[derive(Resource)]
pub struct SimulationState {
    sim: Simulation,
    queued: Option<Arc<QueuedSpawner>>,
    clock: SimulationClock,
    start: VehicleKind,
    last_dt: Option<f64>,
}

impl SimulationState {
    pub fn sim(&self) -> &Simulation {
        &self.sim
    }

    pub fn sim_mut(&mut self) -> &mut Simulation {
        &mut self.sim
    }

    /// Delta applied by the most recent tick, if it advanced.
    pub fn last_dt(&self) -> Option<f64> {
        self.last_dt
    }
}

/// Sender for commands executed at the start of the next tick.
#[derive(Resource, Clone)]
pub struct SimulationCommands(pub async_channel::Sender<Command>);

impl SimulationCommands {
    pub fn send(&self, command: Command) {
        if self.0.try_send(command).is_err() {
            tracing::warn!("simulation command channel closed");
        }
    }
}

/// Set while a text field has keyboard focus; suppresses key bindings.
#[derive(Resource, Default)]
pub struct TextInputFocus(pub bool);

/// Terrain shared by the simulation and the renderer.
#[derive(Resource, Clone)]
pub struct TerrainSource(pub Arc<RollingHills>);

/// An event published by the simulation.
#[derive(Message, Clone, Debug)]
pub struct SimulationEvent(pub GameEvent);

/// Telemetry destination. Insert to record one CSV row per tick.
#[derive(Resource)]
pub struct SimulationTelemetry {
    output: Box<dyn TelemetryOutput>,
}

impl SimulationTelemetry {
    /// Wrap an output, writing the CSV header immediately.
    pub fn new(mut output: Box<dyn TelemetryOutput>) -> Self {
        reset_telemetry_to(output.as_mut());
        Self { output }
    }
}

fn start_simulation(mut state: ResMut<SimulationState>) {
    let start = state.start;
    state.sim.start_as(start);
}

fn forward_keyboard(keys: Option<Res<ButtonInput<KeyCode>>>, mut state: ResMut<SimulationState>) {
    let Some(keys) = keys else {
        return;
    };
    for key in keys.get_just_pressed() {
        state.sim.key_down(&format!("{key:?}"));
    }
    for key in keys.get_just_released() {
        state.sim.key_up(&format!("{key:?}"));
    }
}

fn sync_text_input_focus(focus: Res<TextInputFocus>, mut state: ResMut<SimulationState>) {
    if focus.is_changed() {
        state.sim.input_mut().set_text_input_focus(focus.0);
    }
}

fn tick_simulation(mut state: ResMut<SimulationState>) {
    let state = &mut *state;
    state.last_dt = match state.clock {
        SimulationClock::Realtime => state.sim.frame(Instant::now()),
        SimulationClock::Fixed(dt) => state.sim.advance(dt),
    };
    if let Some(queued) = &state.queued {
        queued.run_pending();
    }
}

fn publish_events(state: Res<SimulationState>, mut events: MessageWriter<SimulationEvent>) {
    for event in state.sim.bridge().drain() {
        if !matches!(event, GameEvent::VehicleStateChanged(_)) {
            tracing::info!(?event, "simulation event");
        }
        events.write(SimulationEvent(event));
    }
}

fn record_telemetry(
    state: Res<SimulationState>,
    telemetry: Option<ResMut<SimulationTelemetry>>,
) {
    let Some(mut telemetry) = telemetry else {
        return;
    };
    let Some(dt) = state.last_dt else {
        return;
    };
    if let Some(snapshot) = TelemetrySnapshot::capture(&state.sim, dt) {
        emit_telemetry_to(&snapshot, telemetry.output.as_mut());
    }
}

// ============================================================================
// View
// ============================================================================

/// Plugin that renders the simulation: terrain, vehicle placeholders and the
/// follow camera.
pub struct SimulationViewPlugin;

impl Plugin for SimulationViewPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, (setup_vehicle_assets, spawn_terrain))
            .add_systems(
                Update,
                (sync_vehicle_models, sync_camera).after(SimulationSystems::Publish),
            );
    }
}

/// Renders one simulated vehicle.
#[derive(Component, Debug)]
pub struct VehicleModel {
    pub id: VehicleId,
}

#[derive(Resource)]
struct VehicleAssets {
    car_mesh: Handle<Mesh>,
    car_material: Handle<StandardMaterial>,
    aircraft_mesh: Handle<Mesh>,
    aircraft_material: Handle<StandardMaterial>,
}

impl VehicleAssets {
    fn for_kind(&self, kind: VehicleKind) -> (Handle<Mesh>, Handle<StandardMaterial>) {
        match kind {
            VehicleKind::Car => (self.car_mesh.clone(), self.car_material.clone()),
            VehicleKind::Aircraft => (self.aircraft_mesh.clone(), self.aircraft_material.clone()),
        }
    }
}

fn setup_vehicle_assets(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    // Model axes are +X right, +Y forward, +Z up.
    commands.insert_resource(VehicleAssets {
        car_mesh: meshes.add(Cuboid::new(2.5, 6.0, 2.0)),
        car_material: materials.add(Color::srgb(0.75, 0.77, 0.8)),
        aircraft_mesh: meshes.add(Cuboid::new(10.0, 8.0, 1.5)),
        aircraft_material: materials.add(Color::srgb(0.85, 0.3, 0.2)),
    });
}

fn spawn_terrain(
    mut commands: Commands,
    terrain: Res<TerrainSource>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let centre = terrain.0.origin().with_height(TERRAIN_BASE_HEIGHT).to_ecef();
    let mesh = terrain_patch(
        &terrain.0,
        centre,
        TERRAIN_PATCH_HALF_EXTENT,
        TERRAIN_PATCH_RESOLUTION,
    );
    commands.spawn((
        Mesh3d(meshes.add(mesh)),
        MeshMaterial3d(materials.add(StandardMaterial {
            perceptual_roughness: 0.95,
            ..default()
        })),
        WorldPosition::from_dvec3(centre),
        Transform::default(),
    ));
    tracing::info!("terrain patch spawned");
}

fn sync_vehicle_models(
    mut commands: Commands,
    state: Res<SimulationState>,
    assets: Option<Res<VehicleAssets>>,
    mut models: Query<(Entity, &VehicleModel, &mut WorldPosition, &mut Transform)>,
) {
    let Some(assets) = assets else {
        return;
    };
    let mut matrices = state.sim.manager().model_matrices();

    for (entity, model, mut world_pos, mut transform) in &mut models {
        let Some(index) = matrices.iter().position(|(id, _, _)| *id == model.id) else {
            commands.entity(entity).despawn();
            continue;
        };
        let (_, _, matrix) = matrices.swap_remove(index);
        let (_, rotation, translation) = matrix.to_scale_rotation_translation();
        world_pos.position = translation;
        transform.rotation = rotation.as_quat();
    }

    for (id, kind, matrix) in matrices {
        let (_, rotation, translation) = matrix.to_scale_rotation_translation();
        let (mesh, material) = assets.for_kind(kind);
        tracing::debug!(vehicle = %id, %kind, "spawning vehicle model");
        commands.spawn((
            VehicleModel { id },
            Mesh3d(mesh),
            MeshMaterial3d(material),
            WorldPosition::from_dvec3(translation),
            Transform::from_rotation(rotation.as_quat()),
        ));
    }
}

fn sync_camera(
    state: Res<SimulationState>,
    mut cameras: Query<(&mut FloatingOriginCamera, &mut Transform)>,
) {
    let Some(placement) = state.sim.camera().placement() else {
        return;
    };
    let Ok((mut camera, mut transform)) = cameras.single_mut() else {
        return;
    };
    camera.position = placement.position;
    transform.rotation = Transform::IDENTITY
        .looking_to(placement.direction.as_vec3(), placement.up.as_vec3())
        .rotation;
}

/// ECEF position of the configured start point.
pub fn start_position(config: &SimConfig) -> DVec3 {
    config.spawn.car.geodetic().to_ecef()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f64 = 1.0 / 60.0;

    #[derive(Resource, Default)]
    struct SeenEvents(Vec<GameEvent>);

    fn collect_events(mut reader: MessageReader<SimulationEvent>, mut seen: ResMut<SeenEvents>) {
        seen.0.extend(reader.read().map(|event| event.0.clone()));
    }

    fn app() -> App {
        let mut app = App::new();
        app.add_plugins((
            MinimalPlugins,
            SimulationPlugin {
                config: SimConfig::default(),
                start: VehicleKind::Car,
                camera_mode: CameraMode::Chase,
                clock: SimulationClock::Fixed(DT),
                terrain_seed: 1,
            },
        ))
        .init_resource::<SeenEvents>()
        .add_systems(Update, collect_events.after(SimulationSystems::Publish));
        app
    }

    fn run(app: &mut App, frames: usize) {
        for _ in 0..frames {
            app.update();
        }
    }

    fn state(app: &App) -> &SimulationState {
        app.world().resource::<SimulationState>()
    }

    #[test]
    fn test_fixed_clock_drives_simulation() {
        let mut app = app();
        run(&mut app, 30);

        let state = state(&app);
        assert_eq!(
            state.sim().manager().active_vehicle().map(|v| v.kind()),
            Some(VehicleKind::Car)
        );
        assert_eq!(state.last_dt(), Some(DT));
        assert!((state.sim().time() - 30.0 * DT).abs() < 1.0e-9);

        let seen = &app.world().resource::<SeenEvents>().0;
        assert!(seen.contains(&GameEvent::VehicleKindChanged {
            kind: VehicleKind::Car
        }));
    }

    #[test]
    fn test_keyboard_reaches_simulation() {
        let mut app = app();
        app.init_resource::<ButtonInput<KeyCode>>();
        run(&mut app, 10);

        app.world_mut()
            .resource_mut::<ButtonInput<KeyCode>>()
            .press(KeyCode::KeyC);
        run(&mut app, 3);

        assert_eq!(state(&app).sim().camera().mode(), CameraMode::Chase2);
        let seen = &app.world().resource::<SeenEvents>().0;
        assert!(seen.contains(&GameEvent::CameraChanged {
            mode: CameraMode::Chase2
        }));
    }

    #[test]
    fn test_text_focus_suppresses_bindings() {
        let mut app = app();
        app.init_resource::<ButtonInput<KeyCode>>();
        run(&mut app, 10);

        app.world_mut().resource_mut::<TextInputFocus>().0 = true;
        app.world_mut()
            .resource_mut::<ButtonInput<KeyCode>>()
            .press(KeyCode::KeyC);
        run(&mut app, 3);

        assert_eq!(state(&app).sim().camera().mode(), CameraMode::Chase);
    }

    #[test]
    fn test_commands_resource() {
        let mut app = app();
        run(&mut app, 10);

        let commands = app.world().resource::<SimulationCommands>().clone();
        commands.send(Command::ToggleRoverMode);
        run(&mut app, 10);

        assert_eq!(
            state(&app).sim().manager().active_vehicle().map(|v| v.kind()),
            Some(VehicleKind::Aircraft)
        );
    }

    #[test]
    fn test_spawn_point_on_terrain() {
        let mut app = app();
        run(&mut app, 30);

        let terrain = app.world().resource::<TerrainSource>().0.clone();
        let position = state(&app).sim().vehicle_state().unwrap().position;
        // The car rests just above the sampled ground.
        let clearance = terrain.clearance(position);
        assert!(clearance > 0.0 && clearance < 5.0, "clearance {clearance}");
        assert!(start_position(&SimConfig::default()).length() > 6.0e6);
    }
}
