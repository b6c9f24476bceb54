//! The simulation façade: owns every component and runs one frame at a time.

use web_time::Instant;

use crate::bridge::{Command, GameBridge, GameEvent, VehicleStateData};
use crate::camera::CameraManager;
use crate::config::{SimConfig, SpawnPoint};
use crate::game_loop::{GameLoop, Updatable};
use crate::geo;
use crate::host::Environment;
use crate::input::{Action, InputManager};
use crate::manager::VehicleManager;
use crate::vehicle::{Aircraft, Cybertruck, Vehicle, VehicleId, VehicleKind, VehicleState};

/// Id of the ground vehicle.
pub const CAR_ID: &str = "cybertruck";
/// Id of the aircraft.
pub const AIRCRAFT_ID: &str = "aircraft";

/// One-shot actions and the command each one queues.
const ACTION_COMMANDS: [(Action, Command); 4] = [
    (Action::SwitchCamera, Command::SwitchCamera),
    (Action::ToggleRoverMode, Command::ToggleRoverMode),
    (Action::ToggleGroundFollowing, Command::ToggleGroundFollowing),
    (Action::ToggleCollision, Command::ToggleCollisionDetection),
];

/// Everything needed to run the game, minus the renderer.
pub struct Simulation {
    config: SimConfig,
    env: Environment,
    input: InputManager,
    manager: VehicleManager,
    camera: CameraManager,
    bridge: GameBridge,
    game_loop: GameLoop,
    command_tx: async_channel::Sender<Command>,
    command_rx: async_channel::Receiver<Command>,
    time: f64,
}

impl Simulation {
    pub fn new(config: SimConfig, env: Environment) -> Self {
        let manager = VehicleManager::new(env.clone(), config.manager.clone());
        let view = manager.view();
        let camera = CameraManager::new(config.camera.clone(), view.clone());
        let bridge = GameBridge::new(config.bridge.clone(), view);
        let (command_tx, command_rx) = async_channel::unbounded();

        let mut input = InputManager::new(config.bindings.clone());
        for (action, command) in ACTION_COMMANDS {
            let tx = command_tx.clone();
            input.on_input(
                action,
                Box::new(move |pressed| {
                    if pressed {
                        let _ = tx.try_send(command.clone());
                    }
                }),
            );
        }

        Self {
            game_loop: GameLoop::new(config.game_loop.max_frame_dt),
            config,
            env,
            input,
            manager,
            camera,
            bridge,
            command_tx,
            command_rx,
            time: 0.0,
        }
    }

    /// Spawn the ground vehicle at the configured start point.
    pub fn start(&mut self) {
        self.start_as(VehicleKind::Car);
    }

    /// Spawn a vehicle of `kind` at the configured start point.
    pub fn start_as(&mut self, kind: VehicleKind) {
        let spawn = self.config.spawn.car;
        tracing::info!(
            longitude = spawn.longitude,
            latitude = spawn.latitude,
            altitude = spawn.altitude,
            %kind,
            "starting simulation"
        );
        match kind {
            VehicleKind::Car => self.spawn_car(state_at(&spawn)),
            VehicleKind::Aircraft => self.spawn_aircraft(state_at(&spawn)),
        }
    }

    pub fn spawn_car(&mut self, state: VehicleState) {
        let car = Cybertruck::new(
            VehicleId::new(CAR_ID),
            self.config.car.clone(),
            state,
            &self.env,
        );
        self.manager.add_vehicle(car.into(), true);
    }

    pub fn spawn_aircraft(&mut self, state: VehicleState) {
        let aircraft = Aircraft::new(
            VehicleId::new(AIRCRAFT_ID),
            self.config.aircraft.clone(),
            state,
        );
        self.manager.add_vehicle(aircraft.into(), true);
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn input(&self) -> &InputManager {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut InputManager {
        &mut self.input
    }

    pub fn manager(&self) -> &VehicleManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut VehicleManager {
        &mut self.manager
    }

    pub fn camera(&self) -> &CameraManager {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut CameraManager {
        &mut self.camera
    }

    pub fn bridge(&self) -> &GameBridge {
        &self.bridge
    }

    /// Sender for commands executed at the start of the next frame.
    pub fn commands(&self) -> async_channel::Sender<Command> {
        self.command_tx.clone()
    }

    /// Receiver for published events.
    pub fn events(&self) -> async_channel::Receiver<GameEvent> {
        self.bridge.events()
    }

    /// Simulated time (s).
    pub fn time(&self) -> f64 {
        self.time
    }

    /// State of the active vehicle.
    pub fn vehicle_state(&self) -> Option<VehicleStateData> {
        self.bridge.vehicle_state()
    }

    pub fn key_down(&mut self, key: &str) -> bool {
        self.input.key_down(key)
    }

    pub fn key_up(&mut self, key: &str) -> bool {
        self.input.key_up(key)
    }

    /// Run one frame timed by the wall clock.
    pub fn frame(&mut self, now: Instant) -> Option<f64> {
        self.begin_frame();
        let mut systems: [&mut dyn Updatable; 3] =
            [&mut self.manager, &mut self.camera, &mut self.bridge];
        let dt = self.game_loop.tick(now, &mut systems);
        self.end_frame(dt)
    }

    /// Run one frame with an explicit delta.
    pub fn advance(&mut self, raw_dt: f64) -> Option<f64> {
        self.begin_frame();
        let mut systems: [&mut dyn Updatable; 3] =
            [&mut self.manager, &mut self.camera, &mut self.bridge];
        let dt = self.game_loop.step(raw_dt, &mut systems);
        self.end_frame(dt)
    }

    fn begin_frame(&mut self) {
        self.manager.set_input(self.input.snapshot());
        while let Ok(command) = self.command_rx.try_recv() {
            self.execute(command);
        }
    }

    fn end_frame(&mut self, dt: Option<f64>) -> Option<f64> {
        self.input.end_frame();
        if let Some(dt) = dt {
            self.time += dt;
        }
        dt
    }

    /// Execute a command immediately.
    pub fn execute(&mut self, command: Command) {
        tracing::debug!(?command, "command");
        match command {
            Command::SwitchCamera => self.apply_switch_camera(),
            Command::ToggleRoverMode => self.apply_toggle_rover_mode(),
            Command::ToggleGroundFollowing => self.apply_toggle_ground_following(),
            Command::ToggleCollisionDetection => self.apply_toggle_collision_detection(),
            Command::TeleportTo {
                longitude,
                latitude,
                altitude,
                heading_deg,
            } => self.apply_teleport(SpawnPoint {
                longitude,
                latitude,
                altitude,
                heading_deg,
            }),
            Command::Restart => self.apply_restart(),
        }
        self.manager.publish();
    }

    pub fn switch_camera(&mut self) {
        self.execute(Command::SwitchCamera);
    }

    /// Swap the active vehicle for the other kind at the same place.
    pub fn toggle_rover_mode(&mut self) {
        self.execute(Command::ToggleRoverMode);
    }

    /// Flip the ground vehicle between ground-following and free mode.
    pub fn toggle_ground_following(&mut self) {
        self.execute(Command::ToggleGroundFollowing);
    }

    pub fn toggle_collision_detection(&mut self) {
        self.execute(Command::ToggleCollisionDetection);
    }

    /// Move the active vehicle, stopping it and levelling its attitude.
    pub fn teleport_to(&mut self, longitude: f64, latitude: f64, altitude: f64, heading_deg: f64) {
        self.execute(Command::TeleportTo {
            longitude,
            latitude,
            altitude,
            heading_deg,
        });
    }

    /// Return a crashed aircraft to the restart point. Does nothing otherwise.
    pub fn restart(&mut self) {
        self.execute(Command::Restart);
    }

    fn apply_switch_camera(&mut self) {
        let mode = self.camera.switch_camera();
        self.bridge.emit(GameEvent::CameraChanged { mode });
    }

    fn apply_toggle_rover_mode(&mut self) {
        let Some(active) = self.manager.active_vehicle() else {
            return;
        };
        let id = active.id().clone();
        let kind = active.kind();
        let state = *active.state();

        self.manager.remove_vehicle(&id);
        match kind {
            VehicleKind::Car => {
                let height = geo::height_of(state.position) + self.config.spawn.aircraft_lift;
                tracing::info!("switching to aircraft");
                self.spawn_aircraft(VehicleState::at(
                    geo::with_height(state.position, height),
                    state.heading,
                ));
                self.bridge
                    .emit(GameEvent::RoverModeChanged { enabled: false });
            }
            VehicleKind::Aircraft => {
                tracing::info!("switching to ground vehicle");
                self.spawn_car(VehicleState::at(state.position, state.heading));
                self.bridge.emit(GameEvent::RoverModeChanged {
                    enabled: self.config.car.rover_mode,
                });
            }
        }
    }

    fn apply_toggle_ground_following(&mut self) {
        let Some(car) = self
            .manager
            .active_vehicle_mut()
            .and_then(Vehicle::as_car_mut)
        else {
            return;
        };
        let enabled = car.toggle_rover_mode();
        self.bridge.emit(GameEvent::RoverModeChanged { enabled });
    }

    fn apply_toggle_collision_detection(&mut self) {
        let Some(vehicle) = self.manager.active_vehicle_mut() else {
            return;
        };
        let enabled = !vehicle.collision_enabled();
        vehicle.set_collision_enabled(enabled);
        tracing::info!(vehicle = %vehicle.id(), enabled, "collision detection changed");
        self.bridge
            .emit(GameEvent::CollisionDetectionChanged { enabled });
    }

    fn apply_teleport(&mut self, point: SpawnPoint) {
        let Some(vehicle) = self.manager.active_vehicle_mut() else {
            return;
        };
        vehicle.set_state(state_at(&point));
        tracing::info!(
            vehicle = %vehicle.id(),
            longitude = point.longitude,
            latitude = point.latitude,
            altitude = point.altitude,
            "teleported"
        );
        self.bridge.emit(GameEvent::LocationChanged {
            longitude: point.longitude,
            latitude: point.latitude,
            altitude: point.altitude,
        });
    }

    fn apply_restart(&mut self) {
        let restart = self.config.spawn.restart;
        let Some(aircraft) = self
            .manager
            .active_vehicle_mut()
            .and_then(Vehicle::as_aircraft_mut)
        else {
            return;
        };
        if !aircraft.is_crashed() {
            return;
        }
        aircraft.reset_crash();

        let Some(vehicle) = self.manager.active_vehicle_mut() else {
            return;
        };
        vehicle.set_state(state_at(&restart));
        self.bridge.report_crash(false);
    }
}

fn state_at(point: &SpawnPoint) -> VehicleState {
    VehicleState::at(point.geodetic().to_ecef(), point.heading_deg.to_radians())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraMode;
    use crate::geo::Geodetic;
    use crate::host::testing::{FlatTerrain, TestHost};

    const DT: f64 = 1.0 / 60.0;

    fn started(host: &TestHost) -> Simulation {
        let mut sim = Simulation::new(SimConfig::default(), host.env());
        sim.start();
        run(&mut sim, host, 10);
        sim
    }

    fn run(sim: &mut Simulation, host: &TestHost, frames: usize) {
        for _ in 0..frames {
            sim.advance(DT);
            host.run();
        }
    }

    fn active_kind(sim: &Simulation) -> Option<VehicleKind> {
        sim.manager().active_vehicle().map(Vehicle::kind)
    }

    #[test]
    fn test_start_activates_car() {
        let host = TestHost::new(FlatTerrain::new(40.0));
        let mut sim = started(&host);
        assert_eq!(active_kind(&sim), Some(VehicleKind::Car));

        let events = sim.bridge().drain();
        assert!(events.contains(&GameEvent::VehicleKindChanged {
            kind: VehicleKind::Car
        }));
        assert!(
            events
                .iter()
                .any(|e| matches!(e, GameEvent::VehicleStateChanged(_)))
        );

        // Rover mode settles on the sampled ground.
        run(&mut sim, &host, 5);
        let height = sim.vehicle_state().unwrap().position;
        assert!((geo::height_of(height) - 40.5).abs() < 1.0e-3);
        assert!(sim.camera().placement().is_some());
    }

    #[test]
    fn test_start_as_aircraft() {
        let host = TestHost::new(FlatTerrain::new(40.0));
        let mut sim = Simulation::new(SimConfig::default(), host.env());
        sim.start_as(VehicleKind::Aircraft);
        run(&mut sim, &host, 10);

        assert_eq!(active_kind(&sim), Some(VehicleKind::Aircraft));
        let height = geo::height_of(sim.vehicle_state().unwrap().position);
        assert!(height > 40.0);
    }

    #[test]
    fn test_held_key_pulses_once() {
        let host = TestHost::new(FlatTerrain::new(0.0));
        let mut sim = started(&host);
        sim.bridge().drain();

        assert!(sim.key_down("KeyC"));
        run(&mut sim, &host, 5);
        // Auto-repeat while held.
        sim.key_down("KeyC");
        run(&mut sim, &host, 5);
        sim.key_up("KeyC");

        let camera_events = |sim: &Simulation| {
            sim.bridge()
                .drain()
                .into_iter()
                .filter(|e| matches!(e, GameEvent::CameraChanged { .. }))
                .count()
        };
        assert_eq!(camera_events(&sim), 1);
        assert_eq!(sim.camera().mode(), CameraMode::Chase2);

        sim.key_down("KeyC");
        run(&mut sim, &host, 1);
        sim.key_up("KeyC");
        assert_eq!(camera_events(&sim), 1);
        assert_eq!(sim.camera().mode(), CameraMode::FirstPerson);
    }

    #[test]
    fn test_text_focus_blocks_commands() {
        let host = TestHost::new(FlatTerrain::new(0.0));
        let mut sim = started(&host);
        sim.input_mut().set_text_input_focus(true);
        assert!(!sim.key_down("KeyC"));
        run(&mut sim, &host, 2);
        assert_eq!(sim.camera().mode(), CameraMode::Chase);
    }

    #[test]
    fn test_teleport_resets_motion() {
        let host = TestHost::new(FlatTerrain::new(0.0));
        let mut sim = started(&host);
        sim.key_down("KeyW");
        run(&mut sim, &host, 30);
        sim.key_up("KeyW");
        assert!(sim.vehicle_state().unwrap().speed > 0.0);

        sim.teleport_to(2.2945, 48.8584, 35.0, 90.0);
        let state = sim.vehicle_state().unwrap();
        assert_eq!(
            state.position,
            Geodetic::new(2.2945, 48.8584, 35.0).to_ecef()
        );
        assert!((state.heading - std::f64::consts::FRAC_PI_2).abs() < 1.0e-12);
        assert_eq!(
            (state.velocity, state.speed, state.pitch, state.roll),
            (0.0, 0.0, 0.0, 0.0)
        );
        assert!(sim.bridge().drain().contains(&GameEvent::LocationChanged {
            longitude: 2.2945,
            latitude: 48.8584,
            altitude: 35.0,
        }));
    }

    #[test]
    fn test_swap_to_aircraft_and_back() {
        let host = TestHost::new(FlatTerrain::new(0.0));
        let mut sim = started(&host);
        let car_state = sim.vehicle_state().unwrap();

        sim.key_down("KeyM");
        run(&mut sim, &host, 10);
        sim.key_up("KeyM");
        assert_eq!(active_kind(&sim), Some(VehicleKind::Aircraft));
        assert_eq!(sim.manager().len(), 1);
        assert_eq!(host.scene.live_count(), 1);

        let aircraft_height = geo::height_of(sim.vehicle_state().unwrap().position);
        assert!(aircraft_height > geo::height_of(car_state.position) + 40.0);

        sim.commands().try_send(Command::ToggleRoverMode).unwrap();
        run(&mut sim, &host, 10);
        assert_eq!(active_kind(&sim), Some(VehicleKind::Car));
        assert_eq!(host.scene.live_count(), 1);
    }

    #[test]
    fn test_ground_following_toggle() {
        let host = TestHost::new(FlatTerrain::new(0.0));
        let mut sim = started(&host);
        sim.bridge().drain();

        sim.key_down("KeyN");
        run(&mut sim, &host, 1);
        sim.key_up("KeyN");
        assert!(!sim.manager().active_vehicle().unwrap().rover_mode());
        assert!(
            sim.bridge()
                .drain()
                .contains(&GameEvent::RoverModeChanged { enabled: false })
        );
    }

    #[test]
    fn test_collision_toggle_reports_new_value() {
        let host = TestHost::new(FlatTerrain::new(0.0));
        let mut sim = started(&host);
        sim.bridge().drain();

        sim.toggle_collision_detection();
        assert!(!sim.manager().active_vehicle().unwrap().collision_enabled());
        sim.toggle_collision_detection();
        let toggles: Vec<GameEvent> = sim
            .bridge()
            .drain()
            .into_iter()
            .filter(|e| matches!(e, GameEvent::CollisionDetectionChanged { .. }))
            .collect();
        assert_eq!(
            toggles,
            vec![
                GameEvent::CollisionDetectionChanged { enabled: false },
                GameEvent::CollisionDetectionChanged { enabled: true },
            ]
        );
    }

    #[test]
    fn test_crash_then_restart() {
        let host = TestHost::new(FlatTerrain::new(100.0));
        let mut sim = Simulation::new(SimConfig::default(), host.env());
        sim.spawn_aircraft(VehicleState::at(
            Geodetic::new(11.9746, 57.7089, 100.2).to_ecef(),
            0.0,
        ));
        host.run();
        run(&mut sim, &host, 3);
        assert!(sim.manager().active_vehicle().unwrap().is_crashed());

        let events = sim.bridge().drain();
        assert!(events.contains(&GameEvent::Crashed { crashed: true }));

        sim.execute(Command::Restart);
        let state = sim.vehicle_state().unwrap();
        assert!((geo::height_of(state.position) - 200.0).abs() < 1.0e-6);
        assert!(!sim.manager().active_vehicle().unwrap().is_crashed());
        assert_eq!(
            sim.bridge().drain(),
            vec![GameEvent::Crashed { crashed: false }]
        );
    }

    #[test]
    fn test_restart_ignored_when_not_crashed() {
        let host = TestHost::new(FlatTerrain::new(0.0));
        let mut sim = started(&host);
        let before = sim.vehicle_state().unwrap();
        sim.restart();
        assert_eq!(sim.vehicle_state().unwrap(), before);
    }
}
