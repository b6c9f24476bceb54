//! Presentation-facing events and commands.
//!
//! The bridge polls the active vehicle at a fixed cadence and republishes its
//! state as discrete [`GameEvent`]s on a channel. Commands flow the other way
//! through [`Command`], executed by the simulation at the start of a tick.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::camera::CameraMode;
use crate::game_loop::Updatable;
use crate::manager::ActiveVehicleView;
use crate::vehicle::{VehicleKind, VehicleState};

/// Events buffered before the oldest unread ones are dropped.
pub const EVENT_CAPACITY: usize = 1024;

/// Bridge tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Time between state polls (s).
    pub interval: f64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            interval: 1.0 / 60.0,
        }
    }
}

/// Kinematic state as shown to the presentation layer.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct VehicleStateData {
    pub speed: f64,
    pub velocity: f64,
    /// ECEF position (m).
    pub position: DVec3,
    pub heading: f64,
    pub pitch: f64,
    pub roll: f64,
}

impl From<&VehicleState> for VehicleStateData {
    fn from(state: &VehicleState) -> Self {
        Self {
            speed: state.speed,
            velocity: state.velocity,
            position: state.position,
            heading: state.heading,
            pitch: state.pitch,
            roll: state.roll,
        }
    }
}

/// Events published to the presentation layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum GameEvent {
    VehicleStateChanged(VehicleStateData),
    /// `true` when the aircraft crashes, `false` once it is reset.
    Crashed { crashed: bool },
    CameraChanged { mode: CameraMode },
    RoverModeChanged { enabled: bool },
    VehicleKindChanged { kind: VehicleKind },
    CollisionDetectionChanged { enabled: bool },
    LocationChanged {
        longitude: f64,
        latitude: f64,
        altitude: f64,
    },
}

/// Requests from the presentation layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Command {
    SwitchCamera,
    /// Swap between the ground vehicle and the aircraft.
    ToggleRoverMode,
    /// Toggle ground-following on the ground vehicle.
    ToggleGroundFollowing,
    ToggleCollisionDetection,
    TeleportTo {
        longitude: f64,
        latitude: f64,
        altitude: f64,
        /// Heading clockwise from north (degrees).
        #[serde(default)]
        heading_deg: f64,
    },
    /// Return a crashed aircraft to the spawn point.
    Restart,
}

/// Polls the active vehicle and publishes events.
pub struct GameBridge {
    config: BridgeConfig,
    view: ActiveVehicleView,
    tx: async_channel::Sender<GameEvent>,
    rx: async_channel::Receiver<GameEvent>,
    accumulator: f64,
    crashed: bool,
    kind: Option<VehicleKind>,
}

impl GameBridge {
    pub fn new(config: BridgeConfig, view: ActiveVehicleView) -> Self {
        let (tx, rx) = async_channel::bounded(EVENT_CAPACITY);
        Self {
            config,
            view,
            tx,
            rx,
            accumulator: 0.0,
            crashed: false,
            kind: None,
        }
    }

    /// Receiver for published events.
    pub fn events(&self) -> async_channel::Receiver<GameEvent> {
        self.rx.clone()
    }

    /// Take every event published so far.
    pub fn drain(&self) -> Vec<GameEvent> {
        std::iter::from_fn(|| self.rx.try_recv().ok()).collect()
    }

    /// Publish an event, dropping the oldest one if nobody is reading.
    pub fn emit(&self, event: GameEvent) {
        if let Err(async_channel::TrySendError::Full(event)) = self.tx.try_send(event) {
            tracing::debug!("event queue full, dropping oldest event");
            let _ = self.rx.try_recv();
            let _ = self.tx.try_send(event);
        }
    }

    /// Current state of the active vehicle, if any.
    pub fn vehicle_state(&self) -> Option<VehicleStateData> {
        self.view
            .get()
            .map(|active| VehicleStateData::from(&active.state))
    }

    /// Publish the active vehicle's state now.
    pub fn poll(&mut self) {
        let Some(active) = self.view.get() else {
            return;
        };

        if self.kind != Some(active.kind) {
            self.kind = Some(active.kind);
            self.emit(GameEvent::VehicleKindChanged { kind: active.kind });
        }

        self.emit(GameEvent::VehicleStateChanged(VehicleStateData::from(
            &active.state,
        )));

        self.report_crash(active.crashed);
    }

    /// Publish a crash state change. Repeated reports of the same state are
    /// ignored.
    pub fn report_crash(&mut self, crashed: bool) {
        if crashed != self.crashed {
            self.crashed = crashed;
            self.emit(GameEvent::Crashed { crashed });
        }
    }
}

impl Updatable for GameBridge {
    fn update(&mut self, dt: f64) {
        self.accumulator += dt;
        // Small tolerance so a frame delta equal to the interval always fires.
        if self.accumulator + 1.0e-9 < self.config.interval {
            return;
        }
        // Never emit a burst to catch up after a long frame.
        self.accumulator = (self.accumulator - self.config.interval).min(self.config.interval);
        self.poll();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Geodetic;
    use crate::manager::ActiveVehicle;
    use crate::vehicle::VehicleId;

    fn active(kind: VehicleKind, crashed: bool) -> ActiveVehicle {
        ActiveVehicle {
            id: VehicleId::new("v"),
            kind,
            state: VehicleState::at(Geodetic::new(11.9746, 57.7089, 100.0).to_ecef(), 0.0),
            rover_mode: false,
            collision_enabled: true,
            crashed,
        }
    }

    fn count_state_events(events: &[GameEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, GameEvent::VehicleStateChanged(_)))
            .count()
    }

    #[test]
    fn test_polls_at_cadence() {
        let view = ActiveVehicleView::default();
        view.set(Some(active(VehicleKind::Car, false)));
        let mut bridge = GameBridge::new(BridgeConfig { interval: 0.05 }, view);

        for _ in 0..10 {
            bridge.update(0.01);
        }
        assert_eq!(count_state_events(&bridge.drain()), 2);
    }

    #[test]
    fn test_no_active_vehicle_is_silent() {
        let mut bridge = GameBridge::new(BridgeConfig::default(), ActiveVehicleView::default());
        bridge.update(1.0);
        assert!(bridge.drain().is_empty());
        assert!(bridge.vehicle_state().is_none());
    }

    #[test]
    fn test_crash_is_edge_triggered() {
        let view = ActiveVehicleView::default();
        view.set(Some(active(VehicleKind::Aircraft, false)));
        let mut bridge = GameBridge::new(BridgeConfig::default(), view.clone());
        bridge.poll();

        view.set(Some(active(VehicleKind::Aircraft, true)));
        bridge.poll();
        bridge.poll();
        view.set(Some(active(VehicleKind::Aircraft, false)));
        bridge.poll();

        let crashes: Vec<bool> = bridge
            .drain()
            .into_iter()
            .filter_map(|e| match e {
                GameEvent::Crashed { crashed } => Some(crashed),
                _ => None,
            })
            .collect();
        assert_eq!(crashes, vec![true, false]);
    }

    #[test]
    fn test_kind_change_reported_once() {
        let view = ActiveVehicleView::default();
        view.set(Some(active(VehicleKind::Car, false)));
        let mut bridge = GameBridge::new(BridgeConfig::default(), view.clone());
        bridge.poll();
        bridge.poll();
        view.set(Some(active(VehicleKind::Aircraft, false)));
        bridge.poll();

        let kinds: Vec<VehicleKind> = bridge
            .drain()
            .into_iter()
            .filter_map(|e| match e {
                GameEvent::VehicleKindChanged { kind } => Some(kind),
                _ => None,
            })
            .collect();
        assert_eq!(kinds, vec![VehicleKind::Car, VehicleKind::Aircraft]);
    }

    #[test]
    fn test_full_queue_drops_oldest() {
        let bridge = GameBridge::new(BridgeConfig::default(), ActiveVehicleView::default());
        for i in 0..=EVENT_CAPACITY {
            bridge.emit(GameEvent::RoverModeChanged { enabled: i % 2 == 0 });
        }
        let events = bridge.drain();
        assert_eq!(events.len(), EVENT_CAPACITY);
        // Event 0 was dropped; event 1 is now first.
        assert_eq!(events[0], GameEvent::RoverModeChanged { enabled: false });
    }

    #[test]
    fn test_wire_format() {
        let event = GameEvent::CollisionDetectionChanged { enabled: true };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": "collisionDetectionChanged", "enabled": true })
        );

        let command: Command = serde_json::from_str(
            r#"{"type":"teleportTo","longitude":2.35,"latitude":48.85,"altitude":120}"#,
        )
        .unwrap();
        assert_eq!(
            command,
            Command::TeleportTo {
                longitude: 2.35,
                latitude: 48.85,
                altitude: 120.0,
                heading_deg: 0.0,
            }
        );

        let camera = serde_json::to_value(GameEvent::CameraChanged {
            mode: CameraMode::FirstPerson,
        })
        .unwrap();
        assert_eq!(camera["mode"], "firstPerson");
    }
}
