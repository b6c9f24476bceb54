//! Camera modes and placement relative to the active vehicle.
//!
//! Placement is recomputed from scratch every tick with no smoothing, so the
//! camera is rigidly attached to the vehicle in every mode.

use std::fmt;

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::game_loop::Updatable;
use crate::geo::{self, EnuFrame};
use crate::manager::{ActiveVehicle, ActiveVehicleView};
use crate::vehicle::{VehicleKind, VehicleState};

// ============================================================================
// Modes and rigs
// ============================================================================

/// Camera mode. Cycles `FirstPerson -> Chase -> Chase2 -> FirstPerson`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CameraMode {
    FirstPerson,
    #[default]
    Chase,
    Chase2,
}

impl CameraMode {
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            CameraMode::FirstPerson => CameraMode::Chase,
            CameraMode::Chase => CameraMode::Chase2,
            CameraMode::Chase2 => CameraMode::FirstPerson,
        }
    }
}

impl fmt::Display for CameraMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraMode::FirstPerson => f.write_str("firstPerson"),
            CameraMode::Chase => f.write_str("chase"),
            CameraMode::Chase2 => f.write_str("chase2"),
        }
    }
}

/// Eye position in the vehicle's model frame (+X right, +Y forward, +Z up).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirstPersonRig {
    pub right: f64,
    pub forward: f64,
    pub up: f64,
}

impl Default for FirstPersonRig {
    fn default() -> Self {
        Self {
            right: 0.0,
            forward: 3.0,
            up: 1.5,
        }
    }
}

/// Heading/pitch/range look-at behind the vehicle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChaseRig {
    /// Distance from the target (m).
    pub range: f64,
    /// Camera pitch, negative looks down (degrees).
    pub pitch_deg: f64,
}

impl ChaseRig {
    /// Rig equivalent to sitting `back` meters behind and `up` meters above.
    pub fn from_offset(back: f64, up: f64) -> Self {
        Self {
            range: back.hypot(up),
            pitch_deg: -up.atan2(back).to_degrees(),
        }
    }
}

impl Default for ChaseRig {
    fn default() -> Self {
        Self::from_offset(15.0, 5.0)
    }
}

/// All camera rigs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub first_person: FirstPersonRig,
    pub chase: ChaseRig,
    pub chase2: ChaseRig,
    /// Single follow rig used while the active vehicle is an aircraft.
    pub aircraft: ChaseRig,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            first_person: FirstPersonRig::default(),
            chase: ChaseRig::from_offset(15.0, 5.0),
            chase2: ChaseRig::from_offset(100.0, 20.0),
            aircraft: ChaseRig {
                range: 80.0,
                pitch_deg: -25.0,
            },
        }
    }
}

// ============================================================================
// Placement
// ============================================================================

/// Where the camera is and where it looks, in ECEF.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraPlacement {
    pub position: DVec3,
    /// Unit view direction.
    pub direction: DVec3,
    /// Unit up vector, orthogonal to `direction`.
    pub up: DVec3,
    /// Camera heading (rad).
    pub heading: f64,
    /// Camera pitch (rad).
    pub pitch: f64,
    /// Camera roll (rad).
    pub roll: f64,
}

/// Eye placement inside the vehicle, looking along its forward axis.
pub fn first_person_placement(rig: &FirstPersonRig, state: &VehicleState) -> CameraPlacement {
    let rotation = geo::world_rotation(state.position, state.heading, state.pitch, state.roll);
    CameraPlacement {
        position: state.position + rotation * DVec3::new(rig.right, rig.forward, rig.up),
        direction: rotation * DVec3::Y,
        up: rotation * DVec3::Z,
        heading: state.heading,
        pitch: state.pitch,
        roll: state.roll,
    }
}

/// Look-at placement behind and above the vehicle.
pub fn chase_placement(rig: &ChaseRig, state: &VehicleState) -> CameraPlacement {
    let frame = EnuFrame::from_ecef(state.position);
    let pitch = rig.pitch_deg.to_radians();
    let (sin_p, cos_p) = pitch.sin_cos();
    let direction = (frame.forward(state.heading) * cos_p + frame.up * sin_p).normalize();
    let up = (frame.up - direction * frame.up.dot(direction)).normalize_or(frame.up);

    CameraPlacement {
        position: state.position - direction * rig.range,
        direction,
        up,
        heading: state.heading,
        pitch,
        roll: 0.0,
    }
}

// ============================================================================
// Manager
// ============================================================================

/// Tracks the camera mode and places the camera each tick.
pub struct CameraManager {
    config: CameraConfig,
    mode: CameraMode,
    view: ActiveVehicleView,
    placement: Option<CameraPlacement>,
}

impl CameraManager {
    pub fn new(config: CameraConfig, view: ActiveVehicleView) -> Self {
        Self {
            config,
            mode: CameraMode::default(),
            view,
            placement: None,
        }
    }

    /// The selected mode for ground vehicles.
    pub fn mode(&self) -> CameraMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: CameraMode) {
        self.mode = mode;
    }

    /// The mode actually in use for the active vehicle.
    pub fn effective_mode(&self) -> CameraMode {
        match self.view.get() {
            Some(active) if active.kind == VehicleKind::Aircraft => CameraMode::Chase,
            _ => self.mode,
        }
    }

    /// Advance to the next mode. Has no effect while following an aircraft.
    pub fn switch_camera(&mut self) -> CameraMode {
        let following_aircraft = self
            .view
            .get()
            .is_some_and(|active| active.kind == VehicleKind::Aircraft);
        if !following_aircraft {
            self.mode = self.mode.next();
            tracing::info!(mode = %self.mode, "camera mode changed");
        }
        self.effective_mode()
    }

    /// Last computed placement.
    pub fn placement(&self) -> Option<CameraPlacement> {
        self.placement
    }

    fn place(&self, active: &ActiveVehicle) -> CameraPlacement {
        if active.kind == VehicleKind::Aircraft {
            return chase_placement(&self.config.aircraft, &active.state);
        }
        match self.mode {
            CameraMode::FirstPerson => {
                first_person_placement(&self.config.first_person, &active.state)
            }
            CameraMode::Chase => chase_placement(&self.config.chase, &active.state),
            CameraMode::Chase2 => chase_placement(&self.config.chase2, &active.state),
        }
    }
}

impl Updatable for CameraManager {
    fn update(&mut self, _dt: f64) {
        let Some(active) = self.view.get() else {
            return;
        };
        self.placement = Some(self.place(&active));
    }
}
