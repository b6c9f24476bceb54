//! Two-point terrain probing for ground contact and forward obstructions.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::geo::{self, EnuFrame};
use crate::host::{ModelHandle, TerrainQuery};

/// Probe geometry and cadence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Distance ahead of the vehicle for the obstruction sample (m).
    pub forward_distance: f64,
    /// Vehicle height at or below ground + this counts as grounded (m).
    pub ground_epsilon: f64,
    /// Terrain ahead higher than the vehicle by more than this is an obstruction (m).
    pub obstruction_threshold: f64,
    /// Distance the ground vehicle is pushed back on an obstruction (m).
    pub bounce_distance: f64,
    /// Run the probe every this many ticks.
    pub interval_ticks: u32,
}

impl ProbeConfig {
    /// Defaults for the ground vehicle.
    pub fn ground_vehicle() -> Self {
        Self {
            forward_distance: 1.0,
            ground_epsilon: 0.0,
            obstruction_threshold: 1.0,
            bounce_distance: 0.3,
            interval_ticks: 4,
        }
    }

    /// Defaults for the aircraft.
    pub fn aircraft() -> Self {
        Self {
            forward_distance: 2.0,
            ground_epsilon: 0.5,
            obstruction_threshold: 0.5,
            bounce_distance: 0.0,
            interval_ticks: 8,
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self::ground_vehicle()
    }
}

/// Outcome of one probe.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ProbeResult {
    /// Vehicle is at or below the surface.
    pub grounded: bool,
    /// Terrain ahead rises above the vehicle.
    pub obstruction_ahead: bool,
    /// Surface height beneath the vehicle, when known.
    pub ground_height: Option<f64>,
}

impl ProbeResult {
    pub fn any(&self) -> bool {
        self.grounded || self.obstruction_ahead
    }
}

/// Rate-limited collision probe owned by one vehicle.
#[derive(Clone, Debug)]
pub struct CollisionProbe {
    config: ProbeConfig,
    enabled: bool,
    countdown: u32,
}

impl CollisionProbe {
    pub fn new(config: ProbeConfig) -> Self {
        Self {
            config,
            enabled: true,
            countdown: 0,
        }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.countdown = 0;
    }

    /// Run the probe if it is due this tick.
    ///
    /// Returns `None` when the probe is disabled or skipped for rate limiting.
    pub fn check(
        &mut self,
        terrain: &dyn TerrainQuery,
        position: DVec3,
        heading: f64,
        exclude: &[ModelHandle],
    ) -> Option<ProbeResult> {
        if !self.enabled {
            return None;
        }
        if self.countdown > 0 {
            self.countdown -= 1;
            return None;
        }
        self.countdown = self.config.interval_ticks.saturating_sub(1);

        Some(probe(&self.config, terrain, position, heading, exclude))
    }
}

/// Sample the terrain beneath and ahead of `position`.
pub fn probe(
    config: &ProbeConfig,
    terrain: &dyn TerrainQuery,
    position: DVec3,
    heading: f64,
    exclude: &[ModelHandle],
) -> ProbeResult {
    let height = geo::height_of(position);

    let ground_height = terrain
        .clamp_to_height(position, exclude)
        .map(geo::height_of);
    let grounded = ground_height.is_some_and(|ground| height <= ground + config.ground_epsilon);

    let frame = EnuFrame::from_ecef(position);
    let ahead = position + frame.forward(heading) * config.forward_distance;
    let obstruction_ahead = terrain
        .clamp_to_height(ahead, exclude)
        .map(geo::height_of)
        .is_some_and(|ground| ground - height > config.obstruction_threshold);

    if grounded || obstruction_ahead {
        tracing::debug!(grounded, obstruction_ahead, height, "probe contact");
    }

    ProbeResult {
        grounded,
        obstruction_ahead,
        ground_height,
    }
}
