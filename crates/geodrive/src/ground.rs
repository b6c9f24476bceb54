//! Asynchronous, rate-limited terrain height sampling.
//!
//! Physics never waits on a sample. Each vehicle's sampler keeps the last
//! accepted height (the baseline) and schedules a refresh at most once per
//! interval. Results arrive over a channel and are folded in on the next
//! update.

use std::fmt;
use std::sync::Arc;

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::async_runtime::{BoxFuture, TaskSpawner};
use crate::geo::{self, Geodetic};
use crate::host::{ModelHandle, TerrainQuery};

/// A request outstanding for this many refresh intervals is given up on.
const ABANDON_AFTER_INTERVALS: f64 = 2.0;

/// Sampler cadence and query geometry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroundSamplerConfig {
    /// Minimum time between sample requests (s).
    pub refresh_interval: f64,
    /// Height the queries start from (m).
    pub sample_altitude: f64,
    /// Lowest height the fallback ray reaches (m).
    pub ray_floor: f64,
}

impl Default for GroundSamplerConfig {
    fn default() -> Self {
        Self {
            refresh_interval: 2.0,
            sample_altitude: 1000.0,
            ray_floor: -100.0,
        }
    }
}

/// A cached ground height.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroundSample {
    /// Height above the ellipsoid (m).
    pub height: f64,
    /// Sampler clock time when the sample was accepted (s).
    pub sampled_at: f64,
}

/// Resolve the ground height at a coordinate.
///
/// Tries, in order: the most detailed clamp, a direct height sample, then a
/// vertical ray from the sample altitude down to the ray floor. Returns `None`
/// when no surface data is available.
pub async fn resolve_height(
    terrain: Arc<dyn TerrainQuery>,
    config: GroundSamplerConfig,
    longitude: f64,
    latitude: f64,
    exclude: Vec<ModelHandle>,
) -> Option<f64> {
    let top = Geodetic::new(longitude, latitude, config.sample_altitude).to_ecef();

    if let Some(query) = terrain.clamp_to_height_most_detailed(top, &exclude) {
        if let Some(clamped) = query.await {
            return Some(geo::height_of(clamped));
        }
    }

    if let Some(height) = terrain.sample_height(longitude, latitude, &exclude) {
        return Some(height);
    }

    let bottom = Geodetic::new(longitude, latitude, config.ray_floor).to_ecef();
    let direction = (bottom - top).normalize_or_zero();
    terrain
        .pick_from_ray(top, direction, &exclude)
        .map(geo::height_of)
}

/// Per-vehicle ground height cache.
pub struct GroundSampler {
    config: GroundSamplerConfig,
    terrain: Arc<dyn TerrainQuery>,
    spawner: Arc<dyn TaskSpawner>,
    latest: Option<GroundSample>,
    clock: f64,
    last_request: Option<f64>,
    in_flight: bool,
    generation: u64,
    result_tx: async_channel::Sender<(u64, Option<f64>)>,
    result_rx: async_channel::Receiver<(u64, Option<f64>)>,
}

impl fmt::Debug for GroundSampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroundSampler")
            .field("config", &self.config)
            .field("latest", &self.latest)
            .field("in_flight", &self.in_flight)
            .finish_non_exhaustive()
    }
}

impl GroundSampler {
    pub fn new(
        config: GroundSamplerConfig,
        terrain: Arc<dyn TerrainQuery>,
        spawner: Arc<dyn TaskSpawner>,
    ) -> Self {
        let (result_tx, result_rx) = async_channel::bounded(1);
        Self {
            config,
            terrain,
            spawner,
            latest: None,
            clock: 0.0,
            last_request: None,
            in_flight: false,
            generation: 0,
            result_tx,
            result_rx,
        }
    }

    /// Look up the ground height at a coordinate without touching the cache.
    pub fn sample_height(
        &self,
        longitude: f64,
        latitude: f64,
        exclude: &[ModelHandle],
    ) -> BoxFuture<'static, Option<f64>> {
        Box::pin(resolve_height(
            self.terrain.clone(),
            self.config.clone(),
            longitude,
            latitude,
            exclude.to_vec(),
        ))
    }

    /// Last accepted sample.
    pub fn latest(&self) -> Option<GroundSample> {
        self.latest
    }

    /// Last accepted height.
    pub fn baseline(&self) -> Option<f64> {
        self.latest.map(|sample| sample.height)
    }

    /// Whether a request is outstanding.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Fold in finished samples and schedule a refresh if one is due.
    /// Returns the current baseline.
    pub fn update(&mut self, dt: f64, position: DVec3, exclude: &[ModelHandle]) -> Option<f64> {
        self.clock += crate::physics::sanitize_dt(dt);
        self.drain();

        let abandoned = self.in_flight
            && self.last_request.is_some_and(|t| {
                self.clock - t >= self.config.refresh_interval * ABANDON_AFTER_INTERVALS
            });
        if abandoned {
            tracing::debug!("ground sample timed out, requesting again");
            self.in_flight = false;
            // A late answer to the abandoned request is ignored.
            self.generation += 1;
        }

        let due = self
            .last_request
            .is_none_or(|t| self.clock - t >= self.config.refresh_interval);
        if due && !self.in_flight {
            self.request(position, exclude);
        }

        self.baseline()
    }

    /// Forget the cached height and sample again on the next update.
    ///
    /// Responses to requests made before the reset are discarded.
    pub fn reset(&mut self) {
        self.latest = None;
        self.last_request = None;
        self.in_flight = false;
        self.generation += 1;
        // Free the slot in case a stale response is parked in it.
        while self.result_rx.try_recv().is_ok() {}
    }

    fn drain(&mut self) {
        while let Ok((generation, height)) = self.result_rx.try_recv() {
            if generation != self.generation {
                continue;
            }
            self.in_flight = false;
            match height {
                Some(height) if height.is_finite() => {
                    tracing::debug!(height, "ground sample");
                    self.latest = Some(GroundSample {
                        height,
                        sampled_at: self.clock,
                    });
                }
                // Keep the previous baseline.
                _ => tracing::debug!("ground sample unavailable"),
            }
        }
    }

    fn request(&mut self, position: DVec3, exclude: &[ModelHandle]) {
        let g = geo::ecef_to_geodetic(position);
        let query = self.sample_height(g.longitude, g.latitude, exclude);
        let tx = self.result_tx.clone();
        let generation = self.generation;

        self.in_flight = true;
        self.last_request = Some(self.clock);
        self.spawner.spawn(Box::pin(async move {
            let height = query.await;
            let _ = tx.send((generation, height)).await;
        }));
    }
}
