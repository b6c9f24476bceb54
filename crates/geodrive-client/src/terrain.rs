//! Procedural terrain and an in-process scene host.
//!
//! `RollingHills` answers every terrain query from a sum of seeded sine
//! waves around a reference point, so the simulation can run without any
//! streamed tile data.

use std::collections::HashSet;
use std::f64::consts::TAU;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use geodrive::constants::WGS84_SEMI_MAJOR_AXIS_M;
use geodrive::geo::{self, Geodetic};
use geodrive::{BoxFuture, Error, ModelHandle, ModelRequest, Result, SceneHost, TerrainQuery};
use glam::{DVec2, DVec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Number of superimposed waves.
const WAVE_COUNT: usize = 6;

/// Longest distance a ray is marched (m).
const RAY_MAX_DISTANCE: f64 = 20_000.0;

/// Smallest march step (m).
const RAY_MIN_STEP: f64 = 0.5;

/// Refinement iterations once a ray crosses the surface.
const RAY_BISECTION_STEPS: usize = 32;

#[derive(Clone, Debug)]
struct Wave {
    amplitude: f64,
    direction: DVec2,
    wavenumber: f64,
    phase: f64,
}

/// Smooth hills around a reference coordinate.
#[derive(Clone, Debug)]
pub struct RollingHills {
    origin: Geodetic,
    base_height: f64,
    waves: Vec<Wave>,
}

impl RollingHills {
    /// Hills centred on `(longitude, latitude)` with a mean height of
    /// `base_height`, shaped by `seed`.
    pub fn new(longitude: f64, latitude: f64, base_height: f64, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let waves = (0..WAVE_COUNT)
            .map(|_| {
                let wavelength: f64 = rng.random_range(150.0..1500.0);
                let angle: f64 = rng.random_range(0.0..TAU);
                Wave {
                    amplitude: wavelength * rng.random_range(0.002..0.006),
                    direction: DVec2::new(angle.cos(), angle.sin()),
                    wavenumber: TAU / wavelength,
                    phase: rng.random_range(0.0..TAU),
                }
            })
            .collect();

        Self {
            origin: Geodetic::new(longitude, latitude, base_height),
            base_height,
            waves,
        }
    }

    /// Reference coordinate the hills are centred on.
    pub fn origin(&self) -> Geodetic {
        self.origin
    }

    /// Largest possible deviation from the base height (m).
    pub fn max_relief(&self) -> f64 {
        self.waves.iter().map(|w| w.amplitude).sum()
    }

    /// Terrain height above the ellipsoid at a coordinate (m).
    pub fn height_at(&self, longitude: f64, latitude: f64) -> f64 {
        let p = self.local_offset(longitude, latitude);
        self.base_height
            + self
                .waves
                .iter()
                .map(|w| w.amplitude * (w.wavenumber * w.direction.dot(p) + w.phase).sin())
                .sum::<f64>()
    }

    /// Height of an ECEF point above the terrain beneath it (m).
    pub fn clearance(&self, position: DVec3) -> f64 {
        let g = geo::ecef_to_geodetic(position);
        g.height - self.height_at(g.longitude, g.latitude)
    }

    /// East/north offset from the origin on a local tangent plane (m).
    fn local_offset(&self, longitude: f64, latitude: f64) -> DVec2 {
        let east = (longitude - self.origin.longitude).to_radians()
            * WGS84_SEMI_MAJOR_AXIS_M
            * self.origin.latitude.to_radians().cos();
        let north = (latitude - self.origin.latitude).to_radians() * WGS84_SEMI_MAJOR_AXIS_M;
        DVec2::new(east, north)
    }

    fn bisect(&self, origin: DVec3, direction: DVec3, mut above: f64, mut below: f64) -> DVec3 {
        for _ in 0..RAY_BISECTION_STEPS {
            let mid = 0.5 * (above + below);
            if self.clearance(origin + direction * mid) > 0.0 {
                above = mid;
            } else {
                below = mid;
            }
        }
        origin + direction * below
    }
}

impl TerrainQuery for RollingHills {
    fn clamp_to_height_most_detailed(
        &self,
        position: DVec3,
        exclude: &[ModelHandle],
    ) -> Option<BoxFuture<'static, Option<DVec3>>> {
        let clamped = self.clamp_to_height(position, exclude);
        Some(Box::pin(std::future::ready(clamped)))
    }

    fn sample_height(&self, longitude: f64, latitude: f64, _exclude: &[ModelHandle]) -> Option<f64> {
        Some(self.height_at(longitude, latitude))
    }

    fn pick_from_ray(
        &self,
        origin: DVec3,
        direction: DVec3,
        _exclude: &[ModelHandle],
    ) -> Option<DVec3> {
        let direction = direction.normalize_or_zero();
        if direction == DVec3::ZERO {
            return None;
        }
        if self.clearance(origin) <= 0.0 {
            return Some(origin);
        }

        // Sphere-trace with a conservative step, then refine the crossing.
        let mut t = 0.0;
        while t < RAY_MAX_DISTANCE {
            let clearance = self.clearance(origin + direction * t);
            let step = (0.5 * clearance).max(RAY_MIN_STEP);
            let next = t + step;
            if self.clearance(origin + direction * next) <= 0.0 {
                return Some(self.bisect(origin, direction, t, next));
            }
            t = next;
        }
        None
    }

    fn clamp_to_height(&self, position: DVec3, _exclude: &[ModelHandle]) -> Option<DVec3> {
        let g = geo::ecef_to_geodetic(position);
        Some(
            g.with_height(self.height_at(g.longitude, g.latitude))
                .to_ecef(),
        )
    }
}

/// Scene host whose models exist only as handles.
///
/// The viewer draws placeholder meshes from the vehicles' model matrices, so
/// a load only has to hand out a handle.
#[derive(Debug, Default)]
pub struct HeadlessSceneHost {
    next: AtomicU64,
    live: Mutex<HashSet<ModelHandle>>,
}

impl HeadlessSceneHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of loaded, unreleased models.
    pub fn live_models(&self) -> usize {
        match self.live.lock() {
            Ok(live) => live.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

impl SceneHost for HeadlessSceneHost {
    fn load_model(&self, request: ModelRequest) -> BoxFuture<'static, Result<ModelHandle>> {
        if request.url.is_empty() {
            return Box::pin(std::future::ready(Err(Error::ModelLoad {
                url: request.url,
                message: "empty model url".to_string(),
            })));
        }

        let handle = ModelHandle(self.next.fetch_add(1, Ordering::Relaxed));
        match self.live.lock() {
            Ok(mut live) => live.insert(handle),
            Err(poisoned) => poisoned.into_inner().insert(handle),
        };
        tracing::debug!(url = %request.url, scale = request.scale, ?handle, "model loaded");
        Box::pin(std::future::ready(Ok(handle)))
    }

    fn release_model(&self, handle: ModelHandle) {
        match self.live.lock() {
            Ok(mut live) => live.remove(&handle),
            Err(poisoned) => poisoned.into_inner().remove(&handle),
        };
        tracing::debug!(?handle, "model released");
    }
}
