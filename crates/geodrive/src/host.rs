//! Interfaces consumed from the scene host.
//!
//! The renderer, model loader and tileset live outside this crate. The
//! simulation only talks to them through these traits, which keeps every
//! component testable against in-memory doubles.

use std::sync::Arc;

use glam::DVec3;

use crate::async_runtime::{BoxFuture, TaskSpawner};
use crate::error::Result;

/// Opaque handle to a model instance owned by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelHandle(pub u64);

/// Request to load and place a model.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelRequest {
    /// Model URL or asset path.
    pub url: String,
    /// Uniform scale factor.
    pub scale: f64,
    /// Initial ECEF position.
    pub position: DVec3,
    /// Initial heading in radians.
    pub heading: f64,
}

/// Model loading and lifetime management.
pub trait SceneHost: Send + Sync {
    /// Load a model. Resolves once the model is ready to render.
    fn load_model(&self, request: ModelRequest) -> BoxFuture<'static, Result<ModelHandle>>;

    /// Release a model and everything the host allocated for it.
    fn release_model(&self, handle: ModelHandle);
}

/// Terrain and tileset height queries.
///
/// Every query may report "no data" (tiles not loaded yet, position outside
/// the tileset). `exclude` lists models that must be ignored, so a vehicle
/// never samples its own geometry.
pub trait TerrainQuery: Send + Sync {
    /// Clamp against the most detailed available tiles.
    ///
    /// Returns `None` when the host does not support detailed clamping at all;
    /// the future resolves to `None` when no surface was found.
    fn clamp_to_height_most_detailed(
        &self,
        position: DVec3,
        exclude: &[ModelHandle],
    ) -> Option<BoxFuture<'static, Option<DVec3>>>;

    /// Height of the surface at a coordinate (degrees), from loaded tiles.
    fn sample_height(&self, longitude: f64, latitude: f64, exclude: &[ModelHandle])
    -> Option<f64>;

    /// First intersection of a ray with the scene.
    fn pick_from_ray(
        &self,
        origin: DVec3,
        direction: DVec3,
        exclude: &[ModelHandle],
    ) -> Option<DVec3>;

    /// Synchronous clamp of a position onto the currently loaded surface.
    fn clamp_to_height(&self, position: DVec3, exclude: &[ModelHandle]) -> Option<DVec3>;
}

/// Handles to the host services shared by all simulation components.
#[derive(Clone)]
pub struct Environment {
    pub scene: Arc<dyn SceneHost>,
    pub terrain: Arc<dyn TerrainQuery>,
    pub spawner: Arc<dyn TaskSpawner>,
}

impl Environment {
    pub fn new(
        scene: Arc<dyn SceneHost>,
        terrain: Arc<dyn TerrainQuery>,
        spawner: Arc<dyn TaskSpawner>,
    ) -> Self {
        Self {
            scene,
            terrain,
            spawner,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory host doubles shared by the crate's tests.

    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;
    use crate::async_runtime::QueuedSpawner;
    use crate::error::Error;
    use crate::geo;

    /// Terrain at a constant height above the ellipsoid, optionally with a
    /// wall of extra height north of a given latitude.
    pub struct FlatTerrain {
        pub height: Mutex<Option<f64>>,
        pub wall: Mutex<Option<(f64, f64)>>,
        pub detailed: bool,
    }

    impl FlatTerrain {
        pub fn new(height: f64) -> Self {
            Self {
                height: Mutex::new(Some(height)),
                wall: Mutex::new(None),
                detailed: true,
            }
        }

        pub fn empty() -> Self {
            Self {
                height: Mutex::new(None),
                wall: Mutex::new(None),
                detailed: true,
            }
        }

        pub fn set_height(&self, height: Option<f64>) {
            *self.height.lock().unwrap() = height;
        }

        /// Raise terrain by `extra` meters for latitudes above `latitude`.
        pub fn set_wall(&self, latitude: f64, extra: f64) {
            *self.wall.lock().unwrap() = Some((latitude, extra));
        }

        fn height_at(&self, latitude: f64) -> Option<f64> {
            let base = (*self.height.lock().unwrap())?;
            let extra = match *self.wall.lock().unwrap() {
                Some((wall_lat, extra)) if latitude > wall_lat => extra,
                _ => 0.0,
            };
            Some(base + extra)
        }
    }

    impl TerrainQuery for FlatTerrain {
        fn clamp_to_height_most_detailed(
            &self,
            position: DVec3,
            exclude: &[ModelHandle],
        ) -> Option<BoxFuture<'static, Option<DVec3>>> {
            if !self.detailed {
                return None;
            }
            let clamped = self.clamp_to_height(position, exclude);
            Some(Box::pin(async move { clamped }))
        }

        fn sample_height(&self, _longitude: f64, latitude: f64, _: &[ModelHandle]) -> Option<f64> {
            self.height_at(latitude)
        }

        fn pick_from_ray(&self, origin: DVec3, _: DVec3, exclude: &[ModelHandle]) -> Option<DVec3> {
            self.clamp_to_height(origin, exclude)
        }

        fn clamp_to_height(&self, position: DVec3, _: &[ModelHandle]) -> Option<DVec3> {
            let g = geo::ecef_to_geodetic(position);
            let h = self.height_at(g.latitude)?;
            Some(g.with_height(h).to_ecef())
        }
    }

    /// Scene host that resolves every load immediately.
    #[derive(Default)]
    pub struct RecordingScene {
        next: AtomicU64,
        pub live: Mutex<HashSet<ModelHandle>>,
        pub fail_urls: Mutex<HashSet<String>>,
    }

    impl RecordingScene {
        pub fn live_count(&self) -> usize {
            self.live.lock().unwrap().len()
        }
    }

    impl SceneHost for RecordingScene {
        fn load_model(&self, request: ModelRequest) -> BoxFuture<'static, Result<ModelHandle>> {
            if self.fail_urls.lock().unwrap().contains(&request.url) {
                return Box::pin(async move {
                    Err(Error::ModelLoad {
                        url: request.url,
                        message: "not found".to_string(),
                    })
                });
            }
            let handle = ModelHandle(self.next.fetch_add(1, Ordering::SeqCst));
            self.live.lock().unwrap().insert(handle);
            Box::pin(async move { Ok(handle) })
        }

        fn release_model(&self, handle: ModelHandle) {
            self.live.lock().unwrap().remove(&handle);
        }
    }

    /// Test environment with direct access to the concrete doubles.
    pub struct TestHost {
        pub scene: Arc<RecordingScene>,
        pub terrain: Arc<FlatTerrain>,
        pub spawner: Arc<QueuedSpawner>,
    }

    impl TestHost {
        pub fn new(terrain: FlatTerrain) -> Self {
            Self {
                scene: Arc::new(RecordingScene::default()),
                terrain: Arc::new(terrain),
                spawner: Arc::new(QueuedSpawner::new()),
            }
        }

        pub fn env(&self) -> Environment {
            Environment::new(
                self.scene.clone(),
                self.terrain.clone(),
                self.spawner.clone(),
            )
        }

        pub fn run(&self) -> usize {
            self.spawner.run_pending()
        }
    }
}
