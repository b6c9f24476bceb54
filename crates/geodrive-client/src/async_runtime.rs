//! Task spawning on Bevy's task pools.
//!
//! - Native: tasks run on the `AsyncComputeTaskPool` worker threads.
//! - WASM: tasks run on the browser's event loop via `spawn_local`.

use bevy::tasks::AsyncComputeTaskPool;
use geodrive::{BoxFuture, TaskSpawner};

/// [`TaskSpawner`] backed by Bevy's `AsyncComputeTaskPool`.
///
/// The pool is created by `TaskPoolPlugin`, so spawning before the app has
/// been built drops the task with a warning.
#[derive(Clone, Copy, Debug, Default)]
pub struct BevyTaskSpawner;

impl TaskSpawner for BevyTaskSpawner {
    fn spawn(&self, task: BoxFuture<'static, ()>) {
        let Some(pool) = AsyncComputeTaskPool::try_get() else {
            tracing::warn!("async compute task pool not initialized, dropping task");
            return;
        };

        #[cfg(not(target_family = "wasm"))]
        pool.spawn(task).detach();

        #[cfg(target_family = "wasm")]
        pool.spawn_local(task).detach();
    }
}
