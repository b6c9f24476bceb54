//! Task spawning abstraction for the simulation's asynchronous work.
//!
//! The core never blocks on a future. Model loads and terrain queries are
//! handed to a [`TaskSpawner`] and their results come back over
//! `async_channel`s that the tick drains with `try_recv`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::task::{Context, Poll, Waker};

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Spawns background tasks that run to completion.
///
/// For tasks that need to return values, use channels to communicate results
/// back to the tick.
pub trait TaskSpawner: Send + Sync {
    /// Spawn a detached task.
    fn spawn(&self, task: BoxFuture<'static, ()>);
}

/// Spawner that queues tasks and only polls them when asked.
///
/// Useful for deterministic stepping: a host (or a test) decides exactly when
/// background work makes progress.
#[derive(Default)]
pub struct QueuedSpawner {
    queue: Mutex<Vec<BoxFuture<'static, ()>>>,
}

impl QueuedSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks that have not completed yet.
    pub fn pending(&self) -> usize {
        self.queue.lock().map_or(0, |queue| queue.len())
    }

    /// Poll every queued task once. Returns how many completed.
    pub fn run_pending(&self) -> usize {
        // Take the tasks out first so tasks spawned while polling are queued
        // for the next call instead of deadlocking.
        let tasks = match self.queue.lock() {
            Ok(mut queue) => std::mem::take(&mut *queue),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };

        let mut cx = Context::from_waker(Waker::noop());
        let mut completed = 0;
        let mut still_pending = Vec::new();

        for mut task in tasks {
            match task.as_mut().poll(&mut cx) {
                Poll::Ready(()) => completed += 1,
                Poll::Pending => still_pending.push(task),
            }
        }

        if !still_pending.is_empty() {
            match self.queue.lock() {
                Ok(mut queue) => queue.extend(still_pending),
                Err(poisoned) => poisoned.into_inner().extend(still_pending),
            }
        }

        completed
    }
}

impl TaskSpawner for QueuedSpawner {
    fn spawn(&self, task: BoxFuture<'static, ()>) {
        match self.queue.lock() {
            Ok(mut queue) => queue.push(task),
            Err(poisoned) => poisoned.into_inner().push(task),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_tasks_run_only_when_asked() {
        let spawner = QueuedSpawner::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let c = counter.clone();
        spawner.spawn(Box::pin(async move {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(spawner.pending(), 1);

        assert_eq!(spawner.run_pending(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(spawner.pending(), 0);
    }

    #[test]
    fn test_pending_tasks_are_retained() {
        let spawner = QueuedSpawner::new();
        let (tx, rx) = async_channel::bounded::<u32>(1);

        spawner.spawn(Box::pin(async move {
            let _ = rx.recv().await;
        }));

        // Nothing has been sent, so the task stays queued.
        assert_eq!(spawner.run_pending(), 0);
        assert_eq!(spawner.pending(), 1);

        tx.try_send(7).unwrap();
        assert_eq!(spawner.run_pending(), 1);
        assert_eq!(spawner.pending(), 0);
    }
}
