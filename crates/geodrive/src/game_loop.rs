//! Frame pacing: measure real time between frames and fan a clamped delta
//! out to every registered system.

use web_time::Instant;

/// Anything advanced once per frame.
pub trait Updatable {
    fn update(&mut self, dt: f64);
}

/// Default cap on a single frame's delta (s).
pub const DEFAULT_MAX_FRAME_DT: f64 = 0.1;

/// Drives registered systems with a clamped frame delta.
#[derive(Debug)]
pub struct GameLoop {
    max_dt: f64,
    last: Option<Instant>,
    frames: u64,
}

impl GameLoop {
    pub fn new(max_dt: f64) -> Self {
        Self {
            max_dt,
            last: None,
            frames: 0,
        }
    }

    /// Number of frames that reached the systems.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Clamp a raw delta. `None` means the frame should not advance anything.
    pub fn clamp_dt(&self, raw_dt: f64) -> Option<f64> {
        if !raw_dt.is_finite() || raw_dt <= 0.0 {
            return None;
        }
        Some(raw_dt.min(self.max_dt))
    }

    /// Advance using wall-clock time. The first call only primes the clock.
    pub fn tick(&mut self, now: Instant, systems: &mut [&mut dyn Updatable]) -> Option<f64> {
        let last = self.last.replace(now)?;
        let raw_dt = now.saturating_duration_since(last).as_secs_f64();
        self.step(raw_dt, systems)
    }

    /// Advance every system by `raw_dt`, clamped. Returns the delta used.
    pub fn step(&mut self, raw_dt: f64, systems: &mut [&mut dyn Updatable]) -> Option<f64> {
        let dt = self.clamp_dt(raw_dt)?;
        for system in systems.iter_mut() {
            system.update(dt);
        }
        self.frames += 1;
        Some(dt)
    }

    /// Forget the previous frame time, e.g. after the host was suspended.
    pub fn reset_clock(&mut self) {
        self.last = None;
    }
}

impl Default for GameLoop {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_DT)
    }
}
