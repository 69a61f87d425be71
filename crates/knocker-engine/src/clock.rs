//! Process-wide monotonic tick source.
//!
//! Debounce decisions compare millisecond ticks. The live clock is built on
//! `tokio::time::Instant`, so paused-time tests see the same ticks the
//! recognizer timers do.

use std::sync::atomic::{AtomicU64, Ordering};
use tokio::time::Instant;

/// Millisecond tick counter.
pub trait Clock: Send + Sync {
    /// Milliseconds since the clock was created. Never decreases.
    fn now_ms(&self) -> u64;
}

/// Monotonic clock anchored at construction time.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::Release);
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::Acquire)
    }
}
