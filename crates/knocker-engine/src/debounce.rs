//! Software debounce for edge notifications.
//!
//! Each physical line keeps its own "last seen" tick. A notification is
//! forwarded only when strictly more than the debounce interval has elapsed
//! since the previous notification on the same line. The tick is updated on
//! every notification, forwarded or not, so a bouncing contact keeps pushing
//! the window forward until it settles.
//!
//! ```text
//! edges:   |  ||| |            |
//! ticks:   0  5..9 14          60
//! result:  F  ---- -           F      (interval 20ms)
//! ```
//!
//! Everything here runs in the edge callback: one atomic swap per
//! notification, no locks, no allocation.

use knocker_core::LineId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Sentinel meaning "no notification seen yet".
const NEVER: u64 = u64::MAX;

/// Debounce state for one line.
#[derive(Debug)]
pub struct LineDebouncer {
    interval_ms: u64,
    last_seen: AtomicU64,
    forwarded: AtomicU64,
    rejected: AtomicU64,
}

impl LineDebouncer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval_ms: interval.as_millis() as u64,
            last_seen: AtomicU64::new(NEVER),
            forwarded: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    /// Examine a notification observed at `tick_ms`.
    ///
    /// Returns `true` if it should be forwarded.
    pub fn observe(&self, tick_ms: u64) -> bool {
        // `NEVER` is the sentinel, never a stored tick.
        let previous = self.last_seen.swap(tick_ms.min(NEVER - 1), Ordering::AcqRel);
        let accept = previous == NEVER || tick_ms.saturating_sub(previous) > self.interval_ms;

        if accept {
            self.forwarded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.rejected.fetch_add(1, Ordering::Relaxed);
        }
        accept
    }

    /// Number of notifications forwarded so far.
    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    /// Number of notifications suppressed so far.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Per-line debounce table.
///
/// Built once at startup and never mutated afterwards, so lookups from the
/// edge callback are plain reads.
#[derive(Debug, Default)]
pub struct DebounceFilter {
    lines: HashMap<LineId, LineDebouncer>,
}

impl DebounceFilter {
    /// Create a filter with one debouncer per line, all sharing `interval`.
    pub fn new(lines: impl IntoIterator<Item = LineId>, interval: Duration) -> Self {
        Self {
            lines: lines
                .into_iter()
                .map(|line| (line, LineDebouncer::new(interval)))
                .collect(),
        }
    }

    /// Examine a notification on `line` at `tick_ms`.
    ///
    /// Returns `None` for a line the filter does not know.
    pub fn observe(&self, line: LineId, tick_ms: u64) -> Option<bool> {
        self.lines.get(&line).map(|debouncer| debouncer.observe(tick_ms))
    }

    /// Debouncer for `line`.
    pub fn line(&self, line: LineId) -> Option<&LineDebouncer> {
        self.lines.get(&line)
    }

    pub fn contains(&self, line: LineId) -> bool {
        self.lines.contains_key(&line)
    }
}
