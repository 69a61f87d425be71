//! Edge entry point: clock, debounce, enqueue.

use crate::channel::PulseSender;
use crate::clock::Clock;
use crate::debounce::DebounceFilter;
use knocker_core::{LineId, PulseEvent};
use knocker_hardware::EdgeSink;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Routes raw edges to the per-line pulse channels.
///
/// This is what the platform's interrupt handler calls. Per edge it reads the
/// clock once, does one atomic swap in the line's debouncer and at most one
/// lock-free enqueue. A full channel silently drops the pulse (the channel
/// counts it). Edges on lines that were never registered are counted and
/// otherwise ignored.
pub struct EdgeDispatcher {
    clock: Arc<dyn Clock>,
    debounce: DebounceFilter,
    senders: HashMap<LineId, PulseSender>,
    unknown_edges: AtomicU64,
}

impl EdgeDispatcher {
    pub fn new(
        clock: Arc<dyn Clock>,
        debounce_interval: Duration,
        senders: impl IntoIterator<Item = (LineId, PulseSender)>,
    ) -> Self {
        let senders: HashMap<_, _> = senders.into_iter().collect();
        let debounce = DebounceFilter::new(senders.keys().copied(), debounce_interval);
        Self {
            clock,
            debounce,
            senders,
            unknown_edges: AtomicU64::new(0),
        }
    }

    pub fn debounce(&self) -> &DebounceFilter {
        &self.debounce
    }

    /// Pulses dropped because `line`'s channel was full.
    pub fn dropped(&self, line: LineId) -> u64 {
        self.senders.get(&line).map_or(0, PulseSender::dropped)
    }

    /// Edges seen on lines with no channel.
    pub fn unknown_edges(&self) -> u64 {
        self.unknown_edges.load(Ordering::Relaxed)
    }

    pub fn lines(&self) -> impl Iterator<Item = LineId> + '_ {
        self.senders.keys().copied()
    }
}

impl EdgeSink for EdgeDispatcher {
    fn on_edge(&self, line: LineId) {
        let tick_ms = self.clock.now_ms();
        match (self.debounce.observe(line, tick_ms), self.senders.get(&line)) {
            (Some(true), Some(sender)) => {
                // Full: counted by the channel. Closed: the line is shutting down.
                let _ = sender.try_send(PulseEvent::new(line, tick_ms));
            }
            (Some(false), _) => {}
            _ => {
                self.unknown_edges.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl std::fmt::Debug for EdgeDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeDispatcher")
            .field("lines", &self.senders.keys().collect::<Vec<_>>())
            .field("unknown_edges", &self.unknown_edges())
            .finish_non_exhaustive()
    }
}
