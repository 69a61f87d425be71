//! Line manager.
//!
//! This module provides the [`LineManager`], which wires every registered
//! input line to its own pulse channel and recognizer task, and the
//! [`LineHandle`] the application keeps while the lines are running.
//!
//! # Architecture
//!
//! ```text
//!                ┌──────────────────┐    ┌───────────┐    ┌────────────┐
//! edge(gpio5) ──►│                  │───►│ channel 5 │───►│ recognizer │──┐
//!                │  EdgeDispatcher  │    └───────────┘    └────────────┘  │    ┌──────────┐
//! edge(gpio0) ──►│ (clock+debounce) │    ┌───────────┐    ┌────────────┐  ├───►│ actuator │
//!                │                  │───►│ channel 0 │───►│ recognizer │──┘    │ (mutex)  │
//!                └──────────────────┘    └───────────┘    └────────────┘       └──────────┘
//!                                                               │
//!                                                               ▼
//!                                                     LineEvent (observer mpsc)
//! ```
//!
//! # Examples
//!
//! ```no_run
//! use knocker_core::KnockerConfig;
//! use knocker_engine::manager::LineManager;
//! use knocker_hardware::{EdgeSink, LogActuator};
//!
//! #[tokio::main]
//! async fn main() -> knocker_engine::Result<()> {
//!     let config = KnockerConfig::default();
//!     let manager = LineManager::from_config(&config)?;
//!
//!     let mut handle = manager.start(LogActuator::new(config.unlock.pin))?;
//!
//!     // The platform's interrupt handler calls this for every edge.
//!     let dispatcher = handle.dispatcher();
//!     dispatcher.on_edge(config.lines[0].line_id());
//!
//!     while let Some(event) = handle.recv().await {
//!         println!("{event:?}");
//!     }
//!
//!     handle.shutdown().await;
//!     Ok(())
//! }
//! ```

use crate::capture::{CaptureConfig, CodeCapture};
use crate::channel::pulse_channel;
use crate::clock::{Clock, MonotonicClock};
use crate::dispatch::EdgeDispatcher;
use crate::error::{EngineError, Result};
use crate::recognizer::{LineCounters, LineEvent, Recognizer};
use crate::unlock::UnlockDriver;
use knocker_core::{KnockerConfig, LineConfig, LineId, LineMode};
use knocker_hardware::AnyActuator;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Capacity of the observer channel shared by all lines.
pub const EVENT_CHANNEL_CAPACITY: usize = 100;

/// One input line to serve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineSpec {
    pub id: LineId,
    pub name: String,
    pub mode: LineMode,
}

impl LineSpec {
    pub fn new(id: LineId, name: impl Into<String>, mode: LineMode) -> Self {
        Self {
            id,
            name: name.into(),
            mode,
        }
    }
}

impl From<&LineConfig> for LineSpec {
    fn from(config: &LineConfig) -> Self {
        Self::new(config.line_id(), config.name.clone(), config.mode)
    }
}

/// Snapshot of one line's counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineStats {
    pub line: LineId,
    pub name: String,
    pub mode: LineMode,
    /// Edges that passed the debounce filter.
    pub forwarded: u64,
    /// Edges suppressed by the debounce filter.
    pub debounced: u64,
    /// Pulses lost because the channel was full.
    pub dropped: u64,
    /// Pulses the recognizer consumed.
    pub pulses: u64,
    pub sessions: u64,
    pub matches: u64,
    pub mismatches: u64,
    pub unlocks: u64,
    pub actuator_errors: u64,
}

/// How the line tasks ended during [`LineHandle::shutdown`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ShutdownSummary {
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub panicked: usize,
}

/// Task termination classification for shutdown handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskTermination {
    Success,
    Error,
    Cancelled,
    Panic,
}

/// Handle to the running lines.
///
/// Holds the edge entry point, the observer channel and the recognizer tasks.
pub struct LineHandle {
    dispatcher: Arc<EdgeDispatcher>,
    events_rx: mpsc::Receiver<LineEvent>,
    tasks: JoinSet<Result<()>>,
    lines: Vec<(LineSpec, Arc<LineCounters>)>,
    unlock: UnlockDriver,
}

impl LineHandle {
    /// Edge entry point to hand to the platform's interrupt layer.
    pub fn dispatcher(&self) -> Arc<EdgeDispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// Receive the next event from any line.
    ///
    /// Returns `None` once every recognizer task has ended.
    pub async fn recv(&mut self) -> Option<LineEvent> {
        self.events_rx.recv().await
    }

    /// Take an event if one is already queued.
    pub fn try_recv(&mut self) -> Option<LineEvent> {
        self.events_rx.try_recv().ok()
    }

    /// Counters of every line, in registration order.
    pub fn stats(&self) -> Vec<LineStats> {
        self.lines
            .iter()
            .map(|(spec, counters)| {
                let debounce = self.dispatcher.debounce().line(spec.id);
                LineStats {
                    line: spec.id,
                    name: spec.name.clone(),
                    mode: spec.mode,
                    forwarded: debounce.map_or(0, |d| d.forwarded()),
                    debounced: debounce.map_or(0, |d| d.rejected()),
                    dropped: self.dispatcher.dropped(spec.id),
                    pulses: counters.pulses(),
                    sessions: counters.sessions(),
                    matches: counters.matches(),
                    mismatches: counters.mismatches(),
                    unlocks: counters.unlocks(),
                    actuator_errors: counters.actuator_errors(),
                }
            })
            .collect()
    }

    /// Number of recognizer tasks still running.
    pub fn running(&self) -> usize {
        self.tasks.len()
    }

    /// Stop every line.
    ///
    /// An unlock hold in progress runs to completion and the output is
    /// released first; then all recognizer tasks are aborted and awaited.
    /// Sessions still capturing are dropped without a report.
    pub async fn shutdown(mut self) -> ShutdownSummary {
        // No task can be inside a hold while the output is ours.
        let output = self.unlock.quiesce().await;
        self.tasks.abort_all();

        let mut summary = ShutdownSummary::default();
        while let Some(result) = self.tasks.join_next().await {
            match Self::classify_task_result(result) {
                TaskTermination::Success => summary.completed += 1,
                TaskTermination::Error => summary.failed += 1,
                TaskTermination::Cancelled => summary.cancelled += 1,
                TaskTermination::Panic => summary.panicked += 1,
            }
        }

        if summary.failed + summary.panicked > 0 {
            warn!(
                failed = summary.failed,
                panicked = summary.panicked,
                "Line tasks ended abnormally"
            );
        }
        drop(output);
        info!(lines = self.lines.len(), "Lines shut down");
        summary
    }

    fn classify_task_result(
        result: std::result::Result<Result<()>, tokio::task::JoinError>,
    ) -> TaskTermination {
        match result {
            Ok(Ok(())) => TaskTermination::Success,
            Ok(Err(_)) => TaskTermination::Error,
            Err(e) if e.is_cancelled() => TaskTermination::Cancelled,
            Err(_) => TaskTermination::Panic,
        }
    }
}

impl std::fmt::Debug for LineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineHandle")
            .field("lines", &self.lines.iter().map(|(spec, _)| spec).collect::<Vec<_>>())
            .field("running", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

/// Builds and starts the per-line recognizers.
///
/// # Lifecycle
///
/// 1. Create the manager from the configuration
/// 2. Register lines (or use [`from_config`](Self::from_config))
/// 3. Call [`start`](Self::start) with the actuator
/// 4. Feed edges through [`LineHandle::dispatcher`], read [`LineHandle::recv`]
/// 5. [`LineHandle::shutdown`]
pub struct LineManager {
    capture: CaptureConfig,
    debounce: Duration,
    channel_capacity: usize,
    hold: Duration,
    clock: Arc<dyn Clock>,
    lines: Vec<LineSpec>,
}

impl LineManager {
    /// Manager with no lines registered.
    pub fn new(config: &KnockerConfig) -> Self {
        Self {
            capture: CaptureConfig::from(config),
            debounce: config.debounce(),
            channel_capacity: config.channel_capacity,
            hold: config.unlock.hold(),
            clock: Arc::new(MonotonicClock::new()),
            lines: Vec::new(),
        }
    }

    /// Manager with every line from the configuration registered.
    ///
    /// # Errors
    /// Returns `EngineError::DuplicateLine` if two lines share a pin.
    pub fn from_config(config: &KnockerConfig) -> Result<Self> {
        let mut manager = Self::new(config);
        for line in &config.lines {
            manager.register_line(LineSpec::from(line))?;
        }
        Ok(manager)
    }

    /// Replace the tick source used for debouncing.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Register a line.
    ///
    /// # Errors
    /// Returns `EngineError::DuplicateLine` if the line id is taken.
    pub fn register_line(&mut self, spec: LineSpec) -> Result<()> {
        if self.lines.iter().any(|line| line.id == spec.id) {
            return Err(EngineError::DuplicateLine(spec.id));
        }
        self.lines.push(spec);
        Ok(())
    }

    pub fn lines(&self) -> &[LineSpec] {
        &self.lines
    }

    /// Spawn one recognizer per line and return the handle.
    ///
    /// All lines share `actuator`; its mutex keeps their unlocks from
    /// overlapping. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// Returns `EngineError::Core` if the capture configuration is invalid.
    pub fn start(self, actuator: impl Into<AnyActuator>) -> Result<LineHandle> {
        let unlock = UnlockDriver::new(actuator, self.hold);
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let mut senders = Vec::with_capacity(self.lines.len());
        let mut recognizers = Vec::with_capacity(self.lines.len());
        let mut lines = Vec::with_capacity(self.lines.len());

        for spec in self.lines {
            let (tx, rx) = pulse_channel(self.channel_capacity);
            let capture = CodeCapture::new(self.capture.clone())?;
            let counters = Arc::new(LineCounters::default());

            let recognizer = Recognizer::new(
                spec.id,
                spec.mode,
                rx,
                capture,
                unlock.clone(),
                events_tx.clone(),
            )
            .with_counters(Arc::clone(&counters));

            senders.push((spec.id, tx));
            recognizers.push(recognizer);
            lines.push((spec, counters));
        }

        let dispatcher = Arc::new(EdgeDispatcher::new(self.clock, self.debounce, senders));

        let mut tasks = JoinSet::new();
        for recognizer in recognizers {
            tasks.spawn(recognizer.run());
        }
        info!(lines = lines.len(), "Lines started");

        Ok(LineHandle {
            dispatcher,
            events_rx,
            tasks,
            lines,
            unlock,
        })
    }
}
