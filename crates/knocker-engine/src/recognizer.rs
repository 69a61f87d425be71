//! Per-line recognition task.
//!
//! One [`Recognizer`] owns one line's [`PulseReceiver`] and runs until every
//! sender of that channel is gone. What it does with pulses depends on the
//! line mode:
//!
//! - [`LineMode::Knock`]: feed the capture state machine. While idle it waits
//!   for a pulse with no time limit; while capturing it waits at most one
//!   digit timeout, and silence counts as a timeout. A `Match` verdict
//!   unlocks the door.
//! - [`LineMode::Direct`]: wait for one pulse, unlock, then throw away
//!   whatever queued up during the hold. Pulses queued before the task first
//!   runs are served.
//!
//! Progress is published as [`LineEvent`]s on a bounded observer channel.
//! Publishing never waits: if nobody drains the observer channel, events are
//! dropped and recognition carries on.

use crate::capture::{CaptureStep, CodeCapture, SessionReport};
use crate::channel::{PulseReceiver, RecvError};
use crate::error::Result;
use crate::unlock::UnlockDriver;
use knocker_core::{LineId, LineMode};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Progress report from a recognizer task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
#[non_exhaustive]
pub enum LineEvent {
    /// First pulse after idle.
    SessionStarted { line: LineId },

    /// A pulse was received. `code` is the buffer after counting it.
    Pulse { line: LineId, code: String },

    /// A digit timeout of silence elapsed.
    Timeout {
        line: LineId,
        timeouts: u32,
        code: String,
    },

    /// A session ended, matched or not.
    SessionFinished { line: LineId, report: SessionReport },

    /// The unlock output went active.
    UnlockStarted { line: LineId },

    /// The hold elapsed and the output was released.
    UnlockFinished { line: LineId },

    /// The actuator failed. The line keeps serving.
    ActuatorError { line: LineId, error: String },
}

impl LineEvent {
    /// Line the event belongs to.
    pub fn line(&self) -> LineId {
        match self {
            Self::SessionStarted { line }
            | Self::Pulse { line, .. }
            | Self::Timeout { line, .. }
            | Self::SessionFinished { line, .. }
            | Self::UnlockStarted { line }
            | Self::UnlockFinished { line }
            | Self::ActuatorError { line, .. } => *line,
        }
    }
}

/// Counters shared between a recognizer task and the line handle.
#[derive(Debug, Default)]
pub struct LineCounters {
    pulses: AtomicU64,
    sessions: AtomicU64,
    matches: AtomicU64,
    mismatches: AtomicU64,
    unlocks: AtomicU64,
    actuator_errors: AtomicU64,
}

impl LineCounters {
    pub fn pulses(&self) -> u64 {
        self.pulses.load(Ordering::Relaxed)
    }

    pub fn sessions(&self) -> u64 {
        self.sessions.load(Ordering::Relaxed)
    }

    pub fn matches(&self) -> u64 {
        self.matches.load(Ordering::Relaxed)
    }

    pub fn mismatches(&self) -> u64 {
        self.mismatches.load(Ordering::Relaxed)
    }

    pub fn unlocks(&self) -> u64 {
        self.unlocks.load(Ordering::Relaxed)
    }

    pub fn actuator_errors(&self) -> u64 {
        self.actuator_errors.load(Ordering::Relaxed)
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Recognition loop for one line.
pub struct Recognizer {
    line: LineId,
    mode: LineMode,
    rx: PulseReceiver,
    capture: CodeCapture,
    unlock: UnlockDriver,
    events: mpsc::Sender<LineEvent>,
    counters: Arc<LineCounters>,
}

impl Recognizer {
    pub fn new(
        line: LineId,
        mode: LineMode,
        rx: PulseReceiver,
        capture: CodeCapture,
        unlock: UnlockDriver,
        events: mpsc::Sender<LineEvent>,
    ) -> Self {
        Self {
            line,
            mode,
            rx,
            capture,
            unlock,
            events,
            counters: Arc::new(LineCounters::default()),
        }
    }

    /// Share `counters` with whoever reports line statistics.
    pub fn with_counters(mut self, counters: Arc<LineCounters>) -> Self {
        self.counters = counters;
        self
    }

    pub fn counters(&self) -> Arc<LineCounters> {
        Arc::clone(&self.counters)
    }

    /// Serve the line until its pulse channel closes.
    ///
    /// # Errors
    /// Recognition itself does not fail; actuator errors are reported as
    /// [`LineEvent::ActuatorError`] and the loop continues.
    pub async fn run(mut self) -> Result<()> {
        info!(line = %self.line, mode = ?self.mode, "Recognizer started");
        match self.mode {
            LineMode::Knock => self.run_knock().await,
            LineMode::Direct => self.run_direct().await,
        }
        info!(line = %self.line, "Recognizer stopped");
        Ok(())
    }

    async fn run_knock(&mut self) {
        let digit_timeout = self.capture.config().digit_timeout;
        loop {
            let received = if self.capture.is_idle() {
                self.rx.recv().await
            } else {
                debug!(line = %self.line, code = %self.capture.buffer(), "Code so far");
                self.rx.recv_timeout(digit_timeout).await
            };

            let step = match received {
                Ok(_) => {
                    LineCounters::bump(&self.counters.pulses);
                    self.capture.on_pulse()
                }
                Err(RecvError::Timeout) => self.capture.on_silence(),
                Err(RecvError::Closed) => break,
            };
            self.handle_step(step).await;
        }
    }

    async fn handle_step(&mut self, step: CaptureStep) {
        let line = self.line;
        match step {
            CaptureStep::Started => {
                LineCounters::bump(&self.counters.sessions);
                debug!(%line, "Session started");
                self.emit(LineEvent::SessionStarted { line });
                self.emit(LineEvent::Pulse {
                    line,
                    code: self.capture.buffer().to_string(),
                });
            }
            CaptureStep::Counted { .. } => {
                debug!(%line, code = %self.capture.buffer(), "Pulse");
                self.emit(LineEvent::Pulse {
                    line,
                    code: self.capture.buffer().to_string(),
                });
            }
            CaptureStep::Saturated => {
                warn!(%line, code = %self.capture.buffer(), "Digit saturated, pulse not counted");
                self.emit(LineEvent::Pulse {
                    line,
                    code: self.capture.buffer().to_string(),
                });
            }
            CaptureStep::DigitClosed { timeouts } | CaptureStep::Waiting { timeouts } => {
                debug!(%line, timeouts, code = %self.capture.buffer(), "Timeout");
                self.emit(LineEvent::Timeout {
                    line,
                    timeouts,
                    code: self.capture.buffer().to_string(),
                });
            }
            CaptureStep::Ignored => {}
            CaptureStep::Finished(report) => {
                // Sessions only end on a silence; report that timeout too.
                debug!(%line, timeouts = report.timeouts, code = %report.buffer, "Timeout");
                self.emit(LineEvent::Timeout {
                    line,
                    timeouts: report.timeouts,
                    code: report.buffer.to_string(),
                });

                let matched = report.verdict.is_match();
                if matched {
                    LineCounters::bump(&self.counters.matches);
                    info!(
                        %line,
                        code = %report.buffer,
                        expected = %self.capture.config().expected,
                        end = %report.end,
                        "Codes match"
                    );
                } else {
                    LineCounters::bump(&self.counters.mismatches);
                    info!(
                        %line,
                        code = %report.buffer,
                        timeouts = report.timeouts,
                        end = %report.end,
                        "Code rejected"
                    );
                }
                self.emit(LineEvent::SessionFinished { line, report });

                if matched {
                    self.unlock().await;
                }
            }
        }
    }

    async fn run_direct(&mut self) {
        loop {
            match self.rx.recv().await {
                Ok(_) => {
                    LineCounters::bump(&self.counters.pulses);
                    self.emit(LineEvent::Pulse {
                        line: self.line,
                        code: String::new(),
                    });
                    self.unlock().await;

                    let stale = self.rx.clear();
                    if stale > 0 {
                        debug!(line = %self.line, stale, "Discarded pulses queued during hold");
                    }
                }
                Err(RecvError::Closed) => break,
                Err(RecvError::Timeout) => {}
            }
        }
    }

    async fn unlock(&mut self) {
        let line = self.line;
        self.emit(LineEvent::UnlockStarted { line });
        match self.unlock.trigger_unlock(line).await {
            Ok(()) => {
                LineCounters::bump(&self.counters.unlocks);
                self.emit(LineEvent::UnlockFinished { line });
            }
            Err(e) => {
                LineCounters::bump(&self.counters.actuator_errors);
                warn!(%line, error = %e, "Unlock failed");
                self.emit(LineEvent::ActuatorError {
                    line,
                    error: e.to_string(),
                });
            }
        }
    }

    fn emit(&self, event: LineEvent) {
        // Observers are best effort; a full or closed channel drops the event.
        let _ = self.events.try_send(event);
    }
}

impl std::fmt::Debug for Recognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recognizer")
            .field("line", &self.line)
            .field("mode", &self.mode)
            .field("state", &self.capture.state())
            .finish_non_exhaustive()
    }
}
