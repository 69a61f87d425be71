//! Offline evaluation of a recorded edge timeline.
//!
//! [`replay`] runs one line's raw edge ticks through the same debounce and
//! capture logic the live recognizer uses, but on a virtual clock, so a
//! timeline gives the same sessions every time. Useful for tuning timeouts
//! against recorded knocks and for the CLI.
//!
//! Timing rules, matching the live task:
//!
//! - a pulse strictly before the digit-timeout deadline is counted; one at or
//!   after the deadline arrives after the timeout fired;
//! - while the door is held open nothing is consumed: pulses queue up to the
//!   channel capacity (the rest are dropped) and are all delivered when the
//!   hold ends;
//! - a direct line discards whatever queued during the hold.

use crate::capture::{CaptureConfig, CaptureStep, CodeCapture, SessionReport};
use crate::debounce::LineDebouncer;
use knocker_core::{KnockerConfig, LineMode, Result, constants::DEFAULT_CHANNEL_CAPACITY};
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;

/// Everything the replay needs to know about the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayConfig {
    pub capture: CaptureConfig,
    pub debounce: Duration,
    pub channel_capacity: usize,
    pub hold: Duration,
    pub mode: LineMode,
}

impl ReplayConfig {
    pub fn new(capture: CaptureConfig) -> Self {
        let defaults = KnockerConfig::default();
        Self {
            capture,
            debounce: defaults.debounce(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            hold: defaults.unlock.hold(),
            mode: LineMode::Knock,
        }
    }

    pub fn with_mode(mut self, mode: LineMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_hold(mut self, hold: Duration) -> Self {
        self.hold = hold;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }
}

impl From<&KnockerConfig> for ReplayConfig {
    fn from(config: &KnockerConfig) -> Self {
        Self {
            capture: CaptureConfig::from(config),
            debounce: config.debounce(),
            channel_capacity: config.channel_capacity,
            hold: config.unlock.hold(),
            mode: LineMode::Knock,
        }
    }
}

/// Full result of a replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayOutcome {
    /// Finished sessions in order. Empty for a direct line.
    pub sessions: Vec<SessionReport>,
    /// Tick at which each unlock started.
    pub unlocks: Vec<u64>,
    /// Edges that passed the debounce filter.
    pub pulses: usize,
    /// Edges suppressed by the debounce filter.
    pub debounced: usize,
    /// Pulses lost to a full channel during an unlock hold.
    pub dropped: usize,
    /// Pulses a direct line threw away after a hold.
    pub discarded: usize,
}

/// Sessions produced by `edge_ticks_ms` on one line.
///
/// # Errors
/// Returns `Error::Config` if the capture configuration is invalid.
///
/// # Examples
///
/// ```
/// use knocker_core::ExpectedCode;
/// use knocker_engine::capture::CaptureConfig;
/// use knocker_engine::replay::{replay, ReplayConfig};
///
/// let config = ReplayConfig::new(CaptureConfig::new(ExpectedCode::new("2230").unwrap()));
/// // Two knocks, two knocks, three knocks, one second between digits.
/// let edges = [0, 200, 1200, 1400, 2400, 2600, 2800];
///
/// let sessions = replay(&edges, &config).unwrap();
/// assert_eq!(sessions.len(), 1);
/// assert_eq!(sessions[0].code(), "2230");
/// assert!(sessions[0].verdict.is_match());
/// ```
pub fn replay(edge_ticks_ms: &[u64], config: &ReplayConfig) -> Result<Vec<SessionReport>> {
    Ok(replay_timeline(edge_ticks_ms, config)?.sessions)
}

/// Like [`replay`], with unlock times and pulse accounting.
///
/// # Errors
/// Returns `Error::Config` if the capture configuration is invalid.
pub fn replay_timeline(edge_ticks_ms: &[u64], config: &ReplayConfig) -> Result<ReplayOutcome> {
    let mut edges = edge_ticks_ms.to_vec();
    edges.sort_unstable();

    let debouncer = LineDebouncer::new(config.debounce);
    let pulses: VecDeque<u64> = edges
        .into_iter()
        .filter(|&tick| debouncer.observe(tick))
        .collect();

    let mut outcome = ReplayOutcome {
        sessions: Vec::new(),
        unlocks: Vec::new(),
        pulses: pulses.len(),
        debounced: debouncer.rejected() as usize,
        dropped: 0,
        discarded: 0,
    };

    match config.mode {
        LineMode::Knock => replay_knock(pulses, config, &mut outcome)?,
        LineMode::Direct => replay_direct(pulses, config, &mut outcome),
    }
    Ok(outcome)
}

fn replay_knock(
    mut pulses: VecDeque<u64>,
    config: &ReplayConfig,
    outcome: &mut ReplayOutcome,
) -> Result<()> {
    let timeout = config.capture.digit_timeout.as_millis() as u64;
    let hold = config.hold.as_millis() as u64;
    let mut capture = CodeCapture::new(config.capture.clone())?;
    let mut deadline = 0;

    loop {
        let (now, step) = if capture.is_idle() {
            let Some(tick) = pulses.pop_front() else {
                break;
            };
            (tick, capture.on_pulse())
        } else {
            match pulses.front() {
                Some(&tick) if tick < deadline => {
                    pulses.pop_front();
                    (tick, capture.on_pulse())
                }
                _ => (deadline, capture.on_silence()),
            }
        };
        deadline = now.saturating_add(timeout);

        if let CaptureStep::Finished(report) = step {
            let matched = report.verdict.is_match();
            outcome.sessions.push(report);
            if matched {
                outcome.unlocks.push(now);
                let release = now.saturating_add(hold);
                outcome.dropped += hold_back(&mut pulses, release, config.channel_capacity);
            }
        }
    }
    Ok(())
}

fn replay_direct(mut pulses: VecDeque<u64>, config: &ReplayConfig, outcome: &mut ReplayOutcome) {
    let hold = config.hold.as_millis() as u64;
    while let Some(tick) = pulses.pop_front() {
        outcome.unlocks.push(tick);
        let release = tick.saturating_add(hold);
        let queued = pulses.iter().take_while(|&&t| t < release).count();
        let kept = queued.min(config.channel_capacity.max(1));
        outcome.dropped += queued - kept;
        outcome.discarded += kept;
        pulses.drain(..queued);
    }
}

/// Model the channel during a hold ending at `release`: pulses before the
/// release are delivered at the release, at most `capacity` of them.
/// Returns how many were dropped.
fn hold_back(pulses: &mut VecDeque<u64>, release: u64, capacity: usize) -> usize {
    let queued = pulses.iter().take_while(|&&tick| tick < release).count();
    let kept = queued.min(capacity.max(1));
    pulses.drain(..queued);
    for _ in 0..kept {
        pulses.push_front(release);
    }
    queued - kept
}
