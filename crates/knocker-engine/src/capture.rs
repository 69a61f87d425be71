//! Code capture state machine.
//!
//! Turns a stream of pulses and silence timeouts into a [`CodeBuffer`].
//!
//! # States
//!
//! - `Idle`: no session. The first pulse starts one.
//! - `Capturing`: counting pulses into the active slot. Every digit timeout
//!   of silence closes the current digit (opens a new slot) until enough
//!   consecutive timeouts end the session.
//!
//! # Transitions
//!
//! ```text
//!            pulse                       pulse (count, reset timeouts)
//!   Idle ───────────▶ Capturing ◀──────────────┐
//!    ▲                    │ silence            │
//!    │                    ├────────────────────┘ open slot / wait
//!    │    finished        │
//!    └────────────────────┘ timeouts > threshold, buffer full, early match
//! ```
//!
//! The machine is pure: the caller owns the clock and decides when a silence
//! timeout happened. The live recognizer and the offline replay drive the
//! same code.

use crate::matcher::{Verdict, match_code};
use chrono::{DateTime, Utc};
use knocker_core::{
    CodeBuffer, ExpectedCode, KnockerConfig, MatchPolicy, Result, TerminationPolicy,
    constants::{DEFAULT_ABANDON_AFTER_TIMEOUTS, DEFAULT_DIGIT_TIMEOUT_MS, DEFAULT_MAX_CODE_LENGTH},
};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Capture parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    pub expected: ExpectedCode,
    pub digit_timeout: Duration,
    pub abandon_after: u32,
    pub max_code_length: usize,
    pub termination: TerminationPolicy,
    pub match_policy: MatchPolicy,
}

impl CaptureConfig {
    /// Defaults for everything except the code.
    pub fn new(expected: ExpectedCode) -> Self {
        Self {
            expected,
            digit_timeout: Duration::from_millis(DEFAULT_DIGIT_TIMEOUT_MS),
            abandon_after: DEFAULT_ABANDON_AFTER_TIMEOUTS,
            max_code_length: DEFAULT_MAX_CODE_LENGTH,
            termination: TerminationPolicy::default(),
            match_policy: MatchPolicy::default(),
        }
    }

    pub fn with_digit_timeout(mut self, timeout: Duration) -> Self {
        self.digit_timeout = timeout;
        self
    }

    pub fn with_abandon_after(mut self, timeouts: u32) -> Self {
        self.abandon_after = timeouts;
        self
    }

    pub fn with_max_code_length(mut self, length: usize) -> Self {
        self.max_code_length = length;
        self
    }

    pub fn with_termination(mut self, termination: TerminationPolicy) -> Self {
        self.termination = termination;
        self
    }

    pub fn with_match_policy(mut self, policy: MatchPolicy) -> Self {
        self.match_policy = policy;
        self
    }
}

impl From<&KnockerConfig> for CaptureConfig {
    fn from(config: &KnockerConfig) -> Self {
        Self {
            expected: config.expected_code.clone(),
            digit_timeout: config.digit_timeout(),
            abandon_after: config.abandon_after_timeouts,
            max_code_length: config.max_code_length,
            termination: config.termination,
            match_policy: config.match_policy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    Idle,
    Capturing,
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureState::Idle => write!(f, "Idle"),
            CaptureState::Capturing => write!(f, "Capturing"),
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEnd {
    /// More consecutive timeouts than the abandonment threshold.
    Abandoned,

    /// The buffer had no room left for another digit.
    BufferFull,

    /// The trailing digits matched at a timeout (eager matching).
    EarlyMatch,
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEnd::Abandoned => write!(f, "abandoned"),
            SessionEnd::BufferFull => write!(f, "buffer full"),
            SessionEnd::EarlyMatch => write!(f, "early match"),
        }
    }
}

/// Summary of a finished session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionReport {
    /// Buffer as it was when the session ended.
    pub buffer: CodeBuffer,
    pub verdict: Verdict,
    pub end: SessionEnd,
    /// Pulses received, including the first one and saturated ones.
    pub pulses: u32,
    /// Consecutive timeouts at the end of the session.
    pub timeouts: u32,
    /// Pulses that arrived while the active digit was already at 9.
    pub saturated_pulses: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl SessionReport {
    /// Captured code in textual form, e.g. `"2230"`.
    #[must_use]
    pub fn code(&self) -> String {
        self.buffer.to_string()
    }
}

/// Result of feeding one input to [`CodeCapture`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureStep {
    /// First pulse of a session.
    Started,

    /// Pulse counted; the active digit now holds `digit`.
    Counted { digit: u8 },

    /// Pulse arrived while the active digit was already at its maximum.
    Saturated,

    /// Silence closed the active digit and opened a new slot.
    DigitClosed { timeouts: u32 },

    /// Silence while the active slot is still open (or the buffer is full).
    Waiting { timeouts: u32 },

    /// Silence while idle.
    Ignored,

    /// The session ended.
    Finished(SessionReport),
}

/// Capture state machine for one line.
///
/// # Examples
///
/// ```
/// use knocker_core::ExpectedCode;
/// use knocker_engine::capture::{CaptureConfig, CaptureStep, CodeCapture};
///
/// let config = CaptureConfig::new(ExpectedCode::new("20").unwrap()).with_abandon_after(1);
/// let mut capture = CodeCapture::new(config).unwrap();
///
/// assert_eq!(capture.on_pulse(), CaptureStep::Started);
/// assert_eq!(capture.on_pulse(), CaptureStep::Counted { digit: 2 });
/// assert_eq!(capture.on_silence(), CaptureStep::DigitClosed { timeouts: 1 });
///
/// match capture.on_silence() {
///     CaptureStep::Finished(report) => {
///         assert!(report.verdict.is_match());
///         assert_eq!(report.code(), "20");
///     }
///     other => panic!("unexpected step {other:?}"),
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CodeCapture {
    config: CaptureConfig,
    state: CaptureState,
    buffer: CodeBuffer,
    timeouts: u32,
    pulses: u32,
    saturated_pulses: u32,
    started_at: DateTime<Utc>,
}

impl CodeCapture {
    /// # Errors
    /// Returns `Error::Config` if the maximum code length is out of range.
    pub fn new(config: CaptureConfig) -> Result<Self> {
        let buffer = CodeBuffer::new(config.max_code_length)?;
        Ok(Self {
            config,
            state: CaptureState::Idle,
            buffer,
            timeouts: 0,
            pulses: 0,
            saturated_pulses: 0,
            started_at: Utc::now(),
        })
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == CaptureState::Idle
    }

    /// Buffer of the current (or last finished) session.
    pub fn buffer(&self) -> &CodeBuffer {
        &self.buffer
    }

    /// Consecutive timeouts in the current session.
    pub fn timeouts(&self) -> u32 {
        self.timeouts
    }

    /// Feed one pulse.
    pub fn on_pulse(&mut self) -> CaptureStep {
        match self.state {
            CaptureState::Idle => {
                self.state = CaptureState::Capturing;
                self.buffer.start();
                self.timeouts = 0;
                self.pulses = 1;
                self.saturated_pulses = 0;
                self.started_at = Utc::now();
                CaptureStep::Started
            }
            CaptureState::Capturing => {
                self.pulses = self.pulses.saturating_add(1);
                self.timeouts = 0;
                if self.buffer.increment_active() {
                    CaptureStep::Counted {
                        digit: self.buffer.active().unwrap_or_default(),
                    }
                } else {
                    self.saturated_pulses = self.saturated_pulses.saturating_add(1);
                    CaptureStep::Saturated
                }
            }
        }
    }

    /// Feed one digit timeout of silence.
    pub fn on_silence(&mut self) -> CaptureStep {
        if self.state == CaptureState::Idle {
            return CaptureStep::Ignored;
        }

        self.timeouts = self.timeouts.saturating_add(1);

        if self.timeouts > self.config.abandon_after {
            return self.finish(SessionEnd::Abandoned);
        }
        if self.config.termination == TerminationPolicy::TimeoutsOrFull && self.buffer.is_full() {
            return self.finish(SessionEnd::BufferFull);
        }
        if self.config.match_policy == MatchPolicy::EveryTimeout
            && match_code(&self.buffer, &self.config.expected).is_match()
        {
            return self.finish(SessionEnd::EarlyMatch);
        }

        if self.buffer.open_slot() {
            CaptureStep::DigitClosed {
                timeouts: self.timeouts,
            }
        } else {
            CaptureStep::Waiting {
                timeouts: self.timeouts,
            }
        }
    }

    /// Drop the current session without a report.
    pub fn reset(&mut self) {
        self.state = CaptureState::Idle;
        self.buffer.clear();
        self.timeouts = 0;
        self.pulses = 0;
        self.saturated_pulses = 0;
    }

    fn finish(&mut self, end: SessionEnd) -> CaptureStep {
        self.state = CaptureState::Idle;
        CaptureStep::Finished(SessionReport {
            buffer: self.buffer,
            verdict: match_code(&self.buffer, &self.config.expected),
            end,
            pulses: self.pulses,
            timeouts: self.timeouts,
            saturated_pulses: self.saturated_pulses,
            started_at: self.started_at,
            ended_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn capture(code: &str) -> CodeCapture {
        CodeCapture::new(CaptureConfig::new(ExpectedCode::new(code).unwrap())).unwrap()
    }

    /// Knock `digits` with one timeout between them, then stay silent until
    /// the session ends.
    fn knock(capture: &mut CodeCapture, digits: &[u8]) -> SessionReport {
        for (i, &digit) in digits.iter().enumerate() {
            if i > 0 {
                assert!(matches!(capture.on_silence(), CaptureStep::DigitClosed { .. }));
            }
            for _ in 0..digit {
                capture.on_pulse();
            }
        }
        finish(capture)
    }

    fn finish(capture: &mut CodeCapture) -> SessionReport {
        for _ in 0..64 {
            if let CaptureStep::Finished(report) = capture.on_silence() {
                return report;
            }
        }
        panic!("session never finished");
    }

    #[test]
    fn test_first_pulse_starts_session() {
        let mut capture = capture("2230");
        assert!(capture.is_idle());

        assert_eq!(capture.on_pulse(), CaptureStep::Started);
        assert_eq!(capture.state(), CaptureState::Capturing);
        assert_eq!(capture.buffer().to_string(), "1");
        assert_eq!(capture.timeouts(), 0);
    }

    #[test]
    fn test_silence_while_idle_is_ignored() {
        let mut capture = capture("2230");
        assert_eq!(capture.on_silence(), CaptureStep::Ignored);
        assert!(capture.is_idle());
    }

    #[test]
    fn test_three_pushes_then_abandon() {
        let mut capture = capture("2230");
        for _ in 0..3 {
            capture.on_pulse();
        }
        assert_eq!(capture.buffer().to_string(), "3");

        assert_eq!(capture.on_silence(), CaptureStep::DigitClosed { timeouts: 1 });
        assert_eq!(capture.on_silence(), CaptureStep::Waiting { timeouts: 2 });
        assert_eq!(capture.on_silence(), CaptureStep::Waiting { timeouts: 3 });

        let CaptureStep::Finished(report) = capture.on_silence() else {
            panic!("fourth timeout must end the session");
        };
        assert_eq!(report.end, SessionEnd::Abandoned);
        assert_eq!(report.verdict, Verdict::Mismatch);
        assert_eq!(report.timeouts, 4);
        assert_eq!(report.pulses, 3);
        assert_eq!(report.code(), "30");
        assert!(capture.is_idle());
    }

    #[test]
    fn test_exact_code_matches() {
        let mut capture = capture("2230");
        let report = knock(&mut capture, &[2, 2, 3]);

        assert_eq!(report.code(), "2230");
        assert_eq!(report.verdict, Verdict::Match);
        assert_eq!(report.end, SessionEnd::Abandoned);
    }

    #[test]
    fn test_multi_digit_code() {
        let mut capture = capture("31");
        // A code without a trailing pause must still be the last slot, which
        // only happens when the buffer is full at finalization.
        let report = knock(&mut capture, &[3, 1]);
        assert_eq!(report.code(), "310");
        assert_eq!(report.verdict, Verdict::Mismatch);

        let mut capture = CodeCapture::new(
            CaptureConfig::new(ExpectedCode::new("31").unwrap()).with_max_code_length(2),
        )
        .unwrap();
        let report = knock(&mut capture, &[3, 1]);
        assert_eq!(report.code(), "31");
        assert_eq!(report.verdict, Verdict::Match);
        assert_eq!(report.end, SessionEnd::BufferFull);
    }

    #[test]
    fn test_multi_digit_code_with_pause() {
        let mut capture = capture("310");
        let report = knock(&mut capture, &[3, 1]);
        assert_eq!(report.code(), "310");
        assert_eq!(report.verdict, Verdict::Match);
    }

    #[test]
    fn test_leading_noise_is_tolerated() {
        let mut capture = capture("2230");
        let report = knock(&mut capture, &[1, 1, 2, 2, 3]);
        assert_eq!(report.code(), "112230");
        assert_eq!(report.verdict, Verdict::Match);
    }

    #[test]
    fn test_wrong_last_digit() {
        let mut capture = capture("2230");
        let report = knock(&mut capture, &[2, 2, 3, 1]);
        assert_eq!(report.code(), "22310");
        assert_eq!(report.verdict, Verdict::Mismatch);
    }

    #[test]
    fn test_pulse_after_timeout_resets_counter() {
        let mut capture = capture("2230");
        capture.on_pulse();
        capture.on_silence();
        capture.on_silence();
        assert_eq!(capture.timeouts(), 2);

        assert_eq!(capture.on_pulse(), CaptureStep::Counted { digit: 1 });
        assert_eq!(capture.timeouts(), 0);
        assert_eq!(capture.buffer().to_string(), "11");
    }

    #[test]
    fn test_open_slot_is_not_reopened() {
        let mut capture = capture("2230");
        capture.on_pulse();

        assert_eq!(capture.on_silence(), CaptureStep::DigitClosed { timeouts: 1 });
        assert_eq!(capture.on_silence(), CaptureStep::Waiting { timeouts: 2 });
        assert_eq!(capture.buffer().to_string(), "10");
    }

    #[test]
    fn test_digit_saturates_at_nine() {
        let mut capture = capture("2230");
        for _ in 0..9 {
            capture.on_pulse();
        }
        assert_eq!(capture.on_pulse(), CaptureStep::Saturated);
        assert_eq!(capture.on_pulse(), CaptureStep::Saturated);
        assert_eq!(capture.buffer().to_string(), "9");

        let report = finish(&mut capture);
        assert_eq!(report.pulses, 11);
        assert_eq!(report.saturated_pulses, 2);
        assert_eq!(report.code(), "90");
    }

    #[rstest]
    #[case(TerminationPolicy::TimeoutsOrFull, SessionEnd::BufferFull, 2)]
    #[case(TerminationPolicy::TimeoutsOnly, SessionEnd::Abandoned, 4)]
    fn test_termination_policy(
        #[case] termination: TerminationPolicy,
        #[case] end: SessionEnd,
        #[case] timeouts: u32,
    ) {
        let config = CaptureConfig::new(ExpectedCode::new("2230").unwrap())
            .with_max_code_length(4)
            .with_termination(termination);
        let mut capture = CodeCapture::new(config).unwrap();

        let report = knock(&mut capture, &[2, 2, 3]);
        assert_eq!(report.code(), "2230");
        assert_eq!(report.end, end);
        assert_eq!(report.timeouts, timeouts);
        assert!(report.verdict.is_match());
    }

    #[test]
    fn test_full_buffer_never_grows() {
        let config = CaptureConfig::new(ExpectedCode::new("1").unwrap())
            .with_max_code_length(2)
            .with_termination(TerminationPolicy::TimeoutsOnly);
        let mut capture = CodeCapture::new(config).unwrap();

        capture.on_pulse();
        capture.on_silence();
        capture.on_pulse();
        assert_eq!(capture.on_silence(), CaptureStep::Waiting { timeouts: 1 });
        assert_eq!(capture.buffer().len(), 2);
    }

    #[test]
    fn test_every_timeout_matches_early() {
        let config = CaptureConfig::new(ExpectedCode::new("2230").unwrap())
            .with_match_policy(MatchPolicy::EveryTimeout);
        let mut capture = CodeCapture::new(config).unwrap();

        let report = knock(&mut capture, &[2, 2, 3]);
        assert_eq!(report.end, SessionEnd::EarlyMatch);
        assert_eq!(report.verdict, Verdict::Match);
        // Digit closed at the first timeout, matched at the second.
        assert_eq!(report.timeouts, 2);
    }

    #[test]
    fn test_new_session_after_finish() {
        let mut capture = capture("2230");
        knock(&mut capture, &[4]);

        assert_eq!(capture.on_pulse(), CaptureStep::Started);
        assert_eq!(capture.buffer().to_string(), "1");
    }

    #[test]
    fn test_reset_drops_session() {
        let mut capture = capture("2230");
        capture.on_pulse();
        capture.on_pulse();

        capture.reset();
        assert!(capture.is_idle());
        assert!(capture.buffer().is_empty());
    }

    #[test]
    fn test_invalid_length_rejected() {
        let config = CaptureConfig::new(ExpectedCode::new("1").unwrap()).with_max_code_length(0);
        assert!(CodeCapture::new(config).is_err());
    }

    #[test]
    fn test_from_knocker_config() {
        let config = CaptureConfig::from(&KnockerConfig::default());
        assert_eq!(config.expected.to_string(), "2230");
        assert_eq!(config.digit_timeout, Duration::from_millis(800));
        assert_eq!(config.abandon_after, 3);
        assert_eq!(config.termination, TerminationPolicy::TimeoutsOrFull);
    }
}
