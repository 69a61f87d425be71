//! Knock-code recognition engine.
//!
//! Turns raw edges on input lines into unlock decisions:
//!
//! ```text
//! edge ─► debounce ─► pulse channel ─► capture state machine ─► matcher ─► unlock
//! ```
//!
//! - [`dispatch::EdgeDispatcher`] is the edge entry point (clock, per-line
//!   debounce, lock-free enqueue).
//! - [`recognizer::Recognizer`] is the per-line task that runs
//!   [`capture::CodeCapture`] and calls [`unlock::UnlockDriver`] on a match.
//! - [`manager::LineManager`] wires the lines together and spawns the tasks.
//! - [`replay`](mod@replay) evaluates recorded edge timelines offline.

pub mod capture;
pub mod channel;
pub mod clock;
pub mod debounce;
pub mod dispatch;
pub mod error;
pub mod manager;
pub mod matcher;
pub mod recognizer;
pub mod replay;
pub mod unlock;

pub use capture::{CaptureConfig, CaptureState, CaptureStep, CodeCapture, SessionEnd, SessionReport};
pub use channel::{PulseReceiver, PulseSender, RecvError, TrySendError, pulse_channel};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use debounce::{DebounceFilter, LineDebouncer};
pub use dispatch::EdgeDispatcher;
pub use error::{EngineError, Result};
pub use manager::{LineHandle, LineManager, LineSpec, LineStats, ShutdownSummary};
pub use matcher::{Verdict, match_code};
pub use recognizer::{LineCounters, LineEvent, Recognizer};
pub use replay::{ReplayConfig, ReplayOutcome, replay, replay_timeline};
pub use unlock::UnlockDriver;
