//! Default timing and sizing constants for knock-code recognition.
//!
//! These are the values the reference door controller ships with. Every one of
//! them can be overridden through [`KnockerConfig`](crate::KnockerConfig); the
//! constants exist so that tests, the CLI and the config defaults agree on a
//! single source of truth.
//!
//! # Timing model
//!
//! ```text
//!  pulse pulse pulse        pulse        (silence ...)
//!    |    |    |              |
//!    +----+----+----800ms----+----800ms----800ms----800ms----800ms
//!      digit 3     pause        digit 1    t1     t2     t3     t4 -> end
//! ```
//!
//! A burst of pulses closer than [`DEFAULT_DIGIT_TIMEOUT_MS`] is one digit.
//! One silent timeout closes the digit; more than
//! [`DEFAULT_ABANDON_AFTER_TIMEOUTS`] consecutive timeouts end the session.

// ============================================================================
// Timing
// ============================================================================

/// Silence after which the current digit is closed (milliseconds).
///
/// # Examples
///
/// ```
/// use knocker_core::constants::DEFAULT_DIGIT_TIMEOUT_MS;
/// use std::time::Duration;
///
/// let timeout = Duration::from_millis(DEFAULT_DIGIT_TIMEOUT_MS);
/// assert_eq!(timeout.as_millis(), 800);
/// ```
pub const DEFAULT_DIGIT_TIMEOUT_MS: u64 = 800;

/// A session ends once the consecutive timeout count exceeds this value.
pub const DEFAULT_ABANDON_AFTER_TIMEOUTS: u32 = 3;

/// Minimum spacing between two forwarded pulses on one line (milliseconds).
pub const DEFAULT_DEBOUNCE_MS: u64 = 20;

/// How long the unlock output stays active (milliseconds).
pub const DEFAULT_UNLOCK_HOLD_MS: u64 = 2000;

// ============================================================================
// Sizing
// ============================================================================

/// Default maximum number of digit slots in a capture session.
pub const DEFAULT_MAX_CODE_LENGTH: usize = 10;

/// Hard upper bound for the configurable maximum code length.
///
/// The code buffer is a fixed array of this many slots so that capturing never
/// allocates.
pub const MAX_CODE_LENGTH_LIMIT: usize = 32;

/// Default capacity of each line's pulse channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 10;

/// Highest pulse count a single digit slot can hold. Further pulses saturate.
pub const MAX_DIGIT_VALUE: u8 = 9;

// ============================================================================
// Code
// ============================================================================

/// Code accepted when no configuration overrides it.
///
/// Digits 2, 2 and 3 followed by a pause (the trailing `0` is the open slot).
pub const DEFAULT_EXPECTED_CODE: &str = "2230";

// ============================================================================
// Reference wiring
// ============================================================================

/// GPIO driving the lock solenoid.
pub const DEFAULT_UNLOCK_PIN: u8 = 18;

/// GPIO of the piezo/microphone knock detector.
pub const DEFAULT_MICROPHONE_PIN: u8 = 5;

/// GPIO of the door button.
pub const DEFAULT_BUTTON_PIN: u8 = 0;
