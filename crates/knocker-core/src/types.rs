use crate::{
    Result,
    constants::{MAX_CODE_LENGTH_LIMIT, MAX_DIGIT_VALUE},
    error::Error,
};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Input line identifier (the GPIO number the line is wired to).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LineId(u8);

impl LineId {
    /// Create a line identifier for the given GPIO number.
    #[must_use]
    pub const fn new(pin: u8) -> Self {
        LineId(pin)
    }

    /// Get the raw GPIO number.
    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "gpio{}", self.0)
    }
}

/// One debounced pulse on a line.
///
/// Recognition treats this as a zero-payload marker; the tick is carried for
/// logging and for the replay tooling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PulseEvent {
    /// Line the pulse was seen on.
    pub line: LineId,

    /// Monotonic tick (milliseconds) at which the edge was observed.
    pub tick_ms: u64,
}

impl PulseEvent {
    #[must_use]
    pub fn new(line: LineId, tick_ms: u64) -> Self {
        Self { line, tick_ms }
    }
}

/// Run-length encoded pulse counts captured during one session.
///
/// Each slot holds the number of pulses in one burst. Only the last slot is
/// ever written to, and only the last slot may be zero: that happens right
/// after a digit pause opened it and before the next pulse arrives (the "open
/// slot"). The textual form renders every slot as a digit, so `"2230"` means
/// digits 2, 2 and 3 followed by a pause.
///
/// Storage is a fixed array so capturing never allocates.
///
/// # Examples
///
/// ```
/// use knocker_core::CodeBuffer;
///
/// let mut buffer = CodeBuffer::new(10).unwrap();
/// buffer.start();
/// buffer.increment_active();
/// buffer.open_slot();
/// assert_eq!(buffer.to_string(), "20");
/// assert_eq!(buffer.digits(), &[2]);
/// ```
#[derive(Clone, Copy)]
pub struct CodeBuffer {
    slots: [u8; MAX_CODE_LENGTH_LIMIT],
    len: usize,
    capacity: usize,
}

impl CodeBuffer {
    /// Create an empty buffer holding at most `capacity` slots.
    ///
    /// # Errors
    /// Returns `Error::Config` if the capacity is zero or larger than
    /// [`MAX_CODE_LENGTH_LIMIT`].
    pub fn new(capacity: usize) -> Result<Self> {
        if !(1..=MAX_CODE_LENGTH_LIMIT).contains(&capacity) {
            return Err(Error::Config(format!(
                "Code length must be 1-{MAX_CODE_LENGTH_LIMIT}, got {capacity}"
            )));
        }
        Ok(Self {
            slots: [0; MAX_CODE_LENGTH_LIMIT],
            len: 0,
            capacity,
        })
    }

    /// Reset to a single slot holding the first pulse of a session.
    pub fn start(&mut self) {
        self.clear();
        self.slots[0] = 1;
        self.len = 1;
    }

    /// Remove every slot.
    pub fn clear(&mut self) {
        self.slots = [0; MAX_CODE_LENGTH_LIMIT];
        self.len = 0;
    }

    /// Count one more pulse in the active slot.
    ///
    /// Returns `false` when the pulse could not be counted, either because the
    /// buffer is empty or because the slot is already at [`MAX_DIGIT_VALUE`].
    pub fn increment_active(&mut self) -> bool {
        match self.slots[..self.len].last_mut() {
            Some(slot) if *slot < MAX_DIGIT_VALUE => {
                *slot += 1;
                true
            }
            _ => false,
        }
    }

    /// Open a new zero slot after a digit pause.
    ///
    /// Only happens when the active slot already holds a pulse and there is
    /// room left, so a zero never ends up anywhere but the last position.
    /// Returns whether a slot was opened.
    pub fn open_slot(&mut self) -> bool {
        match self.active() {
            Some(value) if value != 0 && !self.is_full() => {
                self.slots[self.len] = 0;
                self.len += 1;
                true
            }
            _ => false,
        }
    }

    /// Value of the active (last) slot.
    #[must_use]
    pub fn active(&self) -> Option<u8> {
        self.slots().last().copied()
    }

    /// Whether the last slot was opened by a pause and has no pulse yet.
    #[must_use]
    pub fn has_open_slot(&self) -> bool {
        self.active() == Some(0)
    }

    /// All slots, including a trailing open slot.
    #[must_use]
    pub fn slots(&self) -> &[u8] {
        &self.slots[..self.len]
    }

    /// Completed digits: every slot except a trailing open slot. Never contains 0.
    #[must_use]
    pub fn digits(&self) -> &[u8] {
        if self.has_open_slot() {
            &self.slots[..self.len - 1]
        } else {
            self.slots()
        }
    }

    /// Whether the trailing slots equal `code` exactly.
    #[must_use]
    pub fn ends_with(&self, code: &[u8]) -> bool {
        self.slots().ends_with(code)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len >= self.capacity
    }
}

impl PartialEq for CodeBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.capacity == other.capacity && self.slots() == other.slots()
    }
}

impl Eq for CodeBuffer {}

impl fmt::Display for CodeBuffer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for slot in self.slots() {
            write!(f, "{slot}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for CodeBuffer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "CodeBuffer(\"{self}\"/{})", self.capacity)
    }
}

impl Serialize for CodeBuffer {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The secret knock code a session has to end with.
///
/// Digits `1`-`9`, optionally followed by a single `0` that stands for a
/// trailing pause (an open slot in the [`CodeBuffer`]).
///
/// # Examples
///
/// ```
/// use knocker_core::ExpectedCode;
///
/// let code: ExpectedCode = "2230".parse().unwrap();
/// assert_eq!(code.slots(), &[2, 2, 3, 0]);
/// assert!(code.requires_pause());
///
/// assert!("2030".parse::<ExpectedCode>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExpectedCode(Vec<u8>);

impl ExpectedCode {
    /// Parse and validate an expected code.
    ///
    /// # Errors
    /// Returns `Error::InvalidCode` if the code is empty, contains anything but
    /// ASCII digits, or has a zero anywhere except the last position.
    pub fn new(code: &str) -> Result<Self> {
        let code = code.trim();
        if code.is_empty() {
            return Err(Error::InvalidCode("code must not be empty".to_string()));
        }

        let mut slots = Vec::with_capacity(code.len());
        for (i, c) in code.chars().enumerate() {
            let value = c
                .to_digit(10)
                .ok_or_else(|| Error::InvalidCode(format!("'{c}' is not a digit in \"{code}\"")))?
                as u8;
            if value == 0 && i + 1 != code.len() {
                return Err(Error::InvalidCode(format!(
                    "zero only allowed as trailing pause, got \"{code}\""
                )));
            }
            slots.push(value);
        }

        if slots == [0] {
            return Err(Error::InvalidCode(
                "code needs at least one non-zero digit".to_string(),
            ));
        }

        Ok(ExpectedCode(slots))
    }

    /// Build a code from a digit string that is known to pass
    /// [`ExpectedCode::new`].
    pub(crate) fn from_digits_unchecked(code: &str) -> Self {
        debug_assert!(ExpectedCode::new(code).is_ok(), "invalid built-in code");
        ExpectedCode(code.bytes().map(|b| b - b'0').collect())
    }

    /// Slot values to compare against the tail of a [`CodeBuffer`].
    #[must_use]
    pub fn slots(&self) -> &[u8] {
        &self.0
    }

    /// Whether the code ends with a pause marker.
    #[must_use]
    pub fn requires_pause(&self) -> bool {
        self.0.last() == Some(&0)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ExpectedCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for slot in &self.0 {
            write!(f, "{slot}")?;
        }
        Ok(())
    }
}

impl std::str::FromStr for ExpectedCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ExpectedCode::new(s)
    }
}

impl TryFrom<String> for ExpectedCode {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        ExpectedCode::new(&value)
    }
}

impl From<ExpectedCode> for String {
    fn from(code: ExpectedCode) -> Self {
        code.to_string()
    }
}
