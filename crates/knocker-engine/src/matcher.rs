//! Code matching.
//!
//! The expected code is compared against the *end* of the captured buffer, so
//! stray pulses before the real code (a bumped door, a second attempt started
//! without waiting) do not lock the user out.

use knocker_core::{CodeBuffer, ExpectedCode};
use serde::Serialize;
use std::fmt;

/// Outcome of comparing a captured buffer with the expected code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Match,
    Mismatch,
}

impl Verdict {
    #[must_use]
    pub fn is_match(&self) -> bool {
        matches!(self, Verdict::Match)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Match => write!(f, "match"),
            Verdict::Mismatch => write!(f, "mismatch"),
        }
    }
}

/// Compare the trailing `expected.len()` slots of `buffer` with `expected`.
///
/// A buffer shorter than the code never matches. A trailing `0` in the
/// expected code only matches an open slot, i.e. the code must be followed by
/// a pause.
///
/// # Examples
///
/// ```
/// use knocker_core::{CodeBuffer, ExpectedCode};
/// use knocker_engine::matcher::{match_code, Verdict};
///
/// let expected = ExpectedCode::new("21").unwrap();
/// let mut buffer = CodeBuffer::new(10).unwrap();
///
/// buffer.start(); // [1]
/// buffer.increment_active(); // [2]
/// buffer.open_slot(); // [2, 0]
/// buffer.increment_active(); // [2, 1]
///
/// assert_eq!(match_code(&buffer, &expected), Verdict::Match);
/// ```
#[must_use]
pub fn match_code(buffer: &CodeBuffer, expected: &ExpectedCode) -> Verdict {
    if buffer.len() >= expected.len() && buffer.ends_with(expected.slots()) {
        Verdict::Match
    } else {
        Verdict::Mismatch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    /// Build a buffer whose textual form is `text`.
    fn buffer(text: &str) -> CodeBuffer {
        let mut buffer = CodeBuffer::new(10).unwrap();
        for (i, c) in text.chars().enumerate() {
            let count = c.to_digit(10).unwrap() as u8;
            if i == 0 {
                buffer.start();
                for _ in 1..count {
                    buffer.increment_active();
                }
            } else {
                assert!(buffer.open_slot());
                for _ in 0..count {
                    buffer.increment_active();
                }
            }
        }
        assert_eq!(buffer.to_string(), text);
        buffer
    }

    #[rstest]
    #[case("2230", "2230", Verdict::Match)]
    #[case("112230", "2230", Verdict::Match)]
    #[case("92230", "2230", Verdict::Match)]
    #[case("2231", "2230", Verdict::Mismatch)]
    #[case("223", "2230", Verdict::Mismatch)] // no pause after the last digit
    #[case("230", "2230", Verdict::Mismatch)] // shorter than the code
    #[case("31", "31", Verdict::Match)]
    #[case("310", "31", Verdict::Mismatch)] // code without pause must be the last slot
    #[case("5", "5", Verdict::Match)]
    #[case("1", "2230", Verdict::Mismatch)]
    fn test_match_code(#[case] captured: &str, #[case] code: &str, #[case] expected: Verdict) {
        let code = ExpectedCode::new(code).unwrap();
        assert_eq!(match_code(&buffer(captured), &code), expected);
    }

    #[test]
    fn test_empty_buffer_never_matches() {
        let buffer = CodeBuffer::new(10).unwrap();
        let code = ExpectedCode::new("1").unwrap();
        assert_eq!(match_code(&buffer, &code), Verdict::Mismatch);
    }

    #[test]
    fn test_verdict_display() {
        assert_eq!(Verdict::Match.to_string(), "match");
        assert!(!Verdict::Mismatch.is_match());
    }
}
