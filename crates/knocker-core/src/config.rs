//! Deploy-time configuration loaded from TOML.
//!
//! Every field has a default matching the reference door controller, so an
//! empty file (or no file at all) yields a working two-line setup: a knock
//! microphone on GPIO5 and a door button on GPIO0, both recognizing `2230`.
//!
//! # Examples
//!
//! ```
//! use knocker_core::{KnockerConfig, LineMode};
//!
//! let config = KnockerConfig::from_toml_str(r#"
//!     expected_code = "3110"
//!
//!     [[lines]]
//!     name = "door"
//!     pin = 4
//!     mode = "direct"
//! "#).unwrap();
//!
//! assert_eq!(config.expected_code.to_string(), "3110");
//! assert_eq!(config.lines[0].mode, LineMode::Direct);
//! ```

use crate::{
    ExpectedCode, LineId, Result,
    constants::{
        DEFAULT_ABANDON_AFTER_TIMEOUTS, DEFAULT_BUTTON_PIN, DEFAULT_CHANNEL_CAPACITY,
        DEFAULT_DEBOUNCE_MS, DEFAULT_DIGIT_TIMEOUT_MS, DEFAULT_EXPECTED_CODE,
        DEFAULT_MAX_CODE_LENGTH, DEFAULT_MICROPHONE_PIN, DEFAULT_UNLOCK_HOLD_MS,
        DEFAULT_UNLOCK_PIN, MAX_CODE_LENGTH_LIMIT,
    },
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// When a capture session is allowed to end on its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TerminationPolicy {
    /// Only the consecutive timeout threshold ends a session.
    TimeoutsOnly,

    /// The timeout threshold or a full code buffer ends a session.
    #[default]
    TimeoutsOrFull,
}

/// When the captured code is compared against the expected code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchPolicy {
    /// Compare once, when the session is finalized.
    #[default]
    OnFinalize,

    /// Compare on every silence timeout and unlock as soon as the tail matches.
    EveryTimeout,
}

/// How a line turns pulses into an unlock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LineMode {
    /// Pulses are captured into a knock code and matched.
    #[default]
    Knock,

    /// Any pulse unlocks immediately (exit button).
    Direct,
}

/// Edge that produces a pulse notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgePolarity {
    #[default]
    Rising,
    Falling,
}

/// Internal pull resistor state of an input line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pull {
    #[default]
    None,
    Up,
    Down,
}

/// One input line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineConfig {
    /// Human readable name used in logs.
    pub name: String,

    /// GPIO number; doubles as the line identifier.
    pub pin: u8,

    #[serde(default)]
    pub edge: EdgePolarity,

    #[serde(default)]
    pub pull: Pull,

    #[serde(default)]
    pub mode: LineMode,
}

impl LineConfig {
    pub fn new(name: impl Into<String>, pin: u8) -> Self {
        Self {
            name: name.into(),
            pin,
            edge: EdgePolarity::default(),
            pull: Pull::default(),
            mode: LineMode::default(),
        }
    }

    pub fn with_edge(mut self, edge: EdgePolarity) -> Self {
        self.edge = edge;
        self
    }

    pub fn with_pull(mut self, pull: Pull) -> Self {
        self.pull = pull;
        self
    }

    pub fn with_mode(mut self, mode: LineMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn line_id(&self) -> LineId {
        LineId::new(self.pin)
    }
}

/// Unlock output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnlockConfig {
    /// GPIO driving the lock.
    pub pin: u8,

    /// How long the output stays active, in milliseconds.
    pub hold_ms: u64,
}

impl Default for UnlockConfig {
    fn default() -> Self {
        Self {
            pin: DEFAULT_UNLOCK_PIN,
            hold_ms: DEFAULT_UNLOCK_HOLD_MS,
        }
    }
}

impl UnlockConfig {
    #[must_use]
    pub fn hold(&self) -> Duration {
        Duration::from_millis(self.hold_ms)
    }
}

/// Complete controller configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnockerConfig {
    pub expected_code: ExpectedCode,
    pub digit_timeout_ms: u64,
    pub abandon_after_timeouts: u32,
    pub debounce_ms: u64,
    pub max_code_length: usize,
    pub channel_capacity: usize,
    pub termination: TerminationPolicy,
    pub match_policy: MatchPolicy,
    pub unlock: UnlockConfig,
    pub lines: Vec<LineConfig>,
}

impl Default for KnockerConfig {
    fn default() -> Self {
        Self {
            expected_code: default_expected_code(),
            digit_timeout_ms: DEFAULT_DIGIT_TIMEOUT_MS,
            abandon_after_timeouts: DEFAULT_ABANDON_AFTER_TIMEOUTS,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            max_code_length: DEFAULT_MAX_CODE_LENGTH,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            termination: TerminationPolicy::default(),
            match_policy: MatchPolicy::default(),
            unlock: UnlockConfig::default(),
            lines: default_lines(),
        }
    }
}

fn default_expected_code() -> ExpectedCode {
    ExpectedCode::from_digits_unchecked(DEFAULT_EXPECTED_CODE)
}

fn default_lines() -> Vec<LineConfig> {
    vec![
        LineConfig::new("microphone", DEFAULT_MICROPHONE_PIN).with_edge(EdgePolarity::Rising),
        LineConfig::new("button", DEFAULT_BUTTON_PIN)
            .with_edge(EdgePolarity::Falling)
            .with_pull(Pull::Up),
    ]
}

impl KnockerConfig {
    /// Parse and validate a TOML document.
    ///
    /// # Errors
    /// Returns `Error::ConfigParse` for malformed TOML and `Error::Config` or
    /// `Error::InvalidCode` when a value fails validation.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: KnockerConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    ///
    /// # Errors
    /// Returns `Error::Io` if the file cannot be read, otherwise the same
    /// errors as [`from_toml_str`](Self::from_toml_str).
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    /// Returns `Error::Config` describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if self.digit_timeout_ms == 0 {
            return Err(Error::Config("digit_timeout_ms must be positive".to_string()));
        }
        if self.abandon_after_timeouts == 0 {
            return Err(Error::Config(
                "abandon_after_timeouts must be positive".to_string(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(Error::Config("channel_capacity must be positive".to_string()));
        }
        if self.debounce_ms >= self.digit_timeout_ms {
            return Err(Error::Config(format!(
                "debounce_ms ({}) must be shorter than digit_timeout_ms ({})",
                self.debounce_ms, self.digit_timeout_ms
            )));
        }
        if !(1..=MAX_CODE_LENGTH_LIMIT).contains(&self.max_code_length) {
            return Err(Error::Config(format!(
                "max_code_length must be 1-{MAX_CODE_LENGTH_LIMIT}, got {}",
                self.max_code_length
            )));
        }
        if self.expected_code.len() > self.max_code_length {
            return Err(Error::InvalidCode(format!(
                "\"{}\" is longer than max_code_length {}",
                self.expected_code, self.max_code_length
            )));
        }
        if self.lines.is_empty() {
            return Err(Error::Config("at least one input line is required".to_string()));
        }

        let mut pins = HashSet::new();
        let mut names = HashSet::new();
        for line in &self.lines {
            if line.name.trim().is_empty() {
                return Err(Error::InvalidLine(format!("line on pin {} has no name", line.pin)));
            }
            if !pins.insert(line.pin) {
                return Err(Error::InvalidLine(format!("pin {} used twice", line.pin)));
            }
            if !names.insert(line.name.as_str()) {
                return Err(Error::InvalidLine(format!("name '{}' used twice", line.name)));
            }
            if line.pin == self.unlock.pin {
                return Err(Error::InvalidLine(format!(
                    "line '{}' uses the unlock pin {}",
                    line.name, line.pin
                )));
            }
        }

        Ok(())
    }

    #[must_use]
    pub fn digit_timeout(&self) -> Duration {
        Duration::from_millis(self.digit_timeout_ms)
    }

    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Look up a line by name.
    #[must_use]
    pub fn line(&self, name: &str) -> Option<&LineConfig> {
        self.lines.iter().find(|line| line.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = KnockerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.expected_code.to_string(), "2230");
        assert_eq!(config.digit_timeout(), Duration::from_millis(800));
        assert_eq!(config.unlock.hold(), Duration::from_millis(2000));
        assert_eq!(config.lines.len(), 2);
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = KnockerConfig::from_toml_str("").unwrap();
        assert_eq!(config, KnockerConfig::default());
    }

    #[test]
    fn test_full_document() {
        let config = KnockerConfig::from_toml_str(
            r#"
            expected_code = "31"
            digit_timeout_ms = 500
            abandon_after_timeouts = 2
            debounce_ms = 30
            max_code_length = 6
            channel_capacity = 4
            termination = "timeouts-only"
            match_policy = "every-timeout"

            [unlock]
            pin = 21
            hold_ms = 1500

            [[lines]]
            name = "knock"
            pin = 5
            edge = "falling"
            pull = "down"
            "#,
        )
        .unwrap();

        assert_eq!(config.expected_code.slots(), &[3, 1]);
        assert_eq!(config.termination, TerminationPolicy::TimeoutsOnly);
        assert_eq!(config.match_policy, MatchPolicy::EveryTimeout);
        assert_eq!(config.unlock.pin, 21);
        assert_eq!(config.unlock.hold_ms, 1500);

        let line = config.line("knock").unwrap();
        assert_eq!(line.edge, EdgePolarity::Falling);
        assert_eq!(line.pull, Pull::Down);
        assert_eq!(line.mode, LineMode::Knock);
        assert_eq!(line.line_id(), LineId::new(5));
    }

    #[test]
    fn test_unlock_section_partial_defaults() {
        let config = KnockerConfig::from_toml_str("[unlock]\npin = 22\n").unwrap();
        assert_eq!(config.unlock.pin, 22);
        assert_eq!(config.unlock.hold_ms, DEFAULT_UNLOCK_HOLD_MS);
    }

    #[test]
    fn test_malformed_toml() {
        let result = KnockerConfig::from_toml_str("expected_code = ");
        assert!(matches!(result, Err(Error::ConfigParse(_))));
    }

    #[test]
    fn test_invalid_code_rejected_at_parse() {
        let result = KnockerConfig::from_toml_str("expected_code = \"2030\"");
        assert!(result.is_err());
    }

    #[rstest]
    #[case("digit_timeout_ms = 0")]
    #[case("abandon_after_timeouts = 0")]
    #[case("channel_capacity = 0")]
    #[case("max_code_length = 0")]
    #[case("max_code_length = 33")]
    #[case("debounce_ms = 900")]
    #[case("max_code_length = 3")] // default code has 4 slots
    #[case("lines = []")]
    fn test_invalid_values(#[case] source: &str) {
        assert!(KnockerConfig::from_toml_str(source).is_err());
    }

    #[test]
    fn test_duplicate_pins_rejected() {
        let mut config = KnockerConfig::default();
        config.lines[1].pin = config.lines[0].pin;
        assert!(matches!(config.validate(), Err(Error::InvalidLine(_))));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut config = KnockerConfig::default();
        config.lines[1].name = config.lines[0].name.clone();
        assert!(matches!(config.validate(), Err(Error::InvalidLine(_))));
    }

    #[test]
    fn test_input_on_unlock_pin_rejected() {
        let mut config = KnockerConfig::default();
        config.lines[0].pin = config.unlock.pin;
        assert!(matches!(config.validate(), Err(Error::InvalidLine(_))));
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "expected_code = \"121\"").unwrap();

        let config = KnockerConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.expected_code.to_string(), "121");
    }

    #[test]
    fn test_load_missing_file() {
        let result = KnockerConfig::load_from_path("/nonexistent/knocker.toml");
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
