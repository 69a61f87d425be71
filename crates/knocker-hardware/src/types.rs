//! Common types shared across device implementations.

use knocker_core::{EdgePolarity, LineConfig, LineId, Pull};
use serde::{Deserialize, Serialize};

/// Generic device information.
///
/// Contains metadata about a hardware device such as name, model and the pin
/// it is wired to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device name (e.g., "Door strike", "MockActuator").
    pub name: String,

    /// Device model identifier.
    pub model: String,

    /// GPIO the device is wired to, if any.
    pub pin: Option<u8>,
}

impl DeviceInfo {
    /// Create a new DeviceInfo with required fields.
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            pin: None,
        }
    }

    /// Set the GPIO number.
    pub fn with_pin(mut self, pin: u8) -> Self {
        self.pin = Some(pin);
        self
    }
}

/// Electrical description of an edge-triggered input line.
///
/// This is what the platform layer needs to configure the pin and register its
/// interrupt; the recognition logic only ever sees the [`LineId`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputLine {
    /// Line identifier bound to this pin's edge handler.
    pub id: LineId,

    /// Name used in logs.
    pub name: String,

    /// Edge that produces a notification.
    pub edge: EdgePolarity,

    /// Pull resistor state.
    pub pull: Pull,
}

impl InputLine {
    pub fn new(id: LineId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            edge: EdgePolarity::default(),
            pull: Pull::default(),
        }
    }

    /// Level the line idles at between pulses.
    ///
    /// A pulled-up line idles high and is expected to fire on a falling edge.
    #[must_use]
    pub fn idle_high(&self) -> bool {
        matches!(self.pull, Pull::Up)
    }
}

impl From<&LineConfig> for InputLine {
    fn from(config: &LineConfig) -> Self {
        Self {
            id: config.line_id(),
            name: config.name.clone(),
            edge: config.edge,
            pull: config.pull,
        }
    }
}

/// Output state of the unlock actuator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActuatorState {
    /// Output inactive, door locked.
    #[default]
    Locked,

    /// Output driven, door released.
    Unlocked,
}

impl ActuatorState {
    #[must_use]
    pub fn from_active(active: bool) -> Self {
        if active { Self::Unlocked } else { Self::Locked }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Unlocked)
    }
}
