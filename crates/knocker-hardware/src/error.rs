//! Error types for hardware operations.
//!
//! These cover the collaborator side of the controller: the unlock output and
//! the edge inputs. Recognition itself never fails; only the devices do.

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur while driving or reading a device.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// The device went away (mock handle dropped, GPIO chip closed).
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// The actuator refused or failed to change its output.
    #[error("Actuator fault: {message}")]
    ActuatorFault { message: String },
}

impl HardwareError {
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    pub fn actuator_fault(message: impl Into<String>) -> Self {
        Self::ActuatorFault {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnected_error() {
        let error = HardwareError::disconnected("lock solenoid");
        assert!(matches!(error, HardwareError::Disconnected { .. }));
        assert_eq!(error.to_string(), "Device disconnected: lock solenoid");
    }

    #[test]
    fn test_actuator_fault() {
        let error = HardwareError::actuator_fault("output stuck low");
        assert!(matches!(error, HardwareError::ActuatorFault { .. }));
        assert_eq!(error.to_string(), "Actuator fault: output stuck low");
    }
}
