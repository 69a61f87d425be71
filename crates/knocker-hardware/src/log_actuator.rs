//! Actuator that only logs.
//!
//! Used when the controller runs on a host without the lock wired up: every
//! level change is written to the log instead of a GPIO.

use crate::{Result, traits::UnlockActuator, types::DeviceInfo};
use tracing::info;

/// Unlock output that records level changes in the log.
#[derive(Debug, Clone)]
pub struct LogActuator {
    pin: u8,
    active: bool,
}

impl LogActuator {
    pub fn new(pin: u8) -> Self {
        Self { pin, active: false }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl UnlockActuator for LogActuator {
    async fn set_active(&mut self, active: bool) -> Result<()> {
        if active != self.active {
            info!(pin = self.pin, level = u8::from(active), "unlock output");
        }
        self.active = active;
        Ok(())
    }

    async fn get_info(&self) -> Result<DeviceInfo> {
        Ok(DeviceInfo::new("Log actuator", "log-only").with_pin(self.pin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_actuator_tracks_level() {
        let mut actuator = LogActuator::new(18);
        assert!(!actuator.is_active());

        actuator.set_active(true).await.unwrap();
        assert!(actuator.is_active());

        actuator.set_active(false).await.unwrap();
        assert!(!actuator.is_active());
    }

    #[tokio::test]
    async fn test_log_actuator_info() {
        let actuator = LogActuator::new(18);
        let info = actuator.get_info().await.unwrap();
        assert_eq!(info.pin, Some(18));
    }
}
