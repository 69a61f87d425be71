//! Enum wrappers for hardware device dispatch.
//!
//! Native `async fn` in traits (RPITIT - Rust Edition 2024) are not object-safe,
//! so `Box<dyn UnlockActuator>` is not available. The enum below provides
//! concrete type dispatch instead, which also keeps the futures `Send` so the
//! recognizer tasks can be spawned on the Tokio runtime.
//!
//! # Examples
//!
//! ```
//! use knocker_hardware::devices::AnyActuator;
//! use knocker_hardware::mock::MockActuator;
//!
//! let (actuator, _handle) = MockActuator::new();
//! let any_actuator = AnyActuator::Mock(actuator);
//! ```

use crate::log_actuator::LogActuator;
use crate::mock::MockActuator;
use crate::traits::UnlockActuator;
use crate::{DeviceInfo, Result};

/// Enum wrapper for unlock actuator dispatch.
///
/// # Examples
///
/// ```
/// use knocker_hardware::devices::AnyActuator;
/// use knocker_hardware::traits::UnlockActuator;
/// use knocker_hardware::LogActuator;
///
/// #[tokio::main]
/// async fn main() -> knocker_hardware::Result<()> {
///     let actuator = AnyActuator::Log(LogActuator::new(18));
///
///     let info = actuator.get_info().await?;
///     assert_eq!(info.pin, Some(18));
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyActuator {
    /// Mock actuator for development and testing.
    Mock(MockActuator),

    /// Log-only actuator for hosts without a lock attached.
    Log(LogActuator),
}

impl UnlockActuator for AnyActuator {
    async fn set_active(&mut self, active: bool) -> Result<()> {
        match self {
            Self::Mock(device) => device.set_active(active).await,
            Self::Log(device) => device.set_active(active).await,
        }
    }

    async fn get_info(&self) -> Result<DeviceInfo> {
        match self {
            Self::Mock(device) => device.get_info().await,
            Self::Log(device) => device.get_info().await,
        }
    }
}

impl From<MockActuator> for AnyActuator {
    fn from(device: MockActuator) -> Self {
        Self::Mock(device)
    }
}

impl From<LogActuator> for AnyActuator {
    fn from(device: LogActuator) -> Self {
        Self::Log(device)
    }
}
