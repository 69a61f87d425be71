//! Timed unlock on top of the raw actuator.

use crate::error::Result;
use knocker_core::LineId;
use knocker_hardware::{AnyActuator, UnlockActuator};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

/// Releases the door for a fixed hold time.
///
/// The actuator sits behind an async mutex that stays locked for the whole
/// hold, so several lines sharing one door strike can never overlap their
/// activations. Cloning the driver shares the actuator.
#[derive(Debug, Clone)]
pub struct UnlockDriver {
    actuator: Arc<Mutex<AnyActuator>>,
    hold: Duration,
}

impl UnlockDriver {
    pub fn new(actuator: impl Into<AnyActuator>, hold: Duration) -> Self {
        Self {
            actuator: Arc::new(Mutex::new(actuator.into())),
            hold,
        }
    }

    pub fn hold(&self) -> Duration {
        self.hold
    }

    /// Activate the output, wait the hold time, deactivate.
    ///
    /// Returns once the door is locked again. If another line is unlocking,
    /// this waits for it first.
    ///
    /// # Errors
    /// Returns `EngineError::Hardware` if the output cannot be switched. A
    /// failed activation skips the hold; a failed release is reported after it.
    pub async fn trigger_unlock(&self, line: LineId) -> Result<()> {
        let mut actuator = self.actuator.lock().await;

        info!(%line, hold_ms = self.hold.as_millis() as u64, "Unlocking");
        actuator.set_active(true).await?;

        tokio::time::sleep(self.hold).await;

        if let Err(e) = actuator.set_active(false).await {
            warn!(%line, error = %e, "Failed to release unlock output");
            return Err(e.into());
        }
        info!(%line, "Done unlock");
        Ok(())
    }

    /// Wait until no unlock is in progress and keep the output to ourselves.
    ///
    /// While the returned guard lives, no line can start an unlock. A hold
    /// that is running when this is called completes first.
    pub(crate) async fn quiesce(&self) -> OwnedMutexGuard<AnyActuator> {
        Arc::clone(&self.actuator).lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use knocker_hardware::HardwareError;
    use knocker_hardware::mock::MockActuator;
    use tokio::time::Instant;

    const HOLD: Duration = Duration::from_millis(2000);

    #[tokio::test(start_paused = true)]
    async fn test_unlock_holds_for_configured_time() {
        let (actuator, handle) = MockActuator::new();
        let driver = UnlockDriver::new(actuator, HOLD);

        let started = Instant::now();
        driver.trigger_unlock(LineId::new(5)).await.unwrap();

        assert_eq!(started.elapsed(), HOLD);
        assert!(!handle.is_active());
        let activations = handle.activations();
        assert_eq!(activations.len(), 1);
        assert_eq!(activations[0].duration(), Some(HOLD));
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiesce_waits_for_running_hold() {
        let (actuator, handle) = MockActuator::new();
        let driver = UnlockDriver::new(actuator, HOLD);

        let unlock = tokio::spawn({
            let driver = driver.clone();
            async move { driver.trigger_unlock(LineId::new(0)).await }
        });
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(handle.is_active());

        let started = Instant::now();
        let _guard = driver.quiesce().await;
        assert_eq!(started.elapsed(), HOLD - Duration::from_millis(500));
        assert!(!handle.is_active());
        unlock.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_unlocks_are_serialized() {
        let (actuator, handle) = MockActuator::new();
        let driver = UnlockDriver::new(actuator, HOLD);

        let first = tokio::spawn({
            let driver = driver.clone();
            async move { driver.trigger_unlock(LineId::new(5)).await }
        });
        let second = tokio::spawn({
            let driver = driver.clone();
            async move { driver.trigger_unlock(LineId::new(0)).await }
        });
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        assert_eq!(handle.activation_count(), 2);
        assert_eq!(handle.overlapping_activations(), 0);
        let activations = handle.activations();
        assert!(activations[1].activated_at >= activations[0].released_at.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_activation_skips_hold() {
        let (actuator, handle) = MockActuator::new();
        handle.fail_next_activations(1);
        let driver = UnlockDriver::new(actuator, HOLD);

        let started = Instant::now();
        let result = driver.trigger_unlock(LineId::new(5)).await;

        assert!(matches!(
            result,
            Err(EngineError::Hardware(HardwareError::ActuatorFault { .. }))
        ));
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(handle.activation_count(), 0);

        // The next attempt works again.
        driver.trigger_unlock(LineId::new(5)).await.unwrap();
        assert_eq!(handle.activation_count(), 1);
    }
}
