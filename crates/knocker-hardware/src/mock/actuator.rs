//! Mock unlock actuator for testing and development.
//!
//! The mock keeps the output level in a `watch` channel and records every
//! activation, so tests can await the door being released and then inspect
//! how long it stayed open.

use crate::{
    HardwareError, Result,
    traits::UnlockActuator,
    types::{ActuatorState, DeviceInfo},
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// One recorded activation of the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Activation {
    /// When the output went active.
    pub activated_at: Instant,

    /// When the output went inactive again, if it has.
    pub released_at: Option<Instant>,
}

impl Activation {
    /// How long the output stayed active, if it has been released.
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        self.released_at
            .map(|released| released.duration_since(self.activated_at))
    }
}

#[derive(Debug, Default)]
struct Recorder {
    activations: Mutex<Vec<Activation>>,
    overlapping: AtomicU32,
    failures_pending: AtomicU32,
}

impl Recorder {
    fn activations(&self) -> MutexGuard<'_, Vec<Activation>> {
        self.activations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Mock unlock actuator.
///
/// # Examples
///
/// ```
/// use knocker_hardware::mock::MockActuator;
/// use knocker_hardware::traits::UnlockActuator;
///
/// #[tokio::main]
/// async fn main() -> knocker_hardware::Result<()> {
///     let (mut actuator, handle) = MockActuator::new();
///
///     actuator.set_active(true).await?;
///     assert!(handle.is_active());
///     actuator.set_active(false).await?;
///
///     assert_eq!(handle.activation_count(), 1);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockActuator {
    name: String,
    state_tx: watch::Sender<ActuatorState>,
    recorder: Arc<Recorder>,
}

impl MockActuator {
    /// Create a new mock actuator with the default name.
    ///
    /// Returns a tuple of (MockActuator, MockActuatorHandle) where the handle
    /// observes the output and can inject faults.
    pub fn new() -> (Self, MockActuatorHandle) {
        Self::with_name("Mock Actuator".to_string())
    }

    /// Create a new mock actuator with a custom name.
    pub fn with_name(name: String) -> (Self, MockActuatorHandle) {
        let (state_tx, state_rx) = watch::channel(ActuatorState::Locked);
        let recorder = Arc::new(Recorder::default());

        let actuator = Self {
            name: name.clone(),
            state_tx,
            recorder: Arc::clone(&recorder),
        };

        let handle = MockActuatorHandle {
            name,
            state_rx,
            recorder,
        };

        (actuator, handle)
    }
}

impl Default for MockActuator {
    fn default() -> Self {
        Self::new().0
    }
}

impl UnlockActuator for MockActuator {
    async fn set_active(&mut self, active: bool) -> Result<()> {
        if active {
            let injected = self
                .recorder
                .failures_pending
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
                .is_ok();
            if injected {
                return Err(HardwareError::actuator_fault("injected failure"));
            }
        }

        let now = Instant::now();
        let previous = *self.state_tx.borrow();
        {
            let mut activations = self.recorder.activations();
            match (previous.is_active(), active) {
                (false, true) => activations.push(Activation {
                    activated_at: now,
                    released_at: None,
                }),
                (true, true) => {
                    self.recorder.overlapping.fetch_add(1, Ordering::Relaxed);
                }
                (true, false) => {
                    if let Some(last) = activations.last_mut() {
                        last.released_at = Some(now);
                    }
                }
                (false, false) => {}
            }
        }

        self.state_tx.send_replace(ActuatorState::from_active(active));
        Ok(())
    }

    async fn get_info(&self) -> Result<DeviceInfo> {
        Ok(DeviceInfo::new(self.name.clone(), "Mock Actuator v1.0"))
    }
}

/// Handle for observing a mock actuator.
///
/// Can be cloned and shared across tasks.
#[derive(Debug, Clone)]
pub struct MockActuatorHandle {
    name: String,
    state_rx: watch::Receiver<ActuatorState>,
    recorder: Arc<Recorder>,
}

impl MockActuatorHandle {
    /// Current output state.
    pub fn state(&self) -> ActuatorState {
        *self.state_rx.borrow()
    }

    /// Whether the output is currently active.
    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// Wait until the output reaches `state`.
    ///
    /// # Errors
    ///
    /// Returns an error if the actuator has been dropped.
    pub async fn wait_for(&self, state: ActuatorState) -> Result<()> {
        let mut rx = self.state_rx.clone();
        rx.wait_for(|current| *current == state)
            .await
            .map(|_| ())
            .map_err(|_| HardwareError::disconnected(self.name.clone()))
    }

    /// Every activation recorded so far.
    pub fn activations(&self) -> Vec<Activation> {
        self.recorder.activations().clone()
    }

    /// Number of times the output went from inactive to active.
    pub fn activation_count(&self) -> usize {
        self.recorder.activations().len()
    }

    /// Number of activation requests while the output was already active.
    pub fn overlapping_activations(&self) -> u32 {
        self.recorder.overlapping.load(Ordering::Relaxed)
    }

    /// Make the next `count` activation requests fail.
    pub fn fail_next_activations(&self, count: u32) {
        self.recorder
            .failures_pending
            .store(count, Ordering::Release);
    }

    /// Get the device name.
    pub fn name(&self) -> &str {
        &self.name
    }
}
