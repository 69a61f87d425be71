//! Collaborator trait definitions.
//!
//! The recognition engine talks to the outside world through two seams:
//!
//! - [`EdgeSink`]: called from the edge (interrupt) context for every raw
//!   transition on an input line. Must never block or allocate.
//! - [`UnlockActuator`]: the single on/off output that releases the door.
//!
//! `UnlockActuator` uses native `async fn` methods (Rust 1.90 + Edition 2024
//! RPITIT), so it is not object-safe; use the enum wrapper in
//! [`devices`](crate::devices) for dynamic dispatch.

#![allow(async_fn_in_trait)]

use crate::error::Result;
use crate::types::DeviceInfo;
use knocker_core::LineId;

/// Receiver of raw edge notifications.
///
/// Implementors run inside the edge callback of the platform layer, so
/// `on_edge` has to return quickly: no awaiting, no locking that can contend
/// with a task, no allocation, no logging.
///
/// # Examples
///
/// ```
/// use knocker_core::LineId;
/// use knocker_hardware::traits::EdgeSink;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// struct Counter(AtomicUsize);
///
/// impl EdgeSink for Counter {
///     fn on_edge(&self, _line: LineId) {
///         self.0.fetch_add(1, Ordering::Relaxed);
///     }
/// }
///
/// let counter = Counter(AtomicUsize::new(0));
/// counter.on_edge(LineId::new(5));
/// assert_eq!(counter.0.load(Ordering::Relaxed), 1);
/// ```
pub trait EdgeSink: Send + Sync {
    /// Handle one raw edge on `line`.
    fn on_edge(&self, line: LineId);
}

/// Unlock output abstraction.
///
/// Represents the single digital output that drives the door strike. Timing
/// (how long the door stays released) is owned by the caller; the device only
/// switches the level.
///
/// # Examples
///
/// ```no_run
/// use knocker_hardware::traits::UnlockActuator;
/// use knocker_hardware::error::Result;
/// use std::time::Duration;
///
/// async fn pulse<A: UnlockActuator>(actuator: &mut A) -> Result<()> {
///     actuator.set_active(true).await?;
///     tokio::time::sleep(Duration::from_secs(2)).await;
///     actuator.set_active(false).await
/// }
/// ```
pub trait UnlockActuator: Send + Sync {
    /// Drive the output active (`true`) or inactive (`false`).
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The device is disconnected
    /// - The output could not be switched
    async fn set_active(&mut self, active: bool) -> Result<()>;

    /// Get device information.
    ///
    /// # Errors
    ///
    /// Returns an error if the device cannot be queried.
    async fn get_info(&self) -> Result<DeviceInfo>;
}
