//! Hardware collaborator layer for the knock-code controller.
//!
//! The recognition engine needs exactly two things from the platform:
//!
//! - a way to receive raw edges from input lines, expressed as the
//!   [`EdgeSink`] trait the platform's interrupt handler calls into;
//! - an unlock output, expressed as the [`UnlockActuator`] trait.
//!
//! Pin configuration and interrupt registration stay on the platform side;
//! [`InputLine`] carries everything that layer needs to know about a line.
//!
//! # Design Philosophy
//!
//! - **Async-first**: actuator operations are `async fn` in traits
//!   (Rust 1.90 + Edition 2024 RPITIT).
//! - **Interrupt-safe edges**: `EdgeSink::on_edge` is synchronous and must not
//!   block or allocate.
//! - **Thread-safe**: all traits require `Send + Sync` for use with Tokio.
//! - **Error-aware**: fallible operations return [`Result<T>`][error::Result].
//!
//! # Mock Implementations
//!
//! [`mock::MockActuator`] records activations and can inject faults;
//! [`mock::MockPulseSource`] simulates clean pulses, bounce bursts and whole
//! knock codes. [`LogActuator`] is the stand-in used when running on a host.

pub mod devices;
pub mod error;
pub mod log_actuator;
pub mod mock;
pub mod traits;
pub mod types;

// Re-export commonly used types for convenience
pub use devices::AnyActuator;
pub use error::{HardwareError, Result};
pub use log_actuator::LogActuator;
pub use traits::{EdgeSink, UnlockActuator};
pub use types::{ActuatorState, DeviceInfo, InputLine};
