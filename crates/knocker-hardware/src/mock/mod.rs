//! Mock device implementations for testing and development.
//!
//! This module provides simulated devices that can be controlled
//! programmatically without requiring physical hardware.

pub mod actuator;
pub mod pulse;

// Re-export commonly used types
pub use actuator::{Activation, MockActuator, MockActuatorHandle};
pub use pulse::MockPulseSource;
