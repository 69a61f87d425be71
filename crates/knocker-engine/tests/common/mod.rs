//! Shared helpers for the engine integration tests.
//!
//! Everything here assumes a paused Tokio clock
//! (`#[tokio::test(start_paused = true)]`), so knocks and timeouts play out
//! instantly and deterministically.

#![allow(dead_code)]

use knocker_core::{KnockerConfig, LineConfig, LineId, LineMode};
use knocker_engine::{LineEvent, LineHandle, LineManager, SessionReport};
use knocker_hardware::mock::{MockActuator, MockActuatorHandle, MockPulseSource};
use std::time::Duration;

pub const MICROPHONE: LineId = LineId::new(5);
pub const BUTTON: LineId = LineId::new(0);

/// Gap between knocks of one digit.
pub const PULSE_GAP: Duration = Duration::from_millis(150);

/// Gap between digits: longer than one digit timeout, shorter than two.
pub const DIGIT_GAP: Duration = Duration::from_millis(1000);

pub const HOLD: Duration = Duration::from_millis(2000);

/// Running lines plus the mock collaborators around them.
pub struct Rig {
    pub handle: LineHandle,
    pub actuator: MockActuatorHandle,
}

impl Rig {
    /// Start every line from `config` against a mock actuator.
    pub fn start(config: &KnockerConfig) -> Self {
        config.validate().expect("test config must be valid");
        let manager = LineManager::from_config(config).expect("lines register");
        let (actuator, actuator_handle) = MockActuator::new();
        let handle = manager.start(actuator).expect("lines start");
        Self {
            handle,
            actuator: actuator_handle,
        }
    }

    /// Simulated input wired to the dispatcher for `line`.
    pub fn source(&self, line: LineId) -> MockPulseSource {
        MockPulseSource::new(line, self.handle.dispatcher())
    }

    /// Knock `digits` on `line` with the standard gaps.
    pub async fn knock(&self, line: LineId, digits: &[u8]) {
        self.source(line).knock(digits, PULSE_GAP, DIGIT_GAP).await;
    }

    /// Wait for the next event matching `pred`, skipping others.
    pub async fn wait_for(&mut self, mut pred: impl FnMut(&LineEvent) -> bool) -> LineEvent {
        loop {
            let event = self.handle.recv().await.expect("event channel closed");
            if pred(&event) {
                return event;
            }
        }
    }

    /// Wait for the next finished session on `line`.
    pub async fn next_report(&mut self, line: LineId) -> SessionReport {
        match self
            .wait_for(|e| matches!(e, LineEvent::SessionFinished { line: l, .. } if *l == line))
            .await
        {
            LineEvent::SessionFinished { report, .. } => report,
            _ => unreachable!(),
        }
    }

    /// Wait for the next completed unlock on any line.
    pub async fn next_unlock(&mut self) -> LineId {
        self.wait_for(|e| matches!(e, LineEvent::UnlockFinished { .. }))
            .await
            .line()
    }

    /// Collect every event that arrives within the next `duration`.
    pub async fn drain_for(&mut self, duration: Duration) -> Vec<LineEvent> {
        let mut events = Vec::new();
        let deadline = tokio::time::Instant::now() + duration;
        while let Ok(Some(event)) = tokio::time::timeout_at(deadline, self.handle.recv()).await {
            events.push(event);
        }
        events
    }
}

/// Default configuration with only the microphone line.
pub fn microphone_only() -> KnockerConfig {
    KnockerConfig {
        lines: vec![LineConfig::new("microphone", MICROPHONE.as_u8())],
        ..KnockerConfig::default()
    }
}

/// Default configuration with the button wired as a direct-unlock line.
pub fn with_direct_button() -> KnockerConfig {
    let mut config = KnockerConfig::default();
    for line in &mut config.lines {
        if line.line_id() == BUTTON {
            line.mode = LineMode::Direct;
        }
    }
    config
}
