//! Interactive simulator: stdin tokens become edges.

use anyhow::Context;
use knocker_core::{KnockerConfig, LineId};
use knocker_engine::{EdgeDispatcher, LineEvent, LineManager};
use knocker_hardware::{EdgeSink, InputLine, LogActuator, UnlockActuator};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

pub async fn run(config: KnockerConfig) -> anyhow::Result<()> {
    for line in config.lines.iter().map(InputLine::from) {
        info!(
            line = %line.id,
            name = %line.name,
            edge = ?line.edge,
            pull = ?line.pull,
            idle_high = line.idle_high(),
            "Input line"
        );
    }

    let actuator = LogActuator::new(config.unlock.pin);
    let device = actuator.get_info().await.context("actuator unavailable")?;
    info!(name = %device.name, pin = ?device.pin, "Unlock output");

    let manager = LineManager::from_config(&config).context("failed to register lines")?;
    let mut handle = manager.start(actuator).context("failed to start lines")?;
    let dispatcher = handle.dispatcher();

    info!(
        code = %config.expected_code,
        lines = config.lines.len(),
        "Knocker running; type a line name or pin and press enter to knock"
    );

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = input.next_line() => match line.context("failed to read stdin")? {
                Some(line) => simulate(&config, &dispatcher, &line),
                None => {
                    info!("Input closed");
                    break;
                }
            },
            Some(event) = handle.recv() => log_event(&event),
            _ = heartbeat.tick() => info!("Heartbeat"),
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    for stats in handle.stats() {
        info!(
            line = %stats.line,
            name = %stats.name,
            forwarded = stats.forwarded,
            debounced = stats.debounced,
            dropped = stats.dropped,
            sessions = stats.sessions,
            matches = stats.matches,
            unlocks = stats.unlocks,
            "Line stats"
        );
    }
    let summary = handle.shutdown().await;
    info!(?summary, "Knocker stopped");
    Ok(())
}

/// Fire one edge per whitespace-separated token.
fn simulate(config: &KnockerConfig, dispatcher: &EdgeDispatcher, input: &str) {
    for token in input.split_whitespace() {
        match resolve_line(config, token) {
            Some(line) => dispatcher.on_edge(line),
            None => warn!(token, "No such line"),
        }
    }
}

/// A token names a line or gives its pin number.
fn resolve_line(config: &KnockerConfig, token: &str) -> Option<LineId> {
    if let Some(line) = config.line(token) {
        return Some(line.line_id());
    }
    let pin: u8 = token.parse().ok()?;
    config
        .lines
        .iter()
        .find(|line| line.pin == pin)
        .map(|line| line.line_id())
}

fn log_event(event: &LineEvent) {
    match serde_json::to_string(event) {
        Ok(json) => debug!(event = %json, "Line event"),
        Err(err) => warn!(%err, "Failed to encode line event"),
    }
}
