//! `knocker` - knock-code access controller.
//!
//! - `run`: start every configured line against a log-only actuator and feed
//!   edges from stdin (one token per edge, naming a line or its pin).
//! - `replay`: evaluate a recorded edge timeline offline.
//! - `check-config`: load and validate a configuration file.

mod replay;
mod run;

use anyhow::Context;
use clap::{Parser, Subcommand};
use knocker_core::KnockerConfig;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Knock-code access controller
#[derive(Parser, Debug)]
#[command(name = "knocker", version, about)]
struct Cli {
    /// Path to TOML configuration file (built-in defaults when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the recognizers, reading simulated edges from stdin
    Run,

    /// Replay recorded edge ticks through one line
    Replay(replay::ReplayArgs),

    /// Validate the configuration and print a summary
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG overrides; default INFO
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Run => run::run(config).await,
        Command::Replay(args) => replay::replay(&config, &args),
        Command::CheckConfig => {
            check_config(&config);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<KnockerConfig> {
    match path {
        Some(path) => KnockerConfig::load_from_path(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => {
            let config = KnockerConfig::default();
            config.validate().context("built-in defaults are invalid")?;
            Ok(config)
        }
    }
}

fn check_config(config: &KnockerConfig) {
    println!("Configuration OK");
    let pause = if config.expected_code.requires_pause() {
        " (ends with a pause)"
    } else {
        ""
    };
    println!("  expected code:   {}{pause}", config.expected_code);
    println!("  digit timeout:   {} ms", config.digit_timeout_ms);
    println!("  abandon after:   {} timeouts", config.abandon_after_timeouts);
    println!("  debounce:        {} ms", config.debounce_ms);
    println!("  max code length: {}", config.max_code_length);
    println!("  channel size:    {}", config.channel_capacity);
    println!("  termination:     {:?}", config.termination);
    println!("  match policy:    {:?}", config.match_policy);
    println!(
        "  unlock:          pin {} for {} ms",
        config.unlock.pin, config.unlock.hold_ms
    );
    for line in &config.lines {
        println!(
            "  line {:<12} pin {:<3} {:?} edge, pull {:?}, {:?}",
            line.name, line.pin, line.edge, line.pull, line.mode
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_replay_with_ticks() {
        let cli = Cli::try_parse_from([
            "knocker", "--config", "knocker.toml", "replay", "--line", "button", "0", "200",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("knocker.toml")));
        match cli.command {
            Command::Replay(args) => {
                assert_eq!(args.line.as_deref(), Some("button"));
                assert_eq!(args.ticks, vec![0, 200]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_load_config_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config.expected_code.to_string(), "2230");
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config(Some(Path::new("/nonexistent/knocker.toml"))).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/knocker.toml"));
    }
}
