//! Offline replay of recorded edge ticks.

use anyhow::{Context, bail};
use clap::Args;
use knocker_core::KnockerConfig;
use knocker_engine::{ReplayConfig, ReplayOutcome, replay_timeline};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Line whose mode to replay with (first configured line when omitted)
    #[arg(short, long)]
    pub line: Option<String>,

    /// File of edge ticks in milliseconds, separated by whitespace or commas;
    /// `#` starts a comment
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Print the outcome as JSON
    #[arg(long)]
    pub json: bool,

    /// Edge ticks in milliseconds
    pub ticks: Vec<u64>,
}

pub fn replay(config: &KnockerConfig, args: &ReplayArgs) -> anyhow::Result<()> {
    let line = match &args.line {
        Some(name) => config
            .line(name)
            .with_context(|| format!("no line named '{name}'"))?,
        None => config.lines.first().context("no lines configured")?,
    };

    let mut ticks = args.ticks.clone();
    if let Some(path) = &args.file {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        ticks.extend(parse_ticks(&source)?);
    }
    if ticks.is_empty() {
        bail!("no edge ticks given");
    }

    let replay_config = ReplayConfig::from(config).with_mode(line.mode);
    let outcome = replay_timeline(&ticks, &replay_config)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&line.name, &outcome);
    }
    Ok(())
}

fn parse_ticks(source: &str) -> anyhow::Result<Vec<u64>> {
    source
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default())
        .flat_map(|line| line.split(|c: char| c.is_whitespace() || c == ','))
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .parse::<u64>()
                .with_context(|| format!("invalid edge tick '{token}'"))
        })
        .collect()
}

fn print_outcome(line: &str, outcome: &ReplayOutcome) {
    println!(
        "{line}: {} pulses ({} debounced, {} dropped, {} discarded)",
        outcome.pulses, outcome.debounced, outcome.dropped, outcome.discarded
    );
    for (i, session) in outcome.sessions.iter().enumerate() {
        println!(
            "  session {}: code {:<12} {:<8} {} after {} timeouts",
            i + 1,
            session.code(),
            session.verdict,
            session.end,
            session.timeouts
        );
    }
    for tick in &outcome.unlocks {
        println!("  unlock at {tick} ms");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ticks_mixed_separators() {
        let source = "0, 200\n1200 1400 # second digit\n\n# third\n2400,2600,2800\n";
        assert_eq!(
            parse_ticks(source).unwrap(),
            vec![0, 200, 1200, 1400, 2400, 2600, 2800]
        );
    }

    #[test]
    fn test_parse_ticks_rejects_garbage() {
        let err = parse_ticks("0 200 knock").unwrap_err();
        assert!(err.to_string().contains("knock"));
    }

    #[test]
    fn test_replay_unknown_line() {
        let args = ReplayArgs {
            line: Some("door".to_string()),
            file: None,
            json: false,
            ticks: vec![0],
        };
        let err = replay(&KnockerConfig::default(), &args).unwrap_err();
        assert!(err.to_string().contains("door"));
    }

    #[test]
    fn test_replay_requires_ticks() {
        let args = ReplayArgs {
            line: None,
            file: None,
            json: true,
            ticks: Vec::new(),
        };
        assert!(replay(&KnockerConfig::default(), &args).is_err());
    }
}
