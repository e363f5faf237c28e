use std::path::PathBuf;

use anyhow::{bail, Result};

use crate::config;
use crate::history::read_history;

const DEFAULT_HISTORY_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Poll forever.
    Run { config: PathBuf },
    /// A single cycle, then exit.
    Once { config: PathBuf },
    History {
        config: PathBuf,
        limit: usize,
        legacy_id: Option<i64>,
    },
    Help,
}

/// Parse arguments (without the program name).
///
/// Supported forms:
///   trackit-jira [config.toml]
///   trackit-jira once [config.toml]
///   trackit-jira history [--limit N] [--id WO] [config.toml]
pub fn parse_args(args: &[String]) -> Result<Command> {
    let mut rest = args.iter().map(String::as_str).peekable();

    let sub = match rest.peek().copied() {
        Some("-h" | "--help" | "help") => return Ok(Command::Help),
        Some(s @ ("once" | "history" | "run")) => {
            rest.next();
            s
        }
        _ => "run",
    };

    let mut config_path: Option<PathBuf> = None;
    let mut limit = DEFAULT_HISTORY_LIMIT;
    let mut legacy_id = None;

    while let Some(arg) = rest.next() {
        match arg {
            "-h" | "--help" => return Ok(Command::Help),
            "-n" | "--limit" if sub == "history" => {
                let Some(value) = rest.next() else {
                    bail!("Missing value for --limit");
                };
                limit = value
                    .parse()
                    .map_err(|_| anyhow::anyhow!("Invalid --limit value: {value}"))?;
            }
            "--id" if sub == "history" => {
                let Some(value) = rest.next() else {
                    bail!("Missing value for --id");
                };
                legacy_id = Some(
                    value
                        .parse()
                        .map_err(|_| anyhow::anyhow!("Invalid work order number: {value}"))?,
                );
            }
            flag if flag.starts_with('-') => bail!("Unknown option: {flag}"),
            path => {
                if config_path.is_some() {
                    bail!("Unexpected argument: {path}");
                }
                config_path = Some(PathBuf::from(path));
            }
        }
    }

    let config = config_path.unwrap_or_else(config::default_config_path);
    Ok(match sub {
        "once" => Command::Once { config },
        "history" => Command::History {
            config,
            limit,
            legacy_id,
        },
        _ => Command::Run { config },
    })
}

/// Print the tail of the migration history file.
pub fn handle_history(config_path: &std::path::Path, limit: usize, legacy_id: Option<i64>) -> Result<()> {
    let config = config::load_config(config_path)?;
    let Some(path) = config.history_file else {
        bail!("No history_file configured in {}", config_path.display());
    };
    let events = read_history(&path, legacy_id, limit)?;
    if events.is_empty() {
        println!("No migration history yet.");
        return Ok(());
    }
    for e in events {
        let key = e.issue_key.as_ref().map_or("-", |k| k.as_str());
        let stamp = e.timestamp.format("%Y-%m-%d %H:%M:%S");
        match e.message {
            Some(msg) => println!("{stamp}  {:>8}  {:<18} {key}  {msg}", e.legacy_id, e.event),
            None => println!("{stamp}  {:>8}  {:<18} {key}", e.legacy_id, e.event),
        }
    }
    Ok(())
}

pub fn print_help() {
    println!("trackit-jira: move open Track-It! work orders into Jira\n");
    println!("USAGE:");
    println!("  trackit-jira [config]           Poll forever");
    println!("  trackit-jira once [config]      Run a single migration cycle");
    println!("  trackit-jira history [config]   Show recent migration events");
    println!();
    println!("HISTORY OPTIONS:");
    println!("  -n, --limit <N>  Number of events to show (default {DEFAULT_HISTORY_LIMIT})");
    println!("  --id <WO>        Only events for one work order");
    println!();
    println!("The config defaults to ~/.trackit-jira/config.toml");
}
