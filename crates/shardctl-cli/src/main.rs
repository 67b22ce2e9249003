//! shardctl CLI
//!
//! Replays a script of shard controller commands through the configuration
//! state machine and prints the resulting configurations.
//!
//! ## Usage
//!
//! ```bash
//! # Replay a script and print the latest configuration
//! shardctl replay commands.yml
//!
//! # Print configuration #3 as JSON
//! shardctl replay commands.yml --at 3 --format json
//!
//! # Print the whole history
//! shardctl replay commands.yml --history
//!
//! # Check determinism and balance for a script
//! shardctl --config /etc/shardctl.toml check commands.yml
//! ```
//!
//! A script is a YAML list of tagged commands:
//!
//! ```yaml
//! - op: join
//!   servers:
//!     100: [s1, s2]
//! - op: move
//!   shard: 3
//!   gid: 100
//! - op: query
//!   num: -1
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use shardctl::{Config, ConfigModel, ControllerSettings, Op, Reply, Status};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shardctl")]
#[command(author, version, about = "Replay and check shard controller command scripts")]
struct Cli {
    /// Path to controller settings (default: ./shardctl.toml)
    #[arg(short, long, global = true, default_value = "shardctl.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a command script and print configurations
    Replay {
        /// Path to the YAML command script
        script: PathBuf,

        /// Configuration number to print (negative or out of range prints the latest)
        #[arg(long, default_value = "-1", allow_hyphen_values = true)]
        at: i64,

        /// Print every configuration instead of a single one
        #[arg(long)]
        history: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "yaml")]
        format: OutputFormat,
    },
    /// Replay a script twice and verify determinism and balance
    Check {
        /// Path to the YAML command script
        script: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

fn load_settings(path: &Path) -> Result<ControllerSettings> {
    if !path.exists() {
        return Ok(ControllerSettings::default());
    }
    let settings = ControllerSettings::from_file(path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    info!("Using settings from {}", path.display());
    Ok(settings)
}

/// Read a script as one JSON payload per command
fn load_script(path: &Path) -> Result<Vec<Vec<u8>>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read script {}", path.display()))?;
    let entries: Vec<serde_yaml::Value> = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse script {}", path.display()))?;

    entries
        .iter()
        .map(|entry| serde_json::to_vec(entry).context("Failed to encode command"))
        .collect()
}

/// Apply every payload, returning the replies alongside the decoded kinds
fn replay(model: &mut ConfigModel, payloads: &[Vec<u8>]) -> Vec<(Option<&'static str>, Reply)> {
    payloads
        .iter()
        .map(|payload| {
            let kind = Op::decode(payload).ok().map(|op| op.kind());
            let reply = model.apply_encoded(payload);
            (kind, reply)
        })
        .collect()
}

fn print<T: Serialize>(value: &T, format: OutputFormat) -> Result<()> {
    let out = match format {
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
    };
    println!("{}", out);
    Ok(())
}

fn run_replay(
    settings: ControllerSettings,
    script: &Path,
    at: i64,
    history: bool,
    format: OutputFormat,
) -> Result<()> {
    let payloads = load_script(script)?;
    let mut model = ConfigModel::with_settings(settings);

    for (index, (kind, reply)) in replay(&mut model, &payloads).into_iter().enumerate() {
        match reply.status {
            Status::Ok => info!(index, op = kind.unwrap_or("?"), "Applied"),
            status => warn!(index, op = kind.unwrap_or("?"), ?status, "Rejected"),
        }
    }

    if history {
        print(&model.history().snapshot(), format)
    } else {
        print(&model.query(at), format)
    }
}

fn check_config(config: &Config) -> Result<()> {
    if !config.is_balanced() {
        bail!(
            "config #{} violates balance: shards {:?}, counts {:?}",
            config.num,
            config.shards,
            config.shard_counts()
        );
    }
    Ok(())
}

fn run_check(settings: ControllerSettings, script: &Path) -> Result<()> {
    let payloads = load_script(script)?;
    let mut first = ConfigModel::with_settings(settings.clone());
    let mut second = ConfigModel::with_settings(settings);

    let replies = replay(&mut first, &payloads);
    replay(&mut second, &payloads);

    let history = first.history().snapshot();
    if history != second.history().snapshot() {
        bail!("replays of {} produced different histories", script.display());
    }

    let mut num = 0;
    for (kind, reply) in &replies {
        if !reply.is_ok() || *kind == Some("query") {
            continue;
        }
        num += 1;
        if matches!(kind, Some("join") | Some("leave")) {
            check_config(&history[num])?;
        }
    }

    info!(
        commands = payloads.len(),
        configs = history.len(),
        "Script is deterministic and balanced"
    );
    Ok(())
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = load_settings(&cli.config)?;

    match cli.command {
        Commands::Replay {
            script,
            at,
            history,
            format,
        } => run_replay(settings, &script, at, history, format),
        Commands::Check { script } => run_check(settings, &script),
    }
}
