//! A2UI Replay - Headless driver for the widget core
//!
//! Reads newline-delimited JSON commands (see [`commands`]) and applies them
//! to a [`WidgetSession`], writing one JSON report per command to stdout.
//! Logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Replay a recorded conversation with deterministic time
//! a2ui-replay --input session.ndjson --manual-clock
//!
//! # Pipe commands in, persisting surfaces between runs
//! cat turns.ndjson | a2ui-replay --storage-dir ./state --restore
//!
//! # Tighter budget for this run only
//! a2ui-replay --max-visible 1 --cooldown-ms 0 < turns.ndjson
//!
//! # Verbose logging
//! RUST_LOG=debug a2ui-replay < turns.ndjson
//! ```

mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tracing::{error, info, warn};

use a2ui_core::{load_config_from_path, ConfigOverrides, ManualClock, SharedClock, WidgetSession};

use commands::Replay;

/// A2UI Replay - drive the widget core from NDJSON commands
#[derive(Parser, Debug)]
#[command(name = "a2ui-replay")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "A2UI_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Read commands from a file instead of stdin
    #[arg(short = 'i', long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Persist surfaces in this directory
    #[arg(long, value_name = "DIR")]
    storage_dir: Option<PathBuf>,

    /// Load the persisted surface snapshot before replaying
    #[arg(long)]
    restore: bool,

    /// Start a manual clock at this instant (Unix ms); enables `advance`
    #[arg(long, value_name = "MS", num_args = 0..=1, default_missing_value = "0")]
    manual_clock: Option<u64>,

    /// Override the attention cooldown
    #[arg(long, value_name = "MS")]
    cooldown_ms: Option<u64>,

    /// Override the total visible widget ceiling
    #[arg(long, value_name = "N")]
    max_visible: Option<usize>,

    /// Stop at the first command that fails
    #[arg(long)]
    strict: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "A2UI_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(total) = self.max_visible {
            overrides = overrides.with_max_visible_total(total);
        }
        if let Some(ms) = self.cooldown_ms {
            overrides = overrides.with_cooldown_ms(ms);
        }
        if let Some(dir) = &self.storage_dir {
            overrides = overrides.with_storage_dir(dir.clone()).with_persist(true);
        }
        overrides
    }
}

/// Initialize logging with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("a2ui_replay={level},a2ui_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

/// Build the session described by `args`
fn build_session(args: &Args) -> Result<Replay> {
    let mut config = load_config_from_path(args.config.clone()).context("Failed to load config")?;
    args.overrides().apply(&mut config);
    config.validate().context("Invalid configuration")?;

    let manual_clock = args.manual_clock.map(ManualClock::new);
    let clock: SharedClock = match &manual_clock {
        Some(clock) => Arc::new(clock.clone()),
        None => a2ui_core::clock::system_clock(),
    };

    let mut session =
        WidgetSession::from_config(&config, clock).context("Failed to open surface storage")?;

    if args.restore {
        let restored = session
            .store_mut()
            .restore()
            .context("Failed to restore surfaces")?;
        info!(restored, "Restored persisted surfaces");
    }

    Ok(Replay::new(session, manual_clock))
}

async fn open_input(path: Option<&PathBuf>) -> Result<Box<dyn AsyncRead + Unpin + Send>> {
    match path {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open input: {path:?}"))?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(tokio::io::stdin())),
    }
}

/// Apply every input line, writing reports to stdout
async fn run(args: &Args, mut replay: Replay) -> Result<()> {
    let input = open_input(args.input.as_ref()).await?;
    let mut lines = BufReader::new(input).lines();
    let mut stdout = tokio::io::stdout();
    let mut line_number = 0usize;
    let mut failures = 0usize;

    while let Some(line) = lines.next_line().await.context("Failed to read input")? {
        line_number += 1;

        let report = match replay.apply_line(&line) {
            Ok(Some(report)) => report,
            Ok(None) => continue,
            Err(e) => {
                failures += 1;
                warn!(line = line_number, error = %format!("{e:#}"), "Command failed");
                if args.strict {
                    return Err(e.context(format!("Line {line_number}")));
                }
                serde_json::json!({ "line": line_number, "error": format!("{e:#}") })
            }
        };

        let mut encoded = serde_json::to_vec(&report)?;
        encoded.push(b'\n');
        stdout.write_all(&encoded).await?;
        stdout.flush().await?;
    }

    info!(
        applied = replay.applied(),
        failures,
        surfaces = replay.session().store().len(),
        "Replay finished"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    info!("A2UI Replay starting");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let replay = build_session(&args)?;

    tokio::select! {
        result = run(&args, replay) => {
            if let Err(e) = &result {
                error!(error = %format!("{e:#}"), "Replay aborted");
            }
            result
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, stopping replay");
            Ok(())
        }
    }
}
