//! zhist - history of a path across ZFS snapshots.
//!
//! This is the main entry point for the zhist CLI.

mod render;

use anyhow::Context;
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use zhist_history::{History, HistoryConfig};
use zhist_util::{LogConfig, LogLevel};

#[derive(Parser)]
#[command(name = "zhist")]
#[command(author, version, about = "Show the history of files across ZFS snapshots", long_about = None)]
struct Cli {
    /// Files or directories to inspect
    #[arg(default_value = ".")]
    paths: Vec<PathBuf>,

    /// Increase logging verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print output as JSON
    #[arg(long)]
    json: bool,

    /// Configuration file layered over the global one
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Timeout for each zfs command, in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Number of paths processed concurrently
    #[arg(long, value_name = "N")]
    jobs: Option<usize>,

    /// Read snapshot views without mounting them first
    #[arg(long)]
    no_mount: bool,
}

impl Cli {
    /// Command line flags override every other configuration layer.
    fn apply_overrides(&self, config: &mut HistoryConfig) {
        if let Some(secs) = self.timeout {
            config.command_timeout_secs = secs;
        }
        if let Some(jobs) = self.jobs {
            config.jobs = jobs;
        }
        if self.no_mount {
            config.mount_snapshots = false;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    zhist_util::log::init(LogConfig {
        level: LogLevel::from_verbosity(cli.verbose),
        ..LogConfig::default()
    });

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("zhist: {e:#}");
            ExitCode::from(2)
        }
    }
}

/// Returns whether every path succeeded.
async fn run(cli: Cli) -> anyhow::Result<bool> {
    let (mut config, sources) = HistoryConfig::load(cli.config.as_deref())
        .await
        .context("failed to load configuration")?;
    cli.apply_overrides(&mut config);
    config.validate().context("invalid options")?;
    debug!(sources = ?sources, config = ?config, "Effective configuration");

    let history = History::new(config);
    let reports = history.process(&cli.paths).await;

    let stdout = std::io::stdout();
    let stderr = std::io::stderr();
    let mut out = stdout.lock();
    let mut err = stderr.lock();
    if cli.json {
        render::write_json(&mut out, &mut err, &reports)?;
    } else {
        render::write_text(&mut out, &mut err, &reports)?;
    }
    out.flush()?;

    Ok(reports.iter().all(|r| r.outcome.is_ok()))
}
