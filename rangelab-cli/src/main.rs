//! RangeLab CLI — backtest, live monitoring, and store management.
//!
//! Commands:
//! - `backtest` — run the configured historical range and save artifacts
//! - `watch` — live monitoring on the configured polling period
//! - `sync` — prefetch a bar range into the local store
//! - `status` — report store coverage for a range

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use rangelab_runner::{
    run_historical, run_live, save_artifacts, store_coverage, sync_range, RunConfig,
};

#[derive(Parser)]
#[command(name = "rangelab", about = "RangeLab — sideways-breakout backtesting engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the configured historical range and save artifacts.
    Backtest {
        /// Path to a TOML run config.
        #[arg(long, default_value = "rangelab.toml")]
        config: PathBuf,

        /// Override the config's artifact output directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Poll the feed and evaluate the newest bar until interrupted.
    Watch {
        #[arg(long, default_value = "rangelab.toml")]
        config: PathBuf,
    },
    /// Prefetch a bar range into the local store.
    Sync {
        #[arg(long, default_value = "rangelab.toml")]
        config: PathBuf,

        /// Range start (YYYY-MM-DD or "YYYY-MM-DD HH:MM:SS", UTC).
        #[arg(long)]
        start: String,

        /// Range end (same formats).
        #[arg(long)]
        end: String,
    },
    /// Report store coverage for a range.
    Status {
        #[arg(long, default_value = "rangelab.toml")]
        config: PathBuf,

        #[arg(long)]
        start: String,

        #[arg(long)]
        end: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Backtest { config, output_dir } => cmd_backtest(&config, output_dir),
        Commands::Watch { config } => cmd_watch(&config),
        Commands::Sync { config, start, end } => cmd_sync(&config, &start, &end),
        Commands::Status { config, start, end } => cmd_status(&config, &start, &end),
    }
}

fn load_config(path: &PathBuf) -> Result<RunConfig> {
    RunConfig::load(path).with_context(|| format!("loading config {}", path.display()))
}

fn cmd_backtest(config_path: &PathBuf, output_dir: Option<PathBuf>) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(dir) = output_dir {
        config.output_dir = dir;
    }

    let outcome = run_historical(&config).context("historical run failed")?;
    let run_dir = save_artifacts(&outcome, &config).context("saving artifacts failed")?;

    let s = &outcome.report.summary;
    println!(
        "{}: {} bars analyzed, {} orders ({} positive, {} negative), net {:.2}",
        config.symbol,
        outcome.report.analyzed.len(),
        s.total,
        s.positive,
        s.negative,
        s.net_profit
    );
    println!("artifacts: {}", run_dir.display());
    Ok(())
}

fn cmd_watch(config_path: &PathBuf) -> Result<()> {
    let config = load_config(config_path)?;
    // Cooperative stop is observed at tick boundaries; the CLI runs until
    // the process is interrupted.
    let stop = AtomicBool::new(false);
    run_live(&config, &stop).context("live monitoring failed")?;
    Ok(())
}

/// Reuse the config's timestamp parsing for CLI-supplied range bounds.
fn range_ms(config: &RunConfig, start: &str, end: &str) -> Result<(i64, i64)> {
    let mut probe = config.clone();
    probe.start = Some(start.to_string());
    probe.end = Some(end.to_string());
    let start_ms = probe.start_ms().context("bad --start")?;
    let end_ms = probe.end_ms().context("bad --end")?;
    anyhow::ensure!(start_ms < end_ms, "--start must precede --end");
    Ok((start_ms, end_ms))
}

fn cmd_sync(config_path: &PathBuf, start: &str, end: &str) -> Result<()> {
    let config = load_config(config_path)?;
    let (start_ms, end_ms) = range_ms(&config, start, end)?;

    let bars = sync_range(&config, start_ms, end_ms).context("sync failed")?;
    println!("{}: {} bars on hand for {} - {}", config.symbol, bars, start, end);
    Ok(())
}

fn cmd_status(config_path: &PathBuf, start: &str, end: &str) -> Result<()> {
    let config = load_config(config_path)?;
    let (start_ms, end_ms) = range_ms(&config, start, end)?;

    let (available, expected) = store_coverage(&config, start_ms, end_ms)?;
    let pct = if expected == 0 {
        100.0
    } else {
        available as f64 / expected as f64 * 100.0
    };
    println!(
        "{}: {available}/{expected} bars cached ({pct:.1}%) for {start} - {end}",
        config.symbol
    );
    Ok(())
}
