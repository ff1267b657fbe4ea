//! Runner — wires config, store, detector, simulator into one dispatcher.

use std::sync::atomic::AtomicBool;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use rangelab_core::data::{
    BarFeed, BarStore, BinanceFeed, ParquetRepository, StoreError, SyntheticFeed,
};
use rangelab_core::detector::SwingDetector;
use rangelab_core::engine::{Dispatcher, RunReport};
use rangelab_core::sim::Trader;

use crate::config::{ConfigError, FeedKind, RunConfig, RunId};

/// Seed for the synthetic feed, fixed so offline runs are reproducible.
const SYNTHETIC_SEED: u64 = 7;
const SYNTHETIC_BASE_PRICE: f64 = 100.0;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("data error: {0}")]
    Store(#[from] StoreError),
}

/// Everything a finished historical run hands to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub run_id: RunId,
    pub report: RunReport,
}

/// Build the bar store described by the config.
pub fn build_store(config: &RunConfig) -> Result<BarStore, ConfigError> {
    let interval_ms = config.interval_ms()?;
    let feed: Box<dyn BarFeed> = match config.feed {
        FeedKind::Binance => Box::new(BinanceFeed::new(config.interval.clone())),
        FeedKind::Synthetic => Box::new(SyntheticFeed::new(
            interval_ms,
            SYNTHETIC_SEED,
            SYNTHETIC_BASE_PRICE,
        )),
    };
    Ok(BarStore::new(
        feed,
        Box::new(ParquetRepository::new(&config.data_dir)),
        config.symbol.clone(),
        interval_ms,
        config.page_limit,
    ))
}

/// Build the full dispatcher described by the config.
pub fn build_dispatcher(config: &RunConfig) -> Result<Dispatcher, ConfigError> {
    Ok(Dispatcher::new(
        build_store(config)?,
        SwingDetector::new(config.detector_config()),
        Trader::new(config.trader_config()),
        config.engine_config()?,
    ))
}

/// Execute a historical run over the configured range.
pub fn run_historical(config: &RunConfig) -> Result<RunOutcome, RunError> {
    let run_id = config.run_id();
    info!(symbol = %config.symbol, run_id = %run_id, "starting historical run");

    let mut dispatcher = build_dispatcher(config)?;
    let report = dispatcher.run_historical(config.start_ms()?, config.end_ms()?)?;
    Ok(RunOutcome { run_id, report })
}

/// Run the live polling loop until `stop` is observed at a tick boundary.
pub fn run_live(config: &RunConfig, stop: &AtomicBool) -> Result<(), RunError> {
    info!(symbol = %config.symbol, poll_secs = config.poll_secs, "starting live monitoring");
    let mut dispatcher = build_dispatcher(config)?;
    Ok(dispatcher.run_live(stop)?)
}

/// Prefetch `[start_ms, end_ms)` into the store. Returns the number of bars
/// the reconciled range now holds.
pub fn sync_range(config: &RunConfig, start_ms: i64, end_ms: i64) -> Result<usize, RunError> {
    let store = build_store(config)?;
    let bars = store.reconcile(start_ms, end_ms)?;
    info!(symbol = %config.symbol, bars = bars.len(), "store synced");
    Ok(bars.len())
}

/// Store coverage for a range: bars on hand vs. bars the grid expects.
pub fn store_coverage(
    config: &RunConfig,
    start_ms: i64,
    end_ms: i64,
) -> Result<(usize, usize), RunError> {
    let interval_ms = config.interval_ms()?;
    let store = build_store(config)?;
    let available = store.range_available(start_ms, end_ms)?.len();
    let expected = ((end_ms - start_ms).max(0) / interval_ms) as usize;
    Ok((available, expected))
}
