//! Artifact export — JSON and CSV files for the result consumer.
//!
//! A run's artifact directory is `{output_dir}/{symbol}_{run_id[..12]}/`:
//! - `analyzed.json` — the ordered classified-bar sequence
//! - `orders.csv` — one row per simulated order, with realized profit
//! - `summary.json` — run metadata and the aggregate order summary
//!
//! All artifacts carry a `schema_version`; unknown versions are rejected on
//! load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use rangelab_core::domain::Order;
use rangelab_core::sim::OrderSummary;

use crate::config::RunConfig;
use crate::runner::RunOutcome;

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Contents of `summary.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: String,
    pub symbol: String,
    pub interval: String,
    pub analyzed_bars: usize,
    pub summary: OrderSummary,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Serialize the order list as CSV.
pub fn export_orders_csv(orders: &[Order], unit_size: f64) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "side",
        "status",
        "entry_price",
        "stop_price",
        "take_profit_price",
        "entry_time",
        "close_time",
        "close_price",
        "profit",
    ])?;

    for order in orders {
        wtr.write_record([
            &format!("{:?}", order.side).to_lowercase(),
            &format!("{:?}", order.status).to_lowercase(),
            &format!("{:.8}", order.entry_price),
            &format!("{:.8}", order.stop_price),
            &format!("{:.8}", order.take_profit_price),
            &order.entry_time.map(|t| t.to_string()).unwrap_or_default(),
            &order.close_time.map(|t| t.to_string()).unwrap_or_default(),
            &order
                .close_price
                .map(|p| format!("{p:.8}"))
                .unwrap_or_default(),
            &format!("{:.4}", order.profit(unit_size)),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Save the full artifact set for a finished run. Returns the directory.
pub fn save_artifacts(outcome: &RunOutcome, config: &RunConfig) -> Result<PathBuf> {
    let short_id: String = outcome.run_id.chars().take(12).collect();
    let run_dir = config
        .output_dir
        .join(format!("{}_{}", config.symbol, short_id));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    let analyzed_json = serde_json::to_string_pretty(&outcome.report.analyzed)
        .context("failed to serialize analyzed bars")?;
    std::fs::write(run_dir.join("analyzed.json"), analyzed_json)?;

    let orders_csv = export_orders_csv(&outcome.report.orders, config.unit_size)?;
    std::fs::write(run_dir.join("orders.csv"), orders_csv)?;

    let manifest = RunManifest {
        schema_version: SCHEMA_VERSION,
        run_id: outcome.run_id.clone(),
        symbol: config.symbol.clone(),
        interval: config.interval.clone(),
        analyzed_bars: outcome.report.analyzed.len(),
        summary: outcome.report.summary.clone(),
    };
    let manifest_json =
        serde_json::to_string_pretty(&manifest).context("failed to serialize manifest")?;
    std::fs::write(run_dir.join("summary.json"), manifest_json)?;

    Ok(run_dir)
}

/// Load a run's manifest, rejecting unknown schema versions.
pub fn load_manifest(run_dir: &Path) -> Result<RunManifest> {
    let path = run_dir.join("summary.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let manifest: RunManifest =
        serde_json::from_str(&json).context("failed to deserialize manifest")?;
    if manifest.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            manifest.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(manifest)
}
