//! Serializable run configuration.
//!
//! A run is fully described by one TOML file: instrument, bar interval,
//! detector thresholds, simulator parameters, mode, and the analysis range.
//! Validation happens once at load time; the core components assume the
//! values they receive are sound.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use rangelab_core::detector::DetectorConfig;
use rangelab_core::engine::EngineConfig;
use rangelab_core::sim::TraderConfig;

/// Unique identifier for a run (content-addressable hash of the config).
pub type RunId = String;

/// Errors from loading or validating a configuration. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {detail}")]
    Read { path: String, detail: String },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("unsupported interval '{0}'")]
    UnsupportedInterval(String),

    #[error("invalid {field}: {detail}")]
    Invalid {
        field: &'static str,
        detail: String,
    },

    #[error("bad timestamp '{0}': expected YYYY-MM-DD or YYYY-MM-DD HH:MM:SS")]
    BadTimestamp(String),

    #[error("historical mode requires both start and end")]
    MissingRange,
}

/// Which loop the dispatcher runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    #[default]
    Historical,
    Live,
}

/// Which feed backs the bar store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedKind {
    #[default]
    Binance,
    Synthetic,
}

/// One run, fully specified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Instrument symbol, e.g. `BTCUSDT`.
    pub symbol: String,

    /// Bar interval label, e.g. `1m`, `1h`.
    #[serde(default = "default_interval")]
    pub interval: String,

    /// Trailing lookback window in hours.
    pub time_window_hours: i64,

    /// Impulse threshold: growth over the window minimum, percent.
    pub growth_threshold_pct: f64,

    /// Retracement threshold: drop from the impulse high, percent.
    pub drop_threshold_pct: f64,

    /// Mid-level bias fraction used by the detector.
    #[serde(default = "default_deviation")]
    pub deviation: f64,

    /// Order-level deviation as a fraction of the sideway height.
    #[serde(default = "default_deviation_factor")]
    pub deviation_factor: f64,

    /// Quote units per simulated order (profit accounting only).
    #[serde(default = "default_unit_size")]
    pub unit_size: f64,

    #[serde(default)]
    pub mode: RunMode,

    /// Analysis range, required in historical mode. UTC.
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,

    /// Live-mode polling period in seconds.
    #[serde(default = "default_poll_secs")]
    pub poll_secs: u64,

    #[serde(default)]
    pub feed: FeedKind,

    /// Parquet store root.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Artifact output root.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Max bars per feed request.
    #[serde(default = "default_page_limit")]
    pub page_limit: usize,
}

fn default_interval() -> String {
    "1m".into()
}
fn default_deviation() -> f64 {
    0.05
}
fn default_deviation_factor() -> f64 {
    0.05
}
fn default_unit_size() -> f64 {
    1000.0
}
fn default_poll_secs() -> u64 {
    60
}
fn default_data_dir() -> PathBuf {
    "data".into()
}
fn default_output_dir() -> PathBuf {
    "results".into()
}
fn default_page_limit() -> usize {
    1000
}

impl RunConfig {
    /// Load and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?;
        let config: RunConfig = toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field the core will assume to be sound.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let interval_ms = self.interval_ms()?;

        if self.symbol.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "symbol",
                detail: "must not be empty".into(),
            });
        }
        if self.time_window_hours <= 0 {
            return Err(ConfigError::Invalid {
                field: "time_window_hours",
                detail: "must be positive".into(),
            });
        }
        if self.time_window_ms() % interval_ms != 0 {
            return Err(ConfigError::Invalid {
                field: "time_window_hours",
                detail: format!("must be a multiple of the '{}' interval", self.interval),
            });
        }
        if self.growth_threshold_pct <= 0.0 || self.drop_threshold_pct <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "thresholds",
                detail: "growth and drop thresholds must be positive".into(),
            });
        }
        if !(0.0..0.5).contains(&self.deviation) {
            return Err(ConfigError::Invalid {
                field: "deviation",
                detail: "must lie in [0, 0.5)".into(),
            });
        }
        if self.deviation_factor < 0.0 {
            return Err(ConfigError::Invalid {
                field: "deviation_factor",
                detail: "must not be negative".into(),
            });
        }
        if self.unit_size <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "unit_size",
                detail: "must be positive".into(),
            });
        }
        if self.poll_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "poll_secs",
                detail: "must be positive".into(),
            });
        }
        if self.page_limit == 0 {
            return Err(ConfigError::Invalid {
                field: "page_limit",
                detail: "must be positive".into(),
            });
        }

        if self.mode == RunMode::Historical {
            let start = self.start_ms()?;
            let end = self.end_ms()?;
            if start >= end {
                return Err(ConfigError::Invalid {
                    field: "start/end",
                    detail: "start must precede end".into(),
                });
            }
        }
        Ok(())
    }

    /// Bar interval in milliseconds for the configured label.
    pub fn interval_ms(&self) -> Result<i64, ConfigError> {
        let ms = match self.interval.as_str() {
            "1m" => 60_000,
            "3m" => 3 * 60_000,
            "5m" => 5 * 60_000,
            "15m" => 15 * 60_000,
            "30m" => 30 * 60_000,
            "1h" => 3_600_000,
            "2h" => 2 * 3_600_000,
            "4h" => 4 * 3_600_000,
            "6h" => 6 * 3_600_000,
            "8h" => 8 * 3_600_000,
            "12h" => 12 * 3_600_000,
            "1d" => 24 * 3_600_000,
            other => return Err(ConfigError::UnsupportedInterval(other.to_string())),
        };
        Ok(ms)
    }

    pub fn time_window_ms(&self) -> i64 {
        self.time_window_hours * 3_600_000
    }

    pub fn start_ms(&self) -> Result<i64, ConfigError> {
        match &self.start {
            Some(s) => parse_timestamp_ms(s),
            None => Err(ConfigError::MissingRange),
        }
    }

    pub fn end_ms(&self) -> Result<i64, ConfigError> {
        match &self.end {
            Some(s) => parse_timestamp_ms(s),
            None => Err(ConfigError::MissingRange),
        }
    }

    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            growth_threshold_pct: self.growth_threshold_pct,
            drop_threshold_pct: self.drop_threshold_pct,
            deviation: self.deviation,
        }
    }

    pub fn trader_config(&self) -> TraderConfig {
        TraderConfig {
            deviation_factor: self.deviation_factor,
            unit_size: self.unit_size,
        }
    }

    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        Ok(EngineConfig {
            time_window_ms: self.time_window_ms(),
            interval_ms: self.interval_ms()?,
            poll_interval: Duration::from_secs(self.poll_secs),
        })
    }

    /// Deterministic hash id for this configuration; two identical configs
    /// share artifact directories.
    pub fn run_id(&self) -> RunId {
        let json = serde_json::to_string(self).expect("RunConfig serialization failed");
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}

/// Parse `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS` as UTC epoch milliseconds.
fn parse_timestamp_ms(text: &str) -> Result<i64, ConfigError> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt.and_utc().timestamp_millis());
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        let dt = date.and_hms_opt(0, 0, 0).expect("midnight is always valid");
        return Ok(dt.and_utc().timestamp_millis());
    }
    Err(ConfigError::BadTimestamp(text.to_string()))
}
