//! Bar repository trait and the in-memory implementation.
//!
//! The repository is the durable side of the bar store: an insert-only,
//! key-deduplicated map from `open_time` to [`Bar`] per instrument. The
//! Parquet implementation lives in [`super::parquet`]; the in-memory one
//! here backs tests and ephemeral runs.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

use thiserror::Error;

use crate::domain::Bar;

/// Errors from the persistent store.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("store I/O error: {0}")]
    Io(String),

    #[error("parquet error: {0}")]
    Parquet(String),

    #[error("corrupt partition {path}: {detail}")]
    Corrupt { path: String, detail: String },
}

/// Durable, insert-only bar storage keyed by `open_time`.
///
/// `insert_many` is a no-op for keys already present — reconciliation leans
/// on this for idempotence. All methods take `&self`; implementations are
/// internally synchronized.
pub trait BarRepository: Send + Sync {
    /// Bars with `open_time` in `[start_ms, end_ms)`, ordered ascending.
    fn find_in_range(&self, symbol: &str, start_ms: i64, end_ms: i64)
        -> Result<Vec<Bar>, RepoError>;

    /// Just the keys in `[start_ms, end_ms)`.
    fn keys_in_range(
        &self,
        symbol: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<BTreeSet<i64>, RepoError>;

    /// Persist bars, skipping keys that already exist. Returns the number
    /// actually written.
    fn insert_many(&self, symbol: &str, bars: &[Bar]) -> Result<usize, RepoError>;
}

/// In-memory repository: per-symbol ordered maps behind a mutex.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    series: Mutex<HashMap<String, BTreeMap<i64, Bar>>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BarRepository for MemoryRepository {
    fn find_in_range(
        &self,
        symbol: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<Bar>, RepoError> {
        let series = self.series.lock().unwrap();
        Ok(series
            .get(symbol)
            .map(|m| m.range(start_ms..end_ms).map(|(_, b)| b.clone()).collect())
            .unwrap_or_default())
    }

    fn keys_in_range(
        &self,
        symbol: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<BTreeSet<i64>, RepoError> {
        let series = self.series.lock().unwrap();
        Ok(series
            .get(symbol)
            .map(|m| m.range(start_ms..end_ms).map(|(k, _)| *k).collect())
            .unwrap_or_default())
    }

    fn insert_many(&self, symbol: &str, bars: &[Bar]) -> Result<usize, RepoError> {
        let mut series = self.series.lock().unwrap();
        let map = series.entry(symbol.to_string()).or_default();
        let mut written = 0;
        for bar in bars {
            map.entry(bar.open_time).or_insert_with(|| {
                written += 1;
                bar.clone()
            });
        }
        Ok(written)
    }
}
