//! Parquet-backed bar repository.
//!
//! Layout: `{root}/symbol={SYMBOL}/{YYYY-MM-DD}.parquet`, one file per UTC
//! day of `open_time`. Writes are atomic (write to .tmp, rename into place)
//! and merge-on-insert: an insert loads the day partition, drops bars whose
//! keys already exist, and rewrites the file sorted by `open_time`.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDate};
use polars::prelude::*;

use super::repository::{BarRepository, RepoError};
use crate::domain::Bar;

/// Bars-on-disk repository rooted at a data directory.
pub struct ParquetRepository {
    root: PathBuf,
}

impl ParquetRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn symbol_dir(&self, symbol: &str) -> PathBuf {
        self.root.join(format!("symbol={symbol}"))
    }

    fn day_path(&self, symbol: &str, day: NaiveDate) -> PathBuf {
        self.symbol_dir(symbol).join(format!("{}.parquet", day.format("%Y-%m-%d")))
    }

    /// UTC days touched by `[start_ms, end_ms)`, oldest first.
    fn days_in_range(start_ms: i64, end_ms: i64) -> Vec<NaiveDate> {
        if end_ms <= start_ms {
            return Vec::new();
        }
        let first = utc_day(start_ms);
        let last = utc_day(end_ms - 1);
        let mut days = Vec::new();
        let mut day = first;
        while day <= last {
            days.push(day);
            day = day + Duration::days(1);
        }
        days
    }

    /// Load one day partition; missing file means no bars for that day.
    fn load_day(&self, symbol: &str, day: NaiveDate) -> Result<Vec<Bar>, RepoError> {
        let path = self.day_path(symbol, day);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = fs::File::open(&path).map_err(|e| RepoError::Io(format!("open: {e}")))?;
        let df = ParquetReader::new(file)
            .finish()
            .map_err(|e| RepoError::Corrupt {
                path: path.display().to_string(),
                detail: e.to_string(),
            })?;
        dataframe_to_bars(&df).map_err(|e| match e {
            RepoError::Parquet(detail) => RepoError::Corrupt {
                path: path.display().to_string(),
                detail,
            },
            other => other,
        })
    }

    fn write_day(&self, symbol: &str, day: NaiveDate, bars: &[Bar]) -> Result<(), RepoError> {
        let dir = self.symbol_dir(symbol);
        fs::create_dir_all(&dir).map_err(|e| RepoError::Io(format!("create dir: {e}")))?;

        let df = bars_to_dataframe(bars)?;
        let path = self.day_path(symbol, day);
        let tmp_path = path.with_extension("parquet.tmp");

        let file =
            fs::File::create(&tmp_path).map_err(|e| RepoError::Io(format!("create file: {e}")))?;
        ParquetWriter::new(file)
            .finish(&mut df.clone())
            .map_err(|e| RepoError::Parquet(format!("write: {e}")))?;

        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            RepoError::Io(format!("atomic rename failed: {e}"))
        })
    }
}

impl BarRepository for ParquetRepository {
    fn find_in_range(
        &self,
        symbol: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<Bar>, RepoError> {
        let mut out = Vec::new();
        for day in Self::days_in_range(start_ms, end_ms) {
            let day_bars = self.load_day(symbol, day)?;
            out.extend(
                day_bars
                    .into_iter()
                    .filter(|b| b.open_time >= start_ms && b.open_time < end_ms),
            );
        }
        out.sort_by_key(|b| b.open_time);
        Ok(out)
    }

    fn keys_in_range(
        &self,
        symbol: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<BTreeSet<i64>, RepoError> {
        Ok(self
            .find_in_range(symbol, start_ms, end_ms)?
            .into_iter()
            .map(|b| b.open_time)
            .collect())
    }

    fn insert_many(&self, symbol: &str, bars: &[Bar]) -> Result<usize, RepoError> {
        if bars.is_empty() {
            return Ok(0);
        }

        // Group incoming bars by UTC day partition.
        let mut by_day: Vec<(NaiveDate, Vec<&Bar>)> = Vec::new();
        for bar in bars {
            let day = utc_day(bar.open_time);
            match by_day.iter_mut().find(|(d, _)| *d == day) {
                Some((_, v)) => v.push(bar),
                None => by_day.push((day, vec![bar])),
            }
        }

        let mut written = 0;
        for (day, day_bars) in by_day {
            let mut existing = self.load_day(symbol, day)?;
            let known: BTreeSet<i64> = existing.iter().map(|b| b.open_time).collect();

            let fresh: Vec<Bar> = day_bars
                .into_iter()
                .filter(|b| !known.contains(&b.open_time))
                .cloned()
                .collect();
            if fresh.is_empty() {
                continue;
            }

            written += fresh.len();
            existing.extend(fresh);
            existing.sort_by_key(|b| b.open_time);
            existing.dedup_by_key(|b| b.open_time);
            self.write_day(symbol, day, &existing)?;
        }
        Ok(written)
    }
}

fn utc_day(ms: i64) -> NaiveDate {
    DateTime::from_timestamp_millis(ms)
        .expect("bar timestamp out of chrono range")
        .naive_utc()
        .date()
}

// ── DataFrame conversion ────────────────────────────────────────────

const COLUMNS: [&str; 11] = [
    "open_time",
    "open",
    "high",
    "low",
    "close",
    "volume",
    "close_time",
    "quote_volume",
    "trade_count",
    "taker_buy_base_volume",
    "taker_buy_quote_volume",
];

fn bars_to_dataframe(bars: &[Bar]) -> Result<DataFrame, RepoError> {
    let open_times: Vec<i64> = bars.iter().map(|b| b.open_time).collect();
    let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
    let close_times: Vec<i64> = bars.iter().map(|b| b.close_time).collect();
    let quote_volumes: Vec<f64> = bars.iter().map(|b| b.quote_volume).collect();
    let trade_counts: Vec<i64> = bars.iter().map(|b| b.trade_count).collect();
    let taker_base: Vec<f64> = bars.iter().map(|b| b.taker_buy_base_volume).collect();
    let taker_quote: Vec<f64> = bars.iter().map(|b| b.taker_buy_quote_volume).collect();

    DataFrame::new(vec![
        Column::new("open_time".into(), open_times),
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("volume".into(), volumes),
        Column::new("close_time".into(), close_times),
        Column::new("quote_volume".into(), quote_volumes),
        Column::new("trade_count".into(), trade_counts),
        Column::new("taker_buy_base_volume".into(), taker_base),
        Column::new("taker_buy_quote_volume".into(), taker_quote),
    ])
    .map_err(|e| RepoError::Parquet(format!("dataframe creation: {e}")))
}

fn dataframe_to_bars(df: &DataFrame) -> Result<Vec<Bar>, RepoError> {
    for col_name in &COLUMNS {
        if df.column(col_name).is_err() {
            return Err(RepoError::Parquet(format!("missing column '{col_name}'")));
        }
    }

    let i64_col = |name: &str| -> Result<Vec<i64>, RepoError> {
        let col = df
            .column(name)
            .map_err(|e| RepoError::Parquet(format!("column {name}: {e}")))?
            .i64()
            .map_err(|e| RepoError::Parquet(format!("column {name} type: {e}")))?;
        col.into_iter()
            .enumerate()
            .map(|(i, v)| v.ok_or_else(|| RepoError::Parquet(format!("null {name} at row {i}"))))
            .collect()
    };
    let f64_col = |name: &str| -> Result<Vec<f64>, RepoError> {
        let col = df
            .column(name)
            .map_err(|e| RepoError::Parquet(format!("column {name}: {e}")))?
            .f64()
            .map_err(|e| RepoError::Parquet(format!("column {name} type: {e}")))?;
        col.into_iter()
            .enumerate()
            .map(|(i, v)| v.ok_or_else(|| RepoError::Parquet(format!("null {name} at row {i}"))))
            .collect()
    };

    let open_times = i64_col("open_time")?;
    let opens = f64_col("open")?;
    let highs = f64_col("high")?;
    let lows = f64_col("low")?;
    let closes = f64_col("close")?;
    let volumes = f64_col("volume")?;
    let close_times = i64_col("close_time")?;
    let quote_volumes = f64_col("quote_volume")?;
    let trade_counts = i64_col("trade_count")?;
    let taker_base = f64_col("taker_buy_base_volume")?;
    let taker_quote = f64_col("taker_buy_quote_volume")?;

    Ok((0..df.height())
        .map(|i| Bar {
            open_time: open_times[i],
            open: opens[i],
            high: highs[i],
            low: lows[i],
            close: closes[i],
            volume: volumes[i],
            close_time: close_times[i],
            quote_volume: quote_volumes[i],
            trade_count: trade_counts[i],
            taker_buy_base_volume: taker_base[i],
            taker_buy_quote_volume: taker_quote[i],
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::testutil::grid_bars;

    const STEP: i64 = 60_000;

    #[test]
    fn write_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let repo = ParquetRepository::new(dir.path());

        let bars = grid_bars(1_700_000_000_000, 5, STEP);
        assert_eq!(repo.insert_many("BTCUSDT", &bars).unwrap(), 5);

        let loaded = repo
            .find_in_range("BTCUSDT", 1_700_000_000_000, 1_700_000_000_000 + 5 * STEP)
            .unwrap();
        assert_eq!(loaded, bars);
    }

    #[test]
    fn insert_is_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let repo = ParquetRepository::new(dir.path());

        let bars = grid_bars(1_700_000_000_000, 4, STEP);
        repo.insert_many("BTCUSDT", &bars).unwrap();
        assert_eq!(repo.insert_many("BTCUSDT", &bars).unwrap(), 0);

        let loaded = repo
            .find_in_range("BTCUSDT", 1_700_000_000_000, 1_700_000_000_000 + 4 * STEP)
            .unwrap();
        assert_eq!(loaded.len(), 4);
    }

    #[test]
    fn partitions_split_on_utc_day_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let repo = ParquetRepository::new(dir.path());

        // 2023-11-14 23:58 UTC, four 1m bars straddling midnight.
        let start = 1_700_006_280_000;
        let bars = grid_bars(start, 4, STEP);
        repo.insert_many("BTCUSDT", &bars).unwrap();

        let sym_dir = dir.path().join("symbol=BTCUSDT");
        let mut files: Vec<String> = fs::read_dir(&sym_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        files.sort();
        assert_eq!(files, vec!["2023-11-14.parquet", "2023-11-15.parquet"]);

        let loaded = repo.find_in_range("BTCUSDT", start, start + 4 * STEP).unwrap();
        assert_eq!(loaded, bars);
    }

    #[test]
    fn no_tmp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let repo = ParquetRepository::new(dir.path());
        repo.insert_many("BTCUSDT", &grid_bars(1_700_000_000_000, 3, STEP))
            .unwrap();

        let sym_dir = dir.path().join("symbol=BTCUSDT");
        let leftovers: Vec<_> = fs::read_dir(&sym_dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn find_on_empty_store_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let repo = ParquetRepository::new(dir.path());
        assert!(repo
            .find_in_range("BTCUSDT", 0, 1_700_000_000_000)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn range_filter_is_half_open() {
        let dir = tempfile::tempdir().unwrap();
        let repo = ParquetRepository::new(dir.path());
        let bars = grid_bars(1_700_000_000_000, 3, STEP);
        repo.insert_many("BTCUSDT", &bars).unwrap();

        let keys = repo
            .keys_in_range(
                "BTCUSDT",
                1_700_000_000_000 + STEP,
                1_700_000_000_000 + 2 * STEP,
            )
            .unwrap();
        assert_eq!(
            keys.into_iter().collect::<Vec<_>>(),
            vec![1_700_000_000_000 + STEP]
        );
    }
}
