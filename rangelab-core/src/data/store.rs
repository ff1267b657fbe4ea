//! Bar store: gap-free range queries over a slow remote feed.
//!
//! The store answers range queries from the repository and, when the range
//! is incomplete, backfills it from the feed in limit-sized pages before
//! answering. Bars are deduplicated by `open_time` on insert, which makes
//! reconciliation idempotent: a second call over the same range writes
//! nothing and returns the same logical result.

use thiserror::Error;
use tracing::{debug, info, warn};

use super::gaps::{missing_intervals, MissingInterval};
use super::provider::{BarFeed, FeedError};
use super::repository::{BarRepository, RepoError};
use crate::domain::Bar;

/// Errors from the bar store: either side of it can fail.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Cache/backfill layer for one instrument's kline series.
pub struct BarStore {
    feed: Box<dyn BarFeed>,
    repo: Box<dyn BarRepository>,
    symbol: String,
    interval_ms: i64,
    page_limit: usize,
}

impl BarStore {
    pub fn new(
        feed: Box<dyn BarFeed>,
        repo: Box<dyn BarRepository>,
        symbol: impl Into<String>,
        interval_ms: i64,
        page_limit: usize,
    ) -> Self {
        assert!(interval_ms > 0, "bar interval must be positive");
        assert!(page_limit > 0, "feed page limit must be positive");
        Self {
            feed,
            repo,
            symbol: symbol.into(),
            interval_ms,
            page_limit,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn interval_ms(&self) -> i64 {
        self.interval_ms
    }

    /// Bars already persisted in `[start_ms, end_ms)`, ordered by open time.
    pub fn range_available(&self, start_ms: i64, end_ms: i64) -> Result<Vec<Bar>, StoreError> {
        Ok(self.repo.find_in_range(&self.symbol, start_ms, end_ms)?)
    }

    /// Return a reconciled view of `[start_ms, end_ms)`.
    ///
    /// Missing sub-ranges are computed against the expected open-time grid
    /// and pulled from the feed page by page; every page is persisted before
    /// the cursor advances to `last.close_time + 1`. A page that comes back
    /// empty is a possible real gap in the source series — logged, left
    /// alone, never retried. A feed error aborts the whole call.
    pub fn reconcile(&self, start_ms: i64, end_ms: i64) -> Result<Vec<Bar>, StoreError> {
        let present = self.repo.keys_in_range(&self.symbol, start_ms, end_ms)?;
        let gaps = missing_intervals(start_ms, end_ms, self.interval_ms, &present);

        if !gaps.is_empty() {
            info!(
                symbol = %self.symbol,
                start_ms,
                end_ms,
                gaps = gaps.len(),
                "range incomplete, backfilling from {}",
                self.feed.name()
            );
            for gap in &gaps {
                self.backfill(gap)?;
            }
        }

        Ok(self.repo.find_in_range(&self.symbol, start_ms, end_ms)?)
    }

    /// Pull one missing interval from the feed in pages.
    fn backfill(&self, gap: &MissingInterval) -> Result<(), StoreError> {
        let mut cursor = gap.start;
        while cursor <= gap.end {
            let page = self
                .feed
                .fetch(&self.symbol, cursor, gap.end, self.page_limit)?;

            if page.is_empty() {
                warn!(
                    symbol = %self.symbol,
                    from = cursor,
                    to = gap.end,
                    "feed has no bars for missing interval, leaving the gap"
                );
                return Ok(());
            }

            let written = self.repo.insert_many(&self.symbol, &page)?;
            let last_close = page.last().map(|b| b.close_time).unwrap_or(gap.end);
            debug!(
                symbol = %self.symbol,
                fetched = page.len(),
                written,
                cursor,
                "persisted backfill page"
            );
            cursor = last_close + 1;
        }
        Ok(())
    }
}
