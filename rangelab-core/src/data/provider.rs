//! Bar feed trait and structured error type.
//!
//! The `BarFeed` trait abstracts over the remote kline source (Binance REST,
//! deterministic synthetic series) so the store can be exercised without a
//! network and mocked in tests.

use thiserror::Error;

use crate::domain::Bar;

/// Errors from the remote feed.
///
/// The core never retries a failed feed call: a historical run aborts on the
/// first error, the live loop logs it and tries again on the next poll tick.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The provider answered with an error payload.
    #[error("feed rejected request: {message}")]
    Provider { message: String },

    /// Transport-level failure (DNS, connect, timeout, non-success status).
    #[error("feed transport error: {0}")]
    Http(String),

    /// The response arrived but could not be decoded into bars.
    #[error("feed response parse error: {0}")]
    Parse(String),
}

/// A remote source of klines for one instrument.
///
/// `fetch` returns bars whose `open_time` lies in `[start_ms, end_ms]`,
/// ordered ascending, at most `limit` of them. An empty result is a
/// legitimate "no bars in range" — only an error payload is a `FeedError`.
pub trait BarFeed: Send + Sync {
    /// Human-readable name of this feed.
    fn name(&self) -> &str;

    fn fetch(
        &self,
        symbol: &str,
        start_ms: i64,
        end_ms: i64,
        limit: usize,
    ) -> Result<Vec<Bar>, FeedError>;
}
