//! Bar — the fundamental market data unit.

use serde::{Deserialize, Serialize};

/// One fixed-interval OHLCV kline for a single instrument.
///
/// Bars are uniquely keyed by `open_time` (epoch milliseconds); `close_time`
/// is `open_time + interval − 1`. The trailing quote/taker fields come from
/// the feed and are carried through untouched — nothing in the engine reads
/// them, but they are persisted and exported so downstream consumers see the
/// full kline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub close_time: i64,
    pub quote_volume: f64,
    pub trade_count: i64,
    pub taker_buy_base_volume: f64,
    pub taker_buy_quote_volume: f64,
}

impl Bar {
    /// Basic OHLCV sanity check: high >= low, prices positive and finite.
    pub fn is_sane(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        prices.iter().all(|p| p.is_finite() && *p > 0.0)
            && self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.close_time > self.open_time
    }
}

/// Minimum `low` over a run of bars.
///
/// The dispatcher uses this for the detector's trailing-window reference
/// price. Empty input is a caller error.
pub fn min_low(bars: &[Bar]) -> f64 {
    assert!(!bars.is_empty(), "min_low over an empty window");
    bars.iter().map(|b| b.low).fold(f64::INFINITY, f64::min)
}
