//! Shared fixtures for data-layer unit tests.

use crate::domain::Bar;

/// `count` well-formed bars on a `step`-spaced grid starting at `start_ms`,
/// with a mild deterministic price drift so bars are distinguishable.
pub fn grid_bars(start_ms: i64, count: usize, step: i64) -> Vec<Bar> {
    (0..count)
        .map(|i| {
            let open_time = start_ms + i as i64 * step;
            let base = 100.0 + i as f64;
            Bar {
                open_time,
                open: base,
                high: base + 1.0,
                low: base - 1.0,
                close: base + 0.5,
                volume: 10.0 + i as f64,
                close_time: open_time + step - 1,
                quote_volume: 1_000.0,
                trade_count: 42,
                taker_buy_base_volume: 5.0,
                taker_buy_quote_volume: 500.0,
            }
        })
        .collect()
}
