//! RangeLab Core — sideways-breakout detection and order simulation over a
//! reconciled kline series.
//!
//! The crate is built from four parts, wired together by the dispatcher:
//! - Domain types (bars, simulated orders)
//! - Bar store: gap detection and feed backfill over a durable repository
//! - Swing detector: the high → low → mid state machine
//! - Order simulator: paired entries, averaging, re-entry, racing exits

pub mod data;
pub mod detector;
pub mod domain;
pub mod engine;
pub mod sim;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: the types that cross the store's trait seams are
    /// Send + Sync, so a runner may drive reconciliation from a worker
    /// thread.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::Order>();
        require_sync::<domain::Order>();

        require_send::<data::BarStore>();
        require_send::<data::MemoryRepository>();
        require_sync::<data::MemoryRepository>();
        require_send::<data::ParquetRepository>();
        require_sync::<data::ParquetRepository>();
        require_send::<data::BinanceFeed>();
        require_sync::<data::BinanceFeed>();
        require_send::<data::SyntheticFeed>();
        require_sync::<data::SyntheticFeed>();

        require_send::<detector::SwingDetector>();
        require_send::<sim::Trader>();
        require_send::<engine::RunReport>();
        require_sync::<engine::RunReport>();
    }
}
