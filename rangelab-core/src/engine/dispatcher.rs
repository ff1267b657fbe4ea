//! Dispatcher: the one run loop that wires store, detector, and simulator.
//!
//! Pure orchestration. Each bar goes to exactly one consumer: while an
//! episode's orders are working the bar drives the simulator; otherwise it
//! drives the detector, and a mid-level reentry opens the next episode.
//! Historical mode walks a reconciled range once; live mode re-evaluates the
//! newest bar of the trailing window on a fixed polling period.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::data::{BarStore, StoreError};
use crate::detector::{AnalyzedBar, BarStatus, SwingDetector};
use crate::domain::{min_low, Bar, Order};
use crate::sim::{OrderSummary, Trader};

/// Dispatcher timing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Trailing lookback span; also the warmup buffer in historical mode.
    pub time_window_ms: i64,
    /// Bar interval; must divide the time window.
    pub interval_ms: i64,
    /// Live-mode polling period.
    pub poll_interval: Duration,
}

/// Everything a run hands to the result consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub analyzed: Vec<AnalyzedBar>,
    pub orders: Vec<Order>,
    pub summary: OrderSummary,
}

pub struct Dispatcher {
    store: BarStore,
    detector: SwingDetector,
    trader: Trader,
    config: EngineConfig,
}

impl Dispatcher {
    pub fn new(
        store: BarStore,
        detector: SwingDetector,
        trader: Trader,
        config: EngineConfig,
    ) -> Self {
        assert!(config.interval_ms > 0, "interval must be positive");
        assert!(
            config.time_window_ms > 0 && config.time_window_ms % config.interval_ms == 0,
            "time window must be a positive multiple of the interval"
        );
        Self {
            store,
            detector,
            trader,
            config,
        }
    }

    /// Bars in the trailing lookback window.
    fn lookback_len(&self) -> usize {
        (self.config.time_window_ms / self.config.interval_ms) as usize
    }

    /// Backtest `[start_ms, end_ms)`.
    ///
    /// Reconciles the range plus a leading lookback buffer in one call, then
    /// routes every bar past the buffer. Returns the classified bars, every
    /// order the run opened, and the aggregate summary.
    pub fn run_historical(&mut self, start_ms: i64, end_ms: i64) -> Result<RunReport, StoreError> {
        let window = self.config.time_window_ms;
        let bars = self.store.reconcile(start_ms - window, end_ms)?;
        let lookback = self.lookback_len();

        info!(
            symbol = %self.store.symbol(),
            bars = bars.len(),
            lookback,
            "historical run starting"
        );

        let mut analyzed = Vec::with_capacity(bars.len().saturating_sub(lookback));
        for index in lookback..bars.len() {
            analyzed.push(self.step(&bars, index));
        }

        let summary = self.trader.summary();
        info!(
            total = summary.total,
            positive = summary.positive,
            negative = summary.negative,
            net_profit = summary.net_profit,
            "order summary"
        );

        Ok(RunReport {
            analyzed,
            orders: self.trader.all_orders(),
            summary,
        })
    }

    /// Poll the trailing window and evaluate its newest bar until `stop` is
    /// observed at a tick boundary.
    ///
    /// A feed error only costs the tick — logged, retried on the next poll.
    /// Repository errors are local faults and abort the loop.
    pub fn run_live(&mut self, stop: &AtomicBool) -> Result<(), StoreError> {
        while !stop.load(Ordering::Relaxed) {
            let now_ms = Utc::now().timestamp_millis();
            match self.store.reconcile(now_ms - self.config.time_window_ms, now_ms) {
                Ok(bars) if bars.is_empty() => {
                    warn!(symbol = %self.store.symbol(), "no bars in the trailing window");
                }
                Ok(bars) => {
                    let record = self.step(&bars, bars.len() - 1);
                    if record.status != BarStatus::None {
                        info!(status = ?record.status, price = record.price, "bar classified");
                    }
                }
                Err(StoreError::Feed(e)) => {
                    warn!(error = %e, "feed error, retrying next tick");
                }
                Err(e) => return Err(e),
            }
            std::thread::sleep(self.config.poll_interval);
        }
        info!("stop observed, live loop exiting");
        Ok(())
    }

    /// Route one bar: to the simulator while an episode is active, else to
    /// the detector; a mid reentry opens the next episode and resets the
    /// swing state.
    fn step(&mut self, bars: &[Bar], index: usize) -> AnalyzedBar {
        let bar = &bars[index];

        if self.trader.has_active_episode() {
            self.trader.update(bar);
            return AnalyzedBar::passthrough(bar);
        }

        // Window minimum excludes the bar under evaluation; with nothing
        // before it, the bar's own low is the only reference available.
        let window_start = index.saturating_sub(self.lookback_len());
        let min_price = if index == 0 {
            bar.low
        } else {
            min_low(&bars[window_start..index])
        };
        let record = self.detector.evaluate(bar, min_price);

        match record.status {
            BarStatus::High => info!(time = record.time, price = record.price, "impulse high"),
            BarStatus::Low => info!(time = record.time, price = record.price, "retracement low"),
            BarStatus::Mid => {
                let high = self
                    .detector
                    .high_bar()
                    .expect("mid classification without a high bar")
                    .high;
                let low = self
                    .detector
                    .low_bar()
                    .expect("mid classification without a low bar")
                    .low;
                info!(time = record.time, high, low, "mid reentry, opening episode");
                self.trader.open_episode(high, low);
                self.detector.reset();
            }
            BarStatus::None => {}
        }

        record
    }
}
