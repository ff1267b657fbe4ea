//! Swing detector: impulse high, retracement low, mid-level reentry.
//!
//! The detector walks bars in time order and looks for a three-phase swing:
//! a bar whose high has grown enough over the trailing-window minimum
//! (impulse high), a later bar that has dropped enough from that high
//! (retracement low), and finally a bar whose high climbs back to a mid
//! level derived from the two. Pure computation — the caller supplies the
//! trailing-window minimum and owns the lookback buffer.

use serde::{Deserialize, Serialize};

use crate::domain::Bar;

/// Detector thresholds.
///
/// `growth_threshold_pct` and `drop_threshold_pct` are percentages (10.0 =
/// 10%). `deviation` is the small fraction that biases the mid level below
/// the geometric midpoint of the range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub growth_threshold_pct: f64,
    pub drop_threshold_pct: f64,
    pub deviation: f64,
}

/// Classification of a single bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarStatus {
    None,
    High,
    Low,
    Mid,
}

/// Per-bar classification record for the result consumer.
///
/// `price` is the coordinate a plot would use: the bar's high for
/// high/mid, its low for low, its close otherwise. The derived percentages
/// are present only on the classification that computed them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedBar {
    pub time: i64,
    pub price: f64,
    pub status: BarStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub growth_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drop_pct: Option<f64>,
}

impl AnalyzedBar {
    /// Record for a bar routed past the detector (episode active).
    pub fn passthrough(bar: &Bar) -> Self {
        Self {
            time: bar.close_time,
            price: bar.close,
            status: BarStatus::None,
            growth_pct: None,
            drop_pct: None,
        }
    }
}

/// Detector state: the current impulse high, retracement low, and the mid
/// price derived from them.
///
/// `low_bar` is only ever set while `high_bar` is; `mid_price` is set iff
/// both bars are. [`SwingDetector::reset`] clears all three together.
#[derive(Debug, Clone, Default)]
pub struct SwingState {
    pub high_bar: Option<Bar>,
    pub low_bar: Option<Bar>,
    pub mid_price: Option<f64>,
}

/// The swing state machine.
#[derive(Debug, Clone)]
pub struct SwingDetector {
    config: DetectorConfig,
    state: SwingState,
}

impl SwingDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            state: SwingState::default(),
        }
    }

    pub fn high_bar(&self) -> Option<&Bar> {
        self.state.high_bar.as_ref()
    }

    pub fn low_bar(&self) -> Option<&Bar> {
        self.state.low_bar.as_ref()
    }

    pub fn mid_price(&self) -> Option<f64> {
        self.state.mid_price
    }

    /// Clear the whole swing state. Called by the dispatcher once a mid
    /// reentry has been consumed to open a trading episode.
    pub fn reset(&mut self) {
        self.state = SwingState::default();
    }

    /// Classify one bar. `min_price` is the minimum low over the trailing
    /// lookback window, excluding `bar` itself; supplying it is the caller's
    /// contract (positive, from an interval-ordered window).
    ///
    /// Exactly one classification comes out per bar; the checks are mutually
    /// exclusive in high → low → mid order.
    pub fn evaluate(&mut self, bar: &Bar, min_price: f64) -> AnalyzedBar {
        if let (true, growth_pct) = self.is_new_high(bar, min_price) {
            self.state.high_bar = Some(bar.clone());
            return AnalyzedBar {
                time: bar.close_time,
                price: bar.high,
                status: BarStatus::High,
                growth_pct,
                drop_pct: None,
            };
        }

        if let (true, drop_pct) = self.is_new_low(bar) {
            self.state.low_bar = Some(bar.clone());
            self.state.mid_price = Some(self.middle_price());
            return AnalyzedBar {
                time: bar.close_time,
                price: bar.low,
                status: BarStatus::Low,
                growth_pct: None,
                drop_pct,
            };
        }

        if self.is_mid_reentry(bar) {
            return AnalyzedBar {
                time: bar.close_time,
                price: bar.high,
                status: BarStatus::Mid,
                growth_pct: None,
                drop_pct: None,
            };
        }

        AnalyzedBar {
            time: bar.close_time,
            price: bar.close,
            status: BarStatus::None,
            growth_pct: None,
            drop_pct: None,
        }
    }

    fn is_highest(&self, bar: &Bar) -> bool {
        self.state
            .high_bar
            .as_ref()
            .map_or(true, |hb| hb.high < bar.high)
    }

    fn is_lowest(&self, bar: &Bar) -> bool {
        self.state
            .low_bar
            .as_ref()
            .map_or(true, |lb| lb.low > bar.low)
    }

    /// A strictly higher peak supersedes the current one while no
    /// retracement has been confirmed; otherwise a bar qualifies by growing
    /// enough over the window minimum.
    fn is_new_high(&self, bar: &Bar, min_price: f64) -> (bool, Option<f64>) {
        if self.state.high_bar.is_some() && self.state.low_bar.is_none() && self.is_highest(bar) {
            return (true, None);
        }

        let growth_pct = (bar.high - min_price) / min_price * 100.0;
        if growth_pct >= self.config.growth_threshold_pct && self.is_highest(bar) {
            return (true, Some(growth_pct));
        }
        (false, None)
    }

    fn is_new_low(&self, bar: &Bar) -> (bool, Option<f64>) {
        let Some(high_bar) = &self.state.high_bar else {
            return (false, None);
        };
        let drop_pct = (high_bar.high - bar.low) / high_bar.high * 100.0;
        let qualifies = drop_pct >= self.config.drop_threshold_pct && self.is_lowest(bar);
        (qualifies, qualifies.then_some(drop_pct))
    }

    fn is_mid_reentry(&self, bar: &Bar) -> bool {
        if self.state.high_bar.is_none() || self.state.low_bar.is_none() {
            return false;
        }
        let mid_price = self
            .state
            .mid_price
            .expect("mid_price must be set when both swing bars are");
        bar.high >= mid_price
    }

    /// Mid level: `low × (1 + sideway_height × (0.5 − deviation))`, slightly
    /// below the midpoint of the detected range.
    fn middle_price(&self) -> f64 {
        let high = self
            .state
            .high_bar
            .as_ref()
            .expect("middle_price without a high bar")
            .high;
        let low = self
            .state
            .low_bar
            .as_ref()
            .expect("middle_price without a low bar")
            .low;
        let sideway_height = high / low - 1.0;
        low * (1.0 + sideway_height * (0.5 - self.config.deviation))
    }
}
