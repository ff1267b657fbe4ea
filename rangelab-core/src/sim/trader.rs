//! Order simulator: paired orders over a detected sideways range.
//!
//! When the dispatcher confirms a mid-level reentry it hands the episode's
//! `(high, low)` range here. The simulator derives entry/stop/take-profit
//! levels for a short above the range and a long below it, places a more
//! aggressive averaging pair inside the legs, and then advances every order
//! bar by bar until the episode exhausts itself.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::{Bar, Order, OrderSide, OrderStatus, OrderTransition};

/// Simulator parameters.
///
/// `deviation_factor` scales with the range: the working deviation for an
/// episode is `deviation_factor × sideway_height`. `unit_size` is the quote
/// amount notionally committed per order, used only for profit accounting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraderConfig {
    pub deviation_factor: f64,
    pub unit_size: f64,
}

/// Price levels derived once from an episode's `(high, low)` pair.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Levels {
    short_entry: f64,
    short_stop: f64,
    short_take_profit: f64,
    long_entry: f64,
    long_stop: f64,
    long_take_profit: f64,
    short_avg_entry: f64,
    short_avg_take_profit: f64,
    long_avg_entry: f64,
    long_avg_take_profit: f64,
}

impl Levels {
    fn derive(high: f64, low: f64, deviation_factor: f64) -> Self {
        let sideway_height = high / low - 1.0;
        let deviation = deviation_factor * sideway_height;
        let mid = (high * low).sqrt();
        Self {
            short_entry: high * (1.0 + deviation),
            short_stop: high * (1.0 + sideway_height + deviation),
            short_take_profit: mid + deviation,
            long_entry: low * (1.0 - deviation),
            long_stop: low * (1.0 - sideway_height - deviation),
            long_take_profit: mid - deviation,
            short_avg_entry: high * (1.0 + sideway_height / 2.0 + deviation),
            short_avg_take_profit: high * (1.0 + deviation),
            long_avg_entry: low * (1.0 - sideway_height / 2.0 - deviation),
            long_avg_take_profit: low * (1.0 - deviation),
        }
    }
}

/// One detected swing's trading window: its range and every order opened
/// inside it, in placement order.
#[derive(Debug, Clone)]
pub struct Episode {
    pub high: f64,
    pub low: f64,
    pub orders: Vec<Order>,
    levels: Levels,
    // Placement indices of the averaging pair, so their fulfillment can be
    // recognized without searching.
    short_avg_idx: usize,
    long_avg_idx: usize,
    short_avg_applied: bool,
    long_avg_applied: bool,
}

impl Episode {
    fn new(high: f64, low: f64, deviation_factor: f64) -> Self {
        let levels = Levels::derive(high, low, deviation_factor);
        let orders = vec![
            Order::new(
                OrderSide::Short,
                levels.short_entry,
                levels.short_stop,
                levels.short_take_profit,
            ),
            Order::new(
                OrderSide::Long,
                levels.long_entry,
                levels.long_stop,
                levels.long_take_profit,
            ),
            // Averaging pair: half the range inside the legs, original stop.
            Order::new(
                OrderSide::Short,
                levels.short_avg_entry,
                levels.short_stop,
                levels.short_avg_take_profit,
            ),
            Order::new(
                OrderSide::Long,
                levels.long_avg_entry,
                levels.long_stop,
                levels.long_avg_take_profit,
            ),
        ];
        Self {
            high,
            low,
            orders,
            levels,
            short_avg_idx: 2,
            long_avg_idx: 3,
            short_avg_applied: false,
            long_avg_applied: false,
        }
    }

    /// An episode stays active while any order can still fill or exit.
    pub fn is_active(&self) -> bool {
        self.orders.iter().any(Order::is_working)
    }

    fn closed_count(&self) -> usize {
        self.orders
            .iter()
            .filter(|o| o.status == OrderStatus::Closed)
            .count()
    }

    fn working_count(&self) -> usize {
        self.orders.iter().filter(|o| o.is_working()).count()
    }
}

/// Aggregate order statistics, recomputed on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub total: usize,
    pub positive: usize,
    pub negative: usize,
    pub net_profit: f64,
}

/// The order simulator. Owns every episode opened during a run.
#[derive(Debug, Clone)]
pub struct Trader {
    config: TraderConfig,
    episodes: Vec<Episode>,
}

impl Trader {
    pub fn new(config: TraderConfig) -> Self {
        Self {
            config,
            episodes: Vec::new(),
        }
    }

    pub fn episodes(&self) -> &[Episode] {
        &self.episodes
    }

    /// Any Open or Fulfilled order in the latest episode keeps it active —
    /// and blocks the detector from opening another.
    pub fn has_active_episode(&self) -> bool {
        self.episodes.last().is_some_and(Episode::is_active)
    }

    /// Open a new episode from a detected range: the entry pair plus the
    /// averaging pair, all Open.
    pub fn open_episode(&mut self, high: f64, low: f64) {
        assert!(
            !self.has_active_episode(),
            "episode opened while another is active"
        );
        let episode = Episode::new(high, low, self.config.deviation_factor);
        for order in &episode.orders {
            info!(
                side = ?order.side,
                entry = order.entry_price,
                stop = order.stop_price,
                take_profit = order.take_profit_price,
                "order placed"
            );
        }
        info!(high, low, "sideway episode opened");
        self.episodes.push(episode);
    }

    /// Advance the active episode against one bar.
    ///
    /// Rule order: evaluate fills/exits, apply averaging fulfillment
    /// effects, top the pair back up via re-entry, then sweep-cancel once
    /// the episode is decided (a stop hit, or two orders closed).
    pub fn update(&mut self, bar: &Bar) {
        let unit_size = self.config.unit_size;
        let Some(ep) = self.episodes.last_mut() else {
            return;
        };

        for order in &mut ep.orders {
            match order.evaluate(bar) {
                OrderTransition::Fulfilled => info!(
                    side = ?order.side,
                    entry = order.entry_price,
                    time = bar.close_time,
                    "order fulfilled"
                ),
                OrderTransition::Closed => info!(
                    side = ?order.side,
                    close_price = order.close_price,
                    profit = order.profit(unit_size),
                    time = bar.close_time,
                    "order closed"
                ),
                OrderTransition::None => {}
            }
        }

        Self::apply_averaging_effects(ep);
        Self::apply_reentry(ep);
        Self::apply_cancellation(ep);
    }

    /// When an averaging order fills, its side stops aiming for the range
    /// middle: the side's first working order gets the tightened take-profit
    /// and the opposing side is canceled outright.
    fn apply_averaging_effects(ep: &mut Episode) {
        if !ep.short_avg_applied && ep.orders[ep.short_avg_idx].status == OrderStatus::Fulfilled {
            ep.short_avg_applied = true;
            let tp = ep.levels.short_avg_take_profit;
            Self::tighten_and_cancel_opposing(ep, OrderSide::Short, tp);
        }
        if !ep.long_avg_applied && ep.orders[ep.long_avg_idx].status == OrderStatus::Fulfilled {
            ep.long_avg_applied = true;
            let tp = ep.levels.long_avg_take_profit;
            Self::tighten_and_cancel_opposing(ep, OrderSide::Long, tp);
        }
    }

    fn tighten_and_cancel_opposing(ep: &mut Episode, side: OrderSide, take_profit: f64) {
        if let Some(order) = ep
            .orders
            .iter_mut()
            .find(|o| o.side == side && o.is_working())
        {
            order.take_profit_price = take_profit;
            info!(side = ?side, take_profit, "averaging filled, take-profit tightened");
        }
        for order in ep
            .orders
            .iter_mut()
            .filter(|o| o.side != side && o.is_working())
        {
            order.cancel();
            info!(side = ?order.side, entry = order.entry_price, "order canceled");
        }
    }

    /// An order that exited at its take-profit is replaced by a fresh one of
    /// the same side at the original entry-pair levels, while the episode
    /// has fewer than two closed and fewer than two working orders.
    fn apply_reentry(ep: &mut Episode) {
        let mut i = 0;
        while i < ep.orders.len() {
            if ep.orders[i].closed_by_take_profit()
                && ep.closed_count() < 2
                && ep.working_count() < 2
            {
                let side = ep.orders[i].side;
                let order = match side {
                    OrderSide::Short => Order::new(
                        side,
                        ep.levels.short_entry,
                        ep.levels.short_stop,
                        ep.levels.short_take_profit,
                    ),
                    OrderSide::Long => Order::new(
                        side,
                        ep.levels.long_entry,
                        ep.levels.long_stop,
                        ep.levels.long_take_profit,
                    ),
                };
                info!(side = ?side, entry = order.entry_price, "re-entry order placed");
                ep.orders.push(order);
            }
            i += 1;
        }
    }

    /// Once an order closed at its stop, or two orders closed, the episode
    /// is decided: everything still working is canceled.
    fn apply_cancellation(ep: &mut Episode) {
        let stop_hit = ep.orders.iter().any(Order::closed_by_stop);
        if !stop_hit && ep.closed_count() < 2 {
            return;
        }
        for order in ep.orders.iter_mut().filter(|o| o.is_working()) {
            order.cancel();
            info!(side = ?order.side, entry = order.entry_price, "order canceled");
        }
    }

    /// Every order of every episode, in placement order.
    pub fn all_orders(&self) -> Vec<Order> {
        self.episodes
            .iter()
            .flat_map(|ep| ep.orders.iter().cloned())
            .collect()
    }

    /// Aggregate statistics over all episodes, recomputed on demand.
    pub fn summary(&self) -> OrderSummary {
        let mut summary = OrderSummary {
            total: 0,
            positive: 0,
            negative: 0,
            net_profit: 0.0,
        };
        for ep in &self.episodes {
            for order in &ep.orders {
                summary.total += 1;
                let profit = order.profit(self.config.unit_size);
                if profit > 0.0 {
                    summary.positive += 1;
                } else if profit < 0.0 {
                    summary.negative += 1;
                }
                summary.net_profit += profit;
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // deviation_factor 0.25 over a 120/100 range gives deviation 0.05, the
    // worked numbers used throughout these tests.
    fn trader() -> Trader {
        Trader::new(TraderConfig {
            deviation_factor: 0.25,
            unit_size: 1000.0,
        })
    }

    fn bar(low: f64, high: f64, close_time: i64) -> Bar {
        Bar {
            open_time: close_time - 59_999,
            open: (low + high) / 2.0,
            high,
            low,
            close: (low + high) / 2.0,
            volume: 1.0,
            close_time,
            quote_volume: 0.0,
            trade_count: 0,
            taker_buy_base_volume: 0.0,
            taker_buy_quote_volume: 0.0,
        }
    }

    fn sqrt_mid() -> f64 {
        (120.0_f64 * 100.0).sqrt()
    }

    #[test]
    fn episode_levels_match_the_range() {
        let mut trader = trader();
        trader.open_episode(120.0, 100.0);

        let orders = trader.all_orders();
        assert_eq!(orders.len(), 4);

        let short = &orders[0];
        assert_eq!(short.side, OrderSide::Short);
        assert!((short.entry_price - 126.0).abs() < 1e-9);
        assert!((short.stop_price - 150.0).abs() < 1e-9);
        assert!((short.take_profit_price - (sqrt_mid() + 0.05)).abs() < 1e-9);

        let long = &orders[1];
        assert_eq!(long.side, OrderSide::Long);
        assert!((long.entry_price - 95.0).abs() < 1e-9);
        assert!((long.stop_price - 75.0).abs() < 1e-9);
        assert!((long.take_profit_price - (sqrt_mid() - 0.05)).abs() < 1e-9);

        assert!(orders.iter().all(|o| o.status == OrderStatus::Open));
    }

    #[test]
    fn averaging_pair_sits_inside_the_legs_with_inherited_stops() {
        let mut trader = trader();
        trader.open_episode(120.0, 100.0);
        let orders = trader.all_orders();

        let avg_short = &orders[2];
        assert_eq!(avg_short.side, OrderSide::Short);
        assert!((avg_short.entry_price - 138.0).abs() < 1e-9); // 120 × 1.15
        assert!((avg_short.stop_price - 150.0).abs() < 1e-9);
        assert!((avg_short.take_profit_price - 126.0).abs() < 1e-9);

        let avg_long = &orders[3];
        assert_eq!(avg_long.side, OrderSide::Long);
        assert!((avg_long.entry_price - 85.0).abs() < 1e-9); // 100 × 0.85
        assert!((avg_long.stop_price - 75.0).abs() < 1e-9);
        assert!((avg_long.take_profit_price - 95.0).abs() < 1e-9);
    }

    #[test]
    fn long_fills_then_closes_at_take_profit() {
        let mut trader = trader();
        trader.open_episode(120.0, 100.0);

        trader.update(&bar(90.0, 95.0, 1_000));
        let orders = trader.all_orders();
        assert_eq!(orders[1].status, OrderStatus::Fulfilled);
        assert_eq!(orders[1].entry_time, Some(1_000));
        // The short legs stay untouched below their entries.
        assert_eq!(orders[0].status, OrderStatus::Open);
        assert_eq!(orders[2].status, OrderStatus::Open);

        trader.update(&bar(105.0, 110.0, 2_000));
        let orders = trader.all_orders();
        assert_eq!(orders[1].status, OrderStatus::Closed);
        assert!((orders[1].close_price.unwrap() - (sqrt_mid() - 0.05)).abs() < 1e-9);
        assert!(orders[1].closed_by_take_profit());
        assert!(orders[1].profit(1000.0) > 0.0);
    }

    #[test]
    fn stop_close_cancels_every_remaining_order() {
        let mut trader = trader();
        trader.open_episode(120.0, 100.0);

        // Short fills at 126, then a spike to 150 stops it out. The spike
        // also fills the averaging short on the way up.
        trader.update(&bar(120.0, 126.0, 1_000));
        trader.update(&bar(125.0, 150.0, 2_000));

        let orders = trader.all_orders();
        assert!(orders[0].closed_by_stop());
        assert!(orders[0].profit(1000.0) < 0.0);

        // The sibling long never filled: canceled, no close price, zero
        // profit. Everything else working got swept too.
        assert_eq!(orders[1].status, OrderStatus::Canceled);
        assert_eq!(orders[1].close_price, None);
        assert_eq!(orders[1].profit(1000.0), 0.0);
        assert!(!trader.has_active_episode());
    }

    #[test]
    fn averaging_fill_tightens_take_profit_and_cancels_opposing_side() {
        let mut trader = trader();
        trader.open_episode(120.0, 100.0);

        // Entry short fills.
        trader.update(&bar(120.0, 126.0, 1_000));
        // Averaging short fills at 138; stop (150) not reached.
        trader.update(&bar(125.0, 140.0, 2_000));

        let orders = trader.all_orders();
        assert_eq!(orders[2].status, OrderStatus::Fulfilled);
        // Entry short's take-profit tightened to 126.
        assert!((orders[0].take_profit_price - 126.0).abs() < 1e-9);
        // Both longs canceled.
        assert_eq!(orders[1].status, OrderStatus::Canceled);
        assert_eq!(orders[3].status, OrderStatus::Canceled);

        // Pullback to the tightened level closes both shorts.
        trader.update(&bar(124.0, 130.0, 3_000));
        let orders = trader.all_orders();
        assert_eq!(orders[0].status, OrderStatus::Closed);
        assert!((orders[0].close_price.unwrap() - 126.0).abs() < 1e-9);
        assert!(!trader.has_active_episode());
    }

    #[test]
    fn reentry_tops_the_pair_back_up() {
        let mut trader = trader();
        trader.open_episode(120.0, 100.0);

        // Long fills, then exits at its take-profit.
        trader.update(&bar(94.0, 95.0, 1_000));
        trader.update(&bar(100.0, 110.0, 2_000));
        assert_eq!(trader.all_orders()[1].status, OrderStatus::Closed);

        // Averaging long fills; the shorts get canceled by the averaging
        // rule, leaving one working order and one take-profit close — the
        // re-entry conditions.
        trader.update(&bar(84.0, 90.0, 3_000));

        let orders = trader.all_orders();
        assert_eq!(orders.len(), 5);
        let reentry = &orders[4];
        assert_eq!(reentry.side, OrderSide::Long);
        assert_eq!(reentry.status, OrderStatus::Open);
        assert!((reentry.entry_price - 95.0).abs() < 1e-9);
        assert!((reentry.stop_price - 75.0).abs() < 1e-9);
        assert!(trader.has_active_episode());
    }

    #[test]
    fn two_closed_orders_end_the_episode() {
        let mut trader = trader();
        trader.open_episode(120.0, 100.0);

        // Fill long and averaging long together; averaging cancels shorts
        // and tightens the long take-profit to 95.
        trader.update(&bar(84.0, 90.0, 1_000));
        // One bar through 95 closes both longs at their (tightened) targets.
        trader.update(&bar(94.0, 96.0, 2_000));

        let orders = trader.all_orders();
        assert_eq!(
            orders
                .iter()
                .filter(|o| o.status == OrderStatus::Closed)
                .count(),
            2
        );
        assert!(!trader.has_active_episode());
    }

    #[test]
    fn summary_counts_and_net_profit() {
        let mut trader = trader();
        trader.open_episode(120.0, 100.0);
        trader.update(&bar(90.0, 95.0, 1_000));
        trader.update(&bar(105.0, 110.0, 2_000));

        let summary = trader.summary();
        assert_eq!(summary.total, 4);
        assert_eq!(summary.positive, 1);
        assert_eq!(summary.negative, 0);
        let expected = (sqrt_mid() - 0.05 - 95.0) / 95.0 * 1000.0;
        assert!((summary.net_profit - expected).abs() < 1e-9);
    }

    #[test]
    fn no_active_episode_before_any_mid() {
        let trader = trader();
        assert!(!trader.has_active_episode());
        assert!(trader.all_orders().is_empty());
        assert_eq!(trader.summary().total, 0);
    }

    #[test]
    #[should_panic(expected = "episode opened while another is active")]
    fn opening_a_second_active_episode_panics() {
        let mut trader = trader();
        trader.open_episode(120.0, 100.0);
        trader.open_episode(130.0, 110.0);
    }

    #[test]
    fn update_without_episode_is_a_no_op() {
        let mut trader = trader();
        trader.update(&bar(90.0, 95.0, 1_000));
        assert!(trader.all_orders().is_empty());
    }
}
