//! Property tests for reconciliation, gap coalescing, detection, and fills.

use std::collections::BTreeSet;

use proptest::prelude::*;

use rangelab_core::data::{
    missing_intervals, BarFeed, BarRepository, BarStore, FeedError, MemoryRepository,
};
use rangelab_core::detector::{BarStatus, DetectorConfig, SwingDetector};
use rangelab_core::domain::{Bar, Order, OrderSide, OrderStatus};

const STEP: i64 = 60_000;

fn bar_on_grid(index: i64, low: f64, high: f64) -> Bar {
    let open_time = index * STEP;
    let close = (low + high) / 2.0;
    Bar {
        open_time,
        open: close,
        high,
        low,
        close,
        volume: 1.0,
        close_time: open_time + STEP - 1,
        quote_volume: 0.0,
        trade_count: 0,
        taker_buy_base_volume: 0.0,
        taker_buy_quote_volume: 0.0,
    }
}

/// Feed over a complete grid of `count` bars starting at index 0.
struct GridFeed {
    count: i64,
}

impl BarFeed for GridFeed {
    fn name(&self) -> &str {
        "grid"
    }

    fn fetch(
        &self,
        _symbol: &str,
        start_ms: i64,
        end_ms: i64,
        limit: usize,
    ) -> Result<Vec<Bar>, FeedError> {
        Ok((0..self.count)
            .map(|i| bar_on_grid(i, 99.0, 101.0))
            .filter(|b| b.open_time >= start_ms && b.open_time <= end_ms)
            .take(limit)
            .collect())
    }
}

proptest! {
    /// Whatever subset of the grid is already stored, reconcile returns the
    /// exact expected arithmetic progression with no duplicates — and a
    /// second call agrees.
    #[test]
    fn reconcile_yields_the_expected_grid(
        count in 1i64..60,
        seeded_mask in prop::collection::vec(any::<bool>(), 60),
        page_limit in 1usize..20,
    ) {
        let repo = MemoryRepository::new();
        let seeded: Vec<Bar> = (0..count)
            .filter(|i| seeded_mask[*i as usize])
            .map(|i| bar_on_grid(i, 99.0, 101.0))
            .collect();
        repo.insert_many("BTCUSDT", &seeded).unwrap();

        let store = BarStore::new(
            Box::new(GridFeed { count }),
            Box::new(repo),
            "BTCUSDT",
            STEP,
            page_limit,
        );

        let first = store.reconcile(0, count * STEP).unwrap();
        let keys: Vec<i64> = first.iter().map(|b| b.open_time).collect();
        let expected: Vec<i64> = (0..count).map(|i| i * STEP).collect();
        prop_assert_eq!(&keys, &expected);

        let second = store.reconcile(0, count * STEP).unwrap();
        prop_assert_eq!(first, second);
    }

    /// Coalesced missing intervals cover exactly the missing grid points,
    /// and consecutive intervals are separated by more than one step.
    #[test]
    fn missing_intervals_cover_exactly_the_holes(
        count in 1i64..80,
        present_mask in prop::collection::vec(any::<bool>(), 80),
    ) {
        let present: BTreeSet<i64> = (0..count)
            .filter(|i| present_mask[*i as usize])
            .map(|i| i * STEP)
            .collect();

        let gaps = missing_intervals(0, count * STEP, STEP, &present);

        // Every interval is well-formed and grid-aligned.
        for gap in &gaps {
            prop_assert!(gap.start <= gap.end);
            prop_assert_eq!(gap.start % STEP, 0);
            prop_assert_eq!(gap.end % STEP, 0);
        }
        // Consecutive intervals never touch (they would have coalesced).
        for pair in gaps.windows(2) {
            prop_assert!(pair[1].start > pair[0].end + STEP);
        }
        // The union of intervals is exactly the set of missing grid points.
        let mut covered = BTreeSet::new();
        for gap in &gaps {
            let mut t = gap.start;
            while t <= gap.end {
                covered.insert(t);
                t += STEP;
            }
        }
        let missing: BTreeSet<i64> =
            (0..count).map(|i| i * STEP).filter(|t| !present.contains(t)).collect();
        prop_assert_eq!(covered, missing);
    }

    /// With the drop threshold out of reach a retracement low can never be
    /// confirmed, and without one the detector must never classify Mid.
    #[test]
    fn mid_is_unreachable_with_only_a_high(
        bars in prop::collection::vec((90.0f64..110.0, 0.0f64..15.0), 1..120),
    ) {
        let mut detector = SwingDetector::new(DetectorConfig {
            growth_threshold_pct: 5.0,
            drop_threshold_pct: 1e9,
            deviation: 0.05,
        });

        for (i, (low, span)) in bars.iter().enumerate() {
            let bar = bar_on_grid(i as i64, *low, low + span);
            let status = detector.evaluate(&bar, 90.0).status;
            prop_assert_ne!(status, BarStatus::Mid);
            prop_assert!(detector.low_bar().is_none());
        }
    }

    /// A long order fills exactly on the first bar whose low touches the
    /// entry, never earlier.
    #[test]
    fn long_fill_is_monotonic_in_the_entry(
        lows in prop::collection::vec(90.0f64..110.0, 1..60),
    ) {
        let mut order = Order::new(OrderSide::Long, 100.0, 10.0, 1e9);
        let first_touch = lows.iter().position(|l| *l <= 100.0);

        for (i, low) in lows.iter().enumerate() {
            let bar = bar_on_grid(i as i64, *low, low + 50.0);
            order.evaluate(&bar);
            match first_touch {
                Some(t) if i >= t => {
                    prop_assert!(order.status != OrderStatus::Open);
                    prop_assert_eq!(order.entry_time, Some(t as i64 * STEP + STEP - 1));
                }
                _ => prop_assert_eq!(order.status, OrderStatus::Open),
            }
        }
    }
}
