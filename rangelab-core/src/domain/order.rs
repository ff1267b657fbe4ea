//! Simulated order: lifecycle state machine and profit accounting.

use serde::{Deserialize, Serialize};

use super::bar::Bar;

/// Direction of a simulated position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSide {
    Long,
    Short,
}

/// Order lifecycle states.
///
/// `Closed` and `Canceled` are terminal. A canceled order never records a
/// close price and contributes zero profit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Open,
    Fulfilled,
    Closed,
    Canceled,
}

/// What a single evaluation step did to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderTransition {
    None,
    Fulfilled,
    Closed,
}

/// One simulated position with entry, stop-loss and take-profit levels.
///
/// Invariants: `close_price` is set iff `status == Closed`; `entry_time` is
/// set once the order has filled. Orders are only ever mutated by
/// [`Order::evaluate`], [`Order::cancel`], and a take-profit tighten from the
/// averaging rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub side: OrderSide,
    pub entry_price: f64,
    pub stop_price: f64,
    pub take_profit_price: f64,
    pub status: OrderStatus,
    pub entry_time: Option<i64>,
    pub close_time: Option<i64>,
    pub close_price: Option<f64>,
}

impl Order {
    pub fn new(side: OrderSide, entry_price: f64, stop_price: f64, take_profit_price: f64) -> Self {
        Self {
            side,
            entry_price,
            stop_price,
            take_profit_price,
            status: OrderStatus::Open,
            entry_time: None,
            close_time: None,
            close_price: None,
        }
    }

    /// Still Open or Fulfilled — the order keeps the episode active.
    pub fn is_working(&self) -> bool {
        matches!(self.status, OrderStatus::Open | OrderStatus::Fulfilled)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, OrderStatus::Closed | OrderStatus::Canceled)
    }

    /// Closed at the stop level. Exact comparison is sound: `close_price` is
    /// assigned from `stop_price` itself.
    pub fn closed_by_stop(&self) -> bool {
        self.status == OrderStatus::Closed && self.close_price == Some(self.stop_price)
    }

    /// Closed at the take-profit level.
    pub fn closed_by_take_profit(&self) -> bool {
        self.status == OrderStatus::Closed && self.close_price == Some(self.take_profit_price)
    }

    /// Advance the state machine against one bar.
    ///
    /// Open orders fill when the bar's range reaches the entry: a long fills
    /// on `low <= entry` (buy the dip), a short on `high >= entry`. Fulfilled
    /// orders race their two exits; when both bounds fall inside one bar the
    /// take-profit is honored first.
    pub fn evaluate(&mut self, bar: &Bar) -> OrderTransition {
        match self.status {
            OrderStatus::Open => {
                let filled = match self.side {
                    OrderSide::Long => bar.low <= self.entry_price,
                    OrderSide::Short => bar.high >= self.entry_price,
                };
                if filled {
                    self.status = OrderStatus::Fulfilled;
                    self.entry_time = Some(bar.close_time);
                    return OrderTransition::Fulfilled;
                }
                OrderTransition::None
            }
            OrderStatus::Fulfilled => {
                let exit = match self.side {
                    OrderSide::Short => {
                        if bar.low <= self.take_profit_price {
                            Some(self.take_profit_price)
                        } else if bar.high >= self.stop_price {
                            Some(self.stop_price)
                        } else {
                            None
                        }
                    }
                    OrderSide::Long => {
                        if bar.high >= self.take_profit_price {
                            Some(self.take_profit_price)
                        } else if bar.low <= self.stop_price {
                            Some(self.stop_price)
                        } else {
                            None
                        }
                    }
                };
                if let Some(price) = exit {
                    self.status = OrderStatus::Closed;
                    self.close_price = Some(price);
                    self.close_time = Some(bar.close_time);
                    return OrderTransition::Closed;
                }
                OrderTransition::None
            }
            OrderStatus::Closed | OrderStatus::Canceled => OrderTransition::None,
        }
    }

    /// Cancel a non-terminal order. Keeps `close_price` unset.
    pub fn cancel(&mut self) {
        debug_assert!(!self.is_terminal(), "cancel on a terminal order");
        self.status = OrderStatus::Canceled;
        self.close_time = None;
        self.close_price = None;
    }

    /// Realized profit in quote units for a position of `unit_size`.
    ///
    /// Longs earn `(close − entry) / entry`; shorts sell at the entry and
    /// buy back at the close, so they earn `(entry − close) / close`.
    /// Open and canceled orders contribute zero.
    pub fn profit(&self, unit_size: f64) -> f64 {
        let Some(close_price) = self.close_price else {
            return 0.0;
        };
        match self.side {
            OrderSide::Long => (close_price - self.entry_price) / self.entry_price * unit_size,
            OrderSide::Short => (self.entry_price - close_price) / close_price * unit_size,
        }
    }
}
