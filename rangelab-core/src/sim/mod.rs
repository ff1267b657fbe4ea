//! Order lifecycle simulation.

pub mod trader;

pub use trader::{Episode, OrderSummary, Trader, TraderConfig};
