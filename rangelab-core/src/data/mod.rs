//! Data layer: remote feed, durable repository, and the reconciling store.

pub mod binance;
pub mod gaps;
pub mod parquet;
pub mod provider;
pub mod repository;
pub mod store;
pub mod synthetic;

#[cfg(test)]
pub(crate) mod testutil;

pub use binance::BinanceFeed;
pub use gaps::{missing_intervals, MissingInterval};
pub use parquet::ParquetRepository;
pub use provider::{BarFeed, FeedError};
pub use repository::{BarRepository, MemoryRepository, RepoError};
pub use store::{BarStore, StoreError};
pub use synthetic::SyntheticFeed;
