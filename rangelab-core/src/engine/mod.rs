//! Run orchestration.

pub mod dispatcher;

pub use dispatcher::{Dispatcher, EngineConfig, RunReport};
