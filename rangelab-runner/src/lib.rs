//! RangeLab Runner — run configuration, wiring, and artifact export.

pub mod config;
pub mod export;
pub mod runner;

pub use config::{ConfigError, FeedKind, RunConfig, RunMode};
pub use export::{load_manifest, save_artifacts, RunManifest, SCHEMA_VERSION};
pub use runner::{
    build_dispatcher, build_store, run_historical, run_live, store_coverage, sync_range,
    RunError, RunOutcome,
};
