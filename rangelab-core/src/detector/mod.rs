//! Swing pattern detection.

pub mod swing;

pub use swing::{AnalyzedBar, BarStatus, DetectorConfig, SwingDetector, SwingState};
