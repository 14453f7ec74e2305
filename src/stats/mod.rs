//! Engine statistics

pub mod metrics;

pub use metrics::{EngineMetrics, EngineStats};
