//! Driver metrics collection

mod collector;

pub use collector::{MetricsCollector, MetricsSnapshot};
