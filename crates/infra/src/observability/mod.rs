//! Observability infrastructure
//!
//! Metrics are plain atomics read through snapshots and reported through
//! `tracing`; there is no exporter.

pub mod metrics;

pub use metrics::{JobMetrics, JobMetricsSnapshot};
