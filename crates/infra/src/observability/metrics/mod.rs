//! Metrics collection modules
//!
//! Thread-safe counters for the scheduled job.

pub mod job;

pub use job::{JobMetrics, JobMetricsSnapshot};
