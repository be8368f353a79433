//! # paysched infrastructure
//!
//! Infrastructure implementations of the core ports.
//!
//! This crate contains:
//! - HTTP charge gateway (reqwest)
//! - Cron trigger (tokio-cron-scheduler)
//! - Configuration loader (file + environment)
//! - Secret providers (file, environment)
//! - JSON-file batch source and reconciliation ledgers
//! - Job metrics
//!
//! ## Architecture
//! - Implements traits defined in `paysched-core`
//! - Depends on `paysched-common`, `paysched-domain` and `paysched-core`
//! - Contains all "impure" code (I/O, network, timers)

pub mod config;
pub mod errors;
pub mod http;
pub mod observability;
pub mod pipeline;
pub mod scheduling;
pub mod secrets;
pub mod storage;

// Re-export commonly used items
pub use errors::InfraError;
pub use http::{HttpChargeGateway, HttpClient};
pub use observability::{JobMetrics, JobMetricsSnapshot};
pub use pipeline::{build_dispatcher, build_job, Adapters};
pub use scheduling::{CronScheduler, CronSchedulerConfig, SchedulerError};
pub use storage::{InMemoryLedger, JsonFileBatchSource, JsonlLedger};
