//! Scheduling infrastructure for the payment job
//!
//! A cron-based [`JobTrigger`](paysched_core::JobTrigger) that fires a
//! [`ScheduledJob`](paysched_core::ScheduledJob) on its cadence.
//!
//! Runtime rules:
//! - Explicit lifecycle management (start/stop)
//! - Cancellation token handed to every round
//! - Timeout wrapping on start, stop and settle

pub mod cadence;
pub mod cron_scheduler;
pub mod error;

pub use cadence::scheduler_expression;
pub use cron_scheduler::{CronScheduler, CronSchedulerConfig};
pub use error::{SchedulerError, SchedulerResult};
