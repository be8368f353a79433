//! Time utilities
//!
//! - **[`cron`]**: cadence parsing and conversion to the scheduler's
//!   six-field form

pub mod cron;

pub use cron::{CronExpression, CronParseError};
