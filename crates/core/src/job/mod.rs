//! Scheduled job: fetch a batch on each trigger and dispatch it

pub mod ports;
pub mod scheduled_job;

pub use scheduled_job::{JobState, RunReport, ScheduledJob, SkipReason};
