//! # paysched core
//!
//! Business logic of the scheduled payment runner - no infrastructure
//! dependencies.
//!
//! This crate contains:
//! - Port interfaces (traits) for the provider, the system of record and
//!   credentials
//! - The resilient caller, item processor and fan-out dispatcher
//! - The scheduled job state machine
//!
//! ## Architecture Principles
//! - Only depends on `paysched-common` and `paysched-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits

pub mod dispatch;
pub mod job;

// Re-export specific items to avoid ambiguity
pub use dispatch::ports::{ChargeGateway, ReconciliationSink, SecretProvider};
pub use dispatch::{
    CallResult, CallerSettings, CancelSignal, FanOutDispatcher, ItemProcessor, ProcessorSettings,
    ResilientCaller,
};
pub use job::ports::{BatchSource, JobTrigger};
pub use job::{JobState, RunReport, ScheduledJob, SkipReason};
