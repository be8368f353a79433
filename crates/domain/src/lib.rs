//! # paysched domain
//!
//! Business types for the scheduled payment runner.
//!
//! This crate contains:
//! - Work items, charge requests and call outcomes
//! - Batch aggregation and per-item reports
//! - The provider response classification table
//! - Job configuration structures and validation
//! - Domain error types and Result definitions
//!
//! ## Architecture
//! - No dependencies on other paysched crates
//! - Only external dependencies allowed
//! - Pure data and validation, no I/O

pub mod classification;
pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use classification::{ClassificationTable, StatusRule};
pub use config::{
    BreakerSettings, JobConfig, ProviderSettings, RetrySettings, SecretSource, StorageSettings,
};
pub use errors::{PaySchedError, Result};
pub use types::*;
