//! Modular common utilities shared across paysched crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: cron parsing and other side-effect free helpers
//! - `runtime`: async infrastructure (circuit breaker, retry, bulkhead)
//! - `observability`: tracing integration (pulled in by `runtime`)
//! - `test-utils`: async assertions used by downstream test suites

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod time;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod resilience;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "test-utils", test))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "runtime")]
pub use resilience::{
    Admission, BackoffStrategy, Breaker, Bulkhead, BulkheadConfig, BulkheadError, BulkheadMetrics,
    BulkheadPermit, CallPermit, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics,
    CircuitBreakerRegistry, CircuitState, Clock, ConfigError, Jitter, MockClock,
    ResilienceError, RetryConfig, RetryDecision, RetryError, RetryExecutor, RetryOutcome,
    RetryPolicy, SystemClock,
};
#[cfg(feature = "foundation")]
pub use time::cron::{CronExpression, CronParseError};
