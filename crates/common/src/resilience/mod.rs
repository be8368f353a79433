//! Resilience patterns for fault tolerance around outbound calls
//!
//! This module provides **generic, reusable** building blocks:
//! - **Circuit Breaker**: stops calling an endpoint after repeated failures
//!   and admits a single probe once the cooldown has elapsed
//! - **Retry Logic**: configurable backoff with jitter, driven by a policy
//!   that decides which failures are worth another attempt
//! - **Bulkhead**: caps the number of concurrently executing operations with
//!   FIFO, cancellable admission
//!
//! None of these types know anything about payments. The charge pipeline in
//! `paysched-core` composes them into a resilient caller.

pub mod bulkhead;
pub mod circuit_breaker;
pub mod retry;

// Re-export bulkhead types
pub use bulkhead::{
    Bulkhead, BulkheadConfig, BulkheadConfigBuilder, BulkheadError, BulkheadMetrics, BulkheadPermit,
    DEFAULT_MAX_CONCURRENT,
};
// Re-export circuit breaker types
pub use circuit_breaker::{
    Admission, Breaker, CallPermit, CircuitBreaker, CircuitBreakerConfig,
    CircuitBreakerConfigBuilder, CircuitBreakerMetrics, CircuitBreakerRegistry, CircuitState,
    Clock, ConfigError, ConfigResult, MockClock, ResilienceError, ResilienceResult, SystemClock,
};
// Re-export retry types
pub use retry::{
    policies, BackoffStrategy, Jitter, RetryConfig, RetryConfigBuilder, RetryDecision, RetryError,
    RetryExecutor, RetryOutcome, RetryPolicy,
};
