//! Bulkhead pattern for limiting concurrent operations
//!
//! A bulkhead caps how many operations run at once. Waiters are admitted in
//! arrival order (tokio's semaphore is fair) and a waiter can give up through
//! its cancellation token without ever holding a slot.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use super::circuit_breaker::{ConfigError, ConfigResult, ResilienceError};

/// Default number of operations allowed to run at once.
pub const DEFAULT_MAX_CONCURRENT: usize = 20;

/// Configuration for bulkhead behavior
#[derive(Debug, Clone)]
pub struct BulkheadConfig {
    /// Maximum number of concurrent operations allowed
    pub max_concurrent: usize,
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        Self { max_concurrent: DEFAULT_MAX_CONCURRENT }
    }
}

impl BulkheadConfig {
    /// Create a new configuration builder
    pub fn builder() -> BulkheadConfigBuilder {
        BulkheadConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_concurrent == 0 {
            return Err(ConfigError::Invalid {
                message: "max_concurrent must be greater than 0".to_string(),
            });
        }
        if self.max_concurrent > Semaphore::MAX_PERMITS {
            return Err(ConfigError::Invalid {
                message: format!("max_concurrent must not exceed {}", Semaphore::MAX_PERMITS),
            });
        }
        Ok(())
    }
}

/// Builder for BulkheadConfig
#[derive(Debug, Default)]
pub struct BulkheadConfigBuilder {
    config: BulkheadConfig,
}

impl BulkheadConfigBuilder {
    pub fn new() -> Self {
        Self { config: BulkheadConfig::default() }
    }

    pub fn max_concurrent(mut self, max: usize) -> Self {
        self.config.max_concurrent = max;
        self
    }

    pub fn build(self) -> ConfigResult<BulkheadConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Why a slot could not be obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BulkheadError {
    #[error("cancelled while waiting for a concurrency slot")]
    Cancelled,
    #[error("bulkhead closed")]
    Closed,
}

/// Metrics for bulkhead monitoring
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkheadMetrics {
    /// Operations currently holding a slot
    pub in_flight: usize,
    /// Highest `in_flight` ever observed
    pub peak_in_flight: usize,
    pub max_concurrent: usize,
    /// Slots handed out since creation
    pub total_acquired: u64,
    /// Waiters that gave up through cancellation
    pub cancelled_waits: u64,
}

impl BulkheadMetrics {
    /// Check if the bulkhead is at capacity
    pub fn is_at_capacity(&self) -> bool {
        self.in_flight >= self.max_concurrent
    }
}

#[derive(Debug, Default)]
struct Counters {
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    total_acquired: AtomicU64,
    cancelled_waits: AtomicU64,
}

/// A held concurrency slot. The slot is returned when the permit is dropped.
#[must_use = "dropping the permit releases the slot immediately"]
pub struct BulkheadPermit {
    _permit: OwnedSemaphorePermit,
    counters: Arc<Counters>,
}

impl fmt::Debug for BulkheadPermit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BulkheadPermit").finish_non_exhaustive()
    }
}

impl Drop for BulkheadPermit {
    fn drop(&mut self) {
        self.counters.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Bulkhead for limiting concurrent operations
///
/// Cloning is cheap and clones share the same slots.
///
/// # Examples
///
/// ```rust
/// use paysched_common::resilience::{Bulkhead, BulkheadConfig};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let bulkhead = Bulkhead::new(BulkheadConfig::builder().max_concurrent(5).build()?)?;
/// let cancel = CancellationToken::new();
///
/// let permit = bulkhead.acquire(&cancel).await?;
/// // ... do the work ...
/// bulkhead.release(permit);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Bulkhead {
    config: BulkheadConfig,
    semaphore: Arc<Semaphore>,
    counters: Arc<Counters>,
}

impl Bulkhead {
    /// Create a new bulkhead with the given configuration
    pub fn new(config: BulkheadConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
            counters: Arc::new(Counters::default()),
            config,
        })
    }

    /// Wait for a slot in FIFO order, or give up when `cancel` fires.
    ///
    /// A cancelled waiter leaves the queue without consuming a slot.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<BulkheadPermit, BulkheadError> {
        if cancel.is_cancelled() {
            self.counters.cancelled_waits.fetch_add(1, Ordering::Relaxed);
            return Err(BulkheadError::Cancelled);
        }

        let permit = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                self.counters.cancelled_waits.fetch_add(1, Ordering::Relaxed);
                debug!("Bulkhead wait cancelled");
                return Err(BulkheadError::Cancelled);
            }
            permit = Arc::clone(&self.semaphore).acquire_owned() => {
                permit.map_err(|_| BulkheadError::Closed)?
            }
        };

        Ok(self.admit(permit))
    }

    /// Take a slot only if one is free right now.
    pub fn try_acquire(&self) -> Option<BulkheadPermit> {
        Arc::clone(&self.semaphore).try_acquire_owned().ok().map(|permit| self.admit(permit))
    }

    fn admit(&self, permit: OwnedSemaphorePermit) -> BulkheadPermit {
        let now = self.counters.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.counters.peak_in_flight.fetch_max(now, Ordering::AcqRel);
        self.counters.total_acquired.fetch_add(1, Ordering::Relaxed);
        BulkheadPermit { _permit: permit, counters: Arc::clone(&self.counters) }
    }

    /// Return a slot explicitly. Equivalent to dropping the permit.
    pub fn release(&self, permit: BulkheadPermit) {
        drop(permit);
    }

    /// Execute an operation while holding a slot
    #[instrument(skip(self, cancel, operation), fields(in_flight = self.in_flight()))]
    pub async fn execute<F, Fut, T, E>(
        &self,
        cancel: &CancellationToken,
        operation: F,
    ) -> Result<T, ResilienceError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let _permit = self.acquire(cancel).await.map_err(|error| match error {
            BulkheadError::Cancelled => ResilienceError::Cancelled,
            BulkheadError::Closed => {
                ResilienceError::BulkheadClosed { capacity: self.config.max_concurrent }
            }
        })?;

        operation().await.map_err(|source| ResilienceError::OperationFailed { source })
    }

    /// Stop admitting new operations. Pending waiters fail with `Closed`.
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn max_concurrent(&self) -> usize {
        self.config.max_concurrent
    }

    /// Number of slots currently held
    pub fn in_flight(&self) -> usize {
        self.counters.in_flight.load(Ordering::Acquire)
    }

    /// Number of free slots
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Get bulkhead metrics
    pub fn metrics(&self) -> BulkheadMetrics {
        BulkheadMetrics {
            in_flight: self.in_flight(),
            peak_in_flight: self.counters.peak_in_flight.load(Ordering::Acquire),
            max_concurrent: self.config.max_concurrent,
            total_acquired: self.counters.total_acquired.load(Ordering::Acquire),
            cancelled_waits: self.counters.cancelled_waits.load(Ordering::Acquire),
        }
    }
}

impl fmt::Debug for Bulkhead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bulkhead")
            .field("max_concurrent", &self.config.max_concurrent)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
