//! Circuit breaker with a single-probe half-open state
//!
//! The breaker counts consecutive failures. Once `failure_threshold` is
//! reached it opens and rejects every call without running it. After the
//! cooldown the next caller is admitted as the *probe*; all other callers
//! keep being rejected until the probe settles. A successful probe closes the
//! circuit and clears the failure count, a failed probe reopens it and
//! restarts the cooldown.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

//==============================================================================
// Time Abstraction for Testability
//==============================================================================

/// Trait for time operations to enable deterministic testing
///
/// Production code uses [`SystemClock`]; tests drive cooldowns with
/// [`MockClock`] instead of sleeping.
pub trait Clock: Send + Sync + 'static {
    /// Get current instant (monotonic time)
    fn now(&self) -> Instant;
}

/// Real system clock implementation for production use
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl<T: Clock> Clock for Arc<T> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Mock clock for deterministic testing
///
/// Clones share the same elapsed offset, so a test can keep one handle and
/// hand another to the breaker.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    elapsed: Arc<Mutex<Duration>>,
}

impl MockClock {
    /// Create a new mock clock starting at the current instant
    pub fn new() -> Self {
        Self { start: Instant::now(), elapsed: Arc::new(Mutex::new(Duration::ZERO)) }
    }

    /// Advance the mock clock by a duration
    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock() += duration;
    }

    /// Advance the mock clock by milliseconds (convenience method)
    pub fn advance_millis(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }

    /// Get the current elapsed time
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + *self.elapsed.lock()
    }
}

//==============================================================================
// Error Types
//==============================================================================

/// Simple configuration error for validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Errors that can occur in resilience operations
///
/// Generic over the wrapped operation error so the original failure is kept
/// as the `source`.
#[derive(Debug, Error)]
pub enum ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Circuit breaker is open, rejecting calls
    #[error("Circuit breaker is open, rejecting calls")]
    CircuitOpen,

    /// Operation timed out
    #[error("Operation timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// Waiting for admission was cancelled
    #[error("Operation cancelled before admission")]
    Cancelled,

    /// Bulkhead was shut down while waiting
    #[error("Bulkhead closed: {capacity} concurrent operations")]
    BulkheadClosed { capacity: usize },

    /// The underlying operation failed
    #[error("Operation failed")]
    OperationFailed {
        #[source]
        source: E,
    },
}

/// Result type for resilience operations
pub type ResilienceResult<T, E> = Result<T, ResilienceError<E>>;

/// Configuration result type using simple config errors
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    /// Circuit is closed, allowing requests
    Closed,
    /// Circuit is open, rejecting requests
    Open,
    /// Cooldown elapsed, a single probe decides the next state
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u64,
    /// Time to wait in `Open` before admitting a probe
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, cooldown: Duration::from_secs(30) }
    }
}

impl CircuitBreakerConfig {
    /// Create a configuration builder
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::Invalid {
                message: "failure_threshold must be greater than 0".to_string(),
            });
        }

        if self.cooldown.is_zero() {
            return Err(ConfigError::Invalid {
                message: "cooldown must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

/// Builder for CircuitBreakerConfig
#[derive(Debug)]
pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl Default for CircuitBreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBreakerConfigBuilder {
    pub fn new() -> Self {
        Self { config: CircuitBreakerConfig::default() }
    }

    pub fn failure_threshold(mut self, threshold: u64) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.config.cooldown = cooldown;
        self
    }

    pub fn build(self) -> ConfigResult<CircuitBreakerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Circuit breaker metrics for monitoring
#[derive(Debug, Clone)]
pub struct CircuitBreakerMetrics {
    pub state: CircuitState,
    pub consecutive_failures: u64,
    pub total_calls: u64,
    pub rejected_calls: u64,
    pub state_change_time: Instant,
}

//==============================================================================
// Breaker abstraction
//==============================================================================

/// How a call was let through the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Regular call while the circuit is closed
    Normal,
    /// The single half-open probe
    Probe,
}

/// Minimal breaker interface consumed by callers.
///
/// `try_admit` either rejects the call or hands out an [`Admission`] that must
/// be settled exactly once with `on_success`, `on_failure` or `on_abandon`.
/// [`CallPermit`] does that bookkeeping for you.
pub trait Breaker: Send + Sync {
    fn try_admit(&self) -> Option<Admission>;
    fn on_success(&self, admission: Admission);
    fn on_failure(&self, admission: Admission);
    /// The admitted call never produced a verdict (cancelled, dropped).
    fn on_abandon(&self, admission: Admission);
    fn state(&self) -> CircuitState;
}

/// RAII guard for an admitted call.
///
/// Dropping an unsettled permit counts as abandoning the call, which frees the
/// half-open probe slot without changing the circuit state.
#[must_use = "an admitted call must be settled"]
pub struct CallPermit<'a> {
    breaker: &'a dyn Breaker,
    admission: Admission,
    settled: bool,
}

impl<'a> CallPermit<'a> {
    /// Ask the breaker for admission.
    pub fn acquire(breaker: &'a dyn Breaker) -> Option<Self> {
        breaker.try_admit().map(|admission| Self { breaker, admission, settled: false })
    }

    pub fn admission(&self) -> Admission {
        self.admission
    }

    pub fn succeed(mut self) {
        self.settled = true;
        self.breaker.on_success(self.admission);
    }

    pub fn fail(mut self) {
        self.settled = true;
        self.breaker.on_failure(self.admission);
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.on_abandon(self.admission);
        }
    }
}

//==============================================================================
// Circuit breaker
//==============================================================================

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u64,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
    state_change_time: Instant,
}

/// Circuit breaker guarding one endpoint.
///
/// All transitions happen under a single lock so the open → half-open →
/// closed/open sequence is atomic with respect to concurrent callers.
pub struct CircuitBreaker<C: Clock = SystemClock> {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
    total_calls: AtomicU64,
    rejected_calls: AtomicU64,
    clock: Arc<C>,
}

impl<C: Clock> fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &inner.state)
            .field("consecutive_failures", &inner.consecutive_failures)
            .finish()
    }
}

impl CircuitBreaker<SystemClock> {
    /// Create a new circuit breaker using the system clock
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> ConfigResult<Self> {
        Self::with_clock(name, config, SystemClock)
    }
}

impl<C: Clock> CircuitBreaker<C> {
    /// Create a new circuit breaker with a custom clock (useful for testing)
    pub fn with_clock(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: C,
    ) -> ConfigResult<Self> {
        config.validate()?;
        let clock = Arc::new(clock);

        Ok(Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                probe_in_flight: false,
                state_change_time: clock.now(),
            }),
            total_calls: AtomicU64::new(0),
            rejected_calls: AtomicU64::new(0),
            clock,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Execute an operation with circuit breaker protection
    ///
    /// Every `Err` counts as a failure. Callers that need to classify results
    /// differently should use [`CallPermit`] directly.
    #[instrument(skip(self, operation), fields(breaker = %self.name))]
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let Some(permit) = CallPermit::acquire(self) else {
            debug!("Circuit breaker rejecting call");
            return Err(ResilienceError::CircuitOpen);
        };

        match operation().await {
            Ok(result) => {
                permit.succeed();
                Ok(result)
            }
            Err(error) => {
                permit.fail();
                Err(ResilienceError::OperationFailed { source: error })
            }
        }
    }

    fn transition(&self, inner: &mut BreakerState, to: CircuitState) {
        if inner.state != to {
            info!(breaker = %self.name, from = %inner.state, to = %to, "Circuit state changed");
            inner.state = to;
            inner.state_change_time = self.clock.now();
        }
    }

    fn open(&self, inner: &mut BreakerState) {
        self.transition(inner, CircuitState::Open);
        inner.opened_at = Some(self.clock.now());
        inner.probe_in_flight = false;
    }

    /// Get circuit breaker metrics
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let inner = self.inner.lock();
        CircuitBreakerMetrics {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            total_calls: self.total_calls.load(Ordering::Acquire),
            rejected_calls: self.rejected_calls.load(Ordering::Acquire),
            state_change_time: inner.state_change_time,
        }
    }
}

impl<C: Clock> Breaker for CircuitBreaker<C> {
    fn try_admit(&self) -> Option<Admission> {
        let mut inner = self.inner.lock();

        let admission = match inner.state {
            CircuitState::Closed => Some(Admission::Normal),
            CircuitState::Open => {
                let cooled_down = inner
                    .opened_at
                    .is_some_and(|at| self.clock.now().duration_since(at) >= self.config.cooldown);
                if cooled_down {
                    self.transition(&mut inner, CircuitState::HalfOpen);
                    inner.probe_in_flight = true;
                    Some(Admission::Probe)
                } else {
                    None
                }
            }
            CircuitState::HalfOpen if inner.probe_in_flight => None,
            CircuitState::HalfOpen => {
                inner.probe_in_flight = true;
                Some(Admission::Probe)
            }
        };

        if admission.is_some() {
            self.total_calls.fetch_add(1, Ordering::Relaxed);
        } else {
            self.rejected_calls.fetch_add(1, Ordering::Relaxed);
        }
        admission
    }

    fn on_success(&self, admission: Admission) {
        let mut inner = self.inner.lock();
        match (inner.state, admission) {
            (CircuitState::Closed, _) => inner.consecutive_failures = 0,
            (CircuitState::HalfOpen, Admission::Probe) => {
                inner.consecutive_failures = 0;
                inner.probe_in_flight = false;
                inner.opened_at = None;
                self.transition(&mut inner, CircuitState::Closed);
            }
            // A call admitted before the circuit opened finished late; the
            // probe alone decides recovery.
            _ => debug!(breaker = %self.name, "Ignoring late success"),
        }
    }

    fn on_failure(&self, admission: Admission) {
        let mut inner = self.inner.lock();
        match (inner.state, admission) {
            (CircuitState::Closed, _) => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    warn!(
                        breaker = %self.name,
                        failures = inner.consecutive_failures,
                        "Circuit breaker opened"
                    );
                    self.open(&mut inner);
                }
            }
            (CircuitState::HalfOpen, Admission::Probe) => {
                inner.consecutive_failures += 1;
                warn!(breaker = %self.name, "Half-open probe failed, reopening circuit");
                self.open(&mut inner);
            }
            _ => debug!(breaker = %self.name, "Ignoring late failure"),
        }
    }

    fn on_abandon(&self, admission: Admission) {
        if admission == Admission::Probe {
            let mut inner = self.inner.lock();
            if inner.state == CircuitState::HalfOpen {
                inner.probe_in_flight = false;
            }
        }
    }

    fn state(&self) -> CircuitState {
        self.inner.lock().state
    }
}

//==============================================================================
// Per-endpoint registry
//==============================================================================

/// Lazily creates one breaker per endpoint key, all sharing a config and clock.
pub struct CircuitBreakerRegistry<C: Clock = SystemClock> {
    config: CircuitBreakerConfig,
    clock: Arc<C>,
    breakers: DashMap<String, Arc<CircuitBreaker<Arc<C>>>>,
}

impl CircuitBreakerRegistry<SystemClock> {
    pub fn new(config: CircuitBreakerConfig) -> ConfigResult<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> CircuitBreakerRegistry<C> {
    pub fn with_clock(config: CircuitBreakerConfig, clock: C) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self { config, clock: Arc::new(clock), breakers: DashMap::new() })
    }

    /// Breaker for `endpoint`, created closed on first use.
    pub fn breaker(&self, endpoint: &str) -> Arc<CircuitBreaker<Arc<C>>> {
        if let Some(existing) = self.breakers.get(endpoint) {
            return Arc::clone(existing.value());
        }

        let entry = self.breakers.entry(endpoint.to_string()).or_insert_with(|| {
            // Config was validated when the registry was built.
            let breaker = CircuitBreaker {
                name: endpoint.to_string(),
                config: self.config.clone(),
                inner: Mutex::new(BreakerState {
                    state: CircuitState::Closed,
                    consecutive_failures: 0,
                    opened_at: None,
                    probe_in_flight: false,
                    state_change_time: self.clock.now(),
                }),
                total_calls: AtomicU64::new(0),
                rejected_calls: AtomicU64::new(0),
                clock: Arc::new(Arc::clone(&self.clock)),
            };
            Arc::new(breaker)
        });
        Arc::clone(entry.value())
    }

    /// Current state of every known endpoint.
    pub fn states(&self) -> Vec<(String, CircuitState)> {
        self.breakers.iter().map(|entry| (entry.key().clone(), entry.value().state())).collect()
    }
}
