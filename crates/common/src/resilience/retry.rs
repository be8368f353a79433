//! Retry executor with pluggable backoff, jitter and retry policies
//!
//! The executor hands the attempt number to the operation, asks the
//! [`RetryPolicy`] whether a failure deserves another attempt and sleeps
//! between attempts. Sleeping is cancellable through a
//! [`CancellationToken`], in which case the last error is returned together
//! with the number of attempts made.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::circuit_breaker::{ConfigError, ConfigResult};

/// How the base delay grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackoffStrategy {
    /// Same delay every time
    Fixed,
    /// `initial_delay * attempt`
    Linear,
    /// `initial_delay * multiplier^(attempt - 1)`
    Exponential { multiplier: f64 },
}

/// Randomisation applied on top of the computed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Jitter {
    None,
    /// Uniform in `[0, delay]`
    Full,
    /// `delay / 2` plus uniform in `[0, delay / 2]`
    Equal,
}

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff: BackoffStrategy,
    pub jitter: Jitter,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            backoff: BackoffStrategy::Exponential { multiplier: 2.0 },
            jitter: Jitter::Full,
        }
    }
}

impl RetryConfig {
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                message: "max_attempts must be at least 1".to_string(),
            });
        }
        if self.initial_delay > self.max_delay {
            return Err(ConfigError::Invalid {
                message: "initial_delay must not exceed max_delay".to_string(),
            });
        }
        if let BackoffStrategy::Exponential { multiplier } = self.backoff {
            if !multiplier.is_finite() || multiplier < 1.0 {
                return Err(ConfigError::Invalid {
                    message: format!("backoff multiplier must be >= 1.0, got {multiplier}"),
                });
            }
        }
        Ok(())
    }

    /// Delay before attempt `attempt + 1`, before jitter. `attempt` is 1-based.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let delay = match self.backoff {
            BackoffStrategy::Fixed => self.initial_delay,
            BackoffStrategy::Linear => self.initial_delay.saturating_mul(attempt),
            BackoffStrategy::Exponential { multiplier } => {
                let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
                let secs = self.initial_delay.as_secs_f64() * multiplier.powi(exponent);
                if secs.is_finite() {
                    Duration::try_from_secs_f64(secs).unwrap_or(self.max_delay)
                } else {
                    self.max_delay
                }
            }
        };
        delay.min(self.max_delay)
    }

    /// Delay with jitter applied.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        match self.jitter {
            Jitter::None => base,
            Jitter::Full => random_up_to(base),
            Jitter::Equal => {
                let half = base / 2;
                half + random_up_to(half)
            }
        }
    }
}

fn random_up_to(limit: Duration) -> Duration {
    let nanos = u64::try_from(limit.as_nanos()).unwrap_or(u64::MAX);
    if nanos == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(rand::thread_rng().gen_range(0..=nanos))
}

/// Builder for [`RetryConfig`]
#[derive(Debug, Default)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl RetryConfigBuilder {
    pub fn new() -> Self {
        Self { config: RetryConfig::default() }
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.config.initial_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.config.max_delay = delay;
        self
    }

    pub fn backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.config.backoff = backoff;
        self
    }

    pub fn jitter(mut self, jitter: Jitter) -> Self {
        self.config.jitter = jitter;
        self
    }

    pub fn build(self) -> ConfigResult<RetryConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// What to do with a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    Stop,
}

/// Decides whether an error is worth retrying.
pub trait RetryPolicy<E>: Send + Sync {
    fn decide(&self, error: &E, attempt: u32) -> RetryDecision;
}

/// Ready-made policies.
pub mod policies {
    use super::{RetryDecision, RetryPolicy};

    /// Retry every error.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct AlwaysRetry;

    impl<E> RetryPolicy<E> for AlwaysRetry {
        fn decide(&self, _error: &E, _attempt: u32) -> RetryDecision {
            RetryDecision::Retry
        }
    }

    /// Never retry.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct NeverRetry;

    impl<E> RetryPolicy<E> for NeverRetry {
        fn decide(&self, _error: &E, _attempt: u32) -> RetryDecision {
            RetryDecision::Stop
        }
    }

    /// Retry when the predicate returns true.
    pub struct PredicateRetry<F> {
        predicate: F,
    }

    impl<F> PredicateRetry<F> {
        pub fn new(predicate: F) -> Self {
            Self { predicate }
        }
    }

    impl<E, F> RetryPolicy<E> for PredicateRetry<F>
    where
        F: Fn(&E) -> bool + Send + Sync,
    {
        fn decide(&self, error: &E, _attempt: u32) -> RetryDecision {
            if (self.predicate)(error) {
                RetryDecision::Retry
            } else {
                RetryDecision::Stop
            }
        }
    }
}

/// Why the executor gave up.
#[derive(Debug, Error)]
pub enum RetryError<E>
where
    E: fmt::Debug + fmt::Display,
{
    #[error("retries exhausted after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },

    #[error("non-retryable failure on attempt {attempts}: {error}")]
    NonRetryable { attempts: u32, error: E },

    #[error("cancelled after {attempts} attempts")]
    Cancelled { attempts: u32, last: Option<E> },
}

impl<E: fmt::Debug + fmt::Display> RetryError<E> {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. }
            | Self::NonRetryable { attempts, .. }
            | Self::Cancelled { attempts, .. } => *attempts,
        }
    }
}

/// Result of a retried operation with attempt accounting.
#[derive(Debug)]
pub struct RetryOutcome<T, E>
where
    E: fmt::Debug + fmt::Display,
{
    pub result: Result<T, RetryError<E>>,
    pub attempts: u32,
    pub total_delay: Duration,
}

/// Runs an operation until it succeeds, the policy stops it, attempts run
/// out or the token is cancelled.
#[derive(Debug, Clone)]
pub struct RetryExecutor<P> {
    config: RetryConfig,
    policy: P,
}

impl<P> RetryExecutor<P> {
    pub fn new(config: RetryConfig, policy: P) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self { config, policy })
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute `operation`, passing the 1-based attempt number.
    pub async fn execute<F, Fut, T, E>(
        &self,
        mut operation: F,
        cancel: &CancellationToken,
    ) -> RetryOutcome<T, E>
    where
        P: RetryPolicy<E>,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Debug + fmt::Display,
    {
        let mut attempts = 0;
        let mut total_delay = Duration::ZERO;
        let mut last: Option<E> = None;

        loop {
            if cancel.is_cancelled() {
                return RetryOutcome {
                    result: Err(RetryError::Cancelled { attempts, last }),
                    attempts,
                    total_delay,
                };
            }

            attempts += 1;
            let error = match operation(attempts).await {
                Ok(value) => return RetryOutcome { result: Ok(value), attempts, total_delay },
                Err(error) => error,
            };

            if self.policy.decide(&error, attempts) == RetryDecision::Stop {
                debug!(attempts, %error, "Failure is not retryable");
                return RetryOutcome {
                    result: Err(RetryError::NonRetryable { attempts, error }),
                    attempts,
                    total_delay,
                };
            }

            if attempts >= self.config.max_attempts {
                warn!(attempts, %error, "Retries exhausted");
                return RetryOutcome {
                    result: Err(RetryError::Exhausted { attempts, last: error }),
                    attempts,
                    total_delay,
                };
            }

            let delay = self.config.delay_for(attempts);
            debug!(attempt = attempts, delay_ms = delay.as_millis(), %error, "Retrying after delay");
            last = Some(error);

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return RetryOutcome {
                        result: Err(RetryError::Cancelled { attempts, last }),
                        attempts,
                        total_delay,
                    };
                }
                () = tokio::time::sleep(delay) => {
                    total_delay += delay;
                }
            }
        }
    }
}
