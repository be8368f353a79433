//! Resilient provider caller
//!
//! Wraps one charge with a per-attempt timeout, retry with backoff and the
//! endpoint's circuit breaker. Provider failures come back as
//! [`CallOutcome`] values; only a malformed request is an `Err`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use paysched_common::resilience::{
    BackoffStrategy, Breaker, CallPermit, Jitter, RetryConfig, RetryDecision, RetryError,
    RetryExecutor, RetryPolicy,
};
use paysched_domain::constants::{
    CAUSE_CANCELLED, CAUSE_CIRCUIT_OPEN, CAUSE_CREDENTIALS_UNAVAILABLE, CAUSE_TIMEOUT,
};
use paysched_domain::{
    CallOutcome, ChargeRequest, ClassificationTable, JobConfig, PaySchedError, Result,
};
use tracing::{debug, instrument, warn};

use super::cancel::CancelSignal;
use super::ports::{ChargeGateway, SecretProvider};

/// Settings for [`ResilientCaller`].
#[derive(Debug, Clone)]
pub struct CallerSettings {
    pub endpoint: String,
    pub call_timeout: Duration,
    pub retry: RetryConfig,
    pub classification: ClassificationTable,
}

impl CallerSettings {
    pub fn from_config(config: &JobConfig) -> Result<Self> {
        let retry = RetryConfig::builder()
            .max_attempts(config.retry.max_attempts)
            .initial_delay(Duration::from_millis(config.retry.initial_backoff_ms))
            .max_delay(Duration::from_millis(config.retry.max_backoff_ms))
            .backoff(BackoffStrategy::Exponential { multiplier: config.retry.multiplier })
            .jitter(if config.retry.jitter { Jitter::Full } else { Jitter::None })
            .build()
            .map_err(|e| PaySchedError::Config(e.to_string()))?;

        Ok(Self {
            endpoint: config.provider.endpoint.clone(),
            call_timeout: config.call_timeout(),
            retry,
            classification: config.classification.clone(),
        })
    }
}

/// Outcome of a call plus how many provider attempts it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallResult {
    pub outcome: CallOutcome,
    /// Zero when no request reached the provider
    pub attempts: u32,
}

/// A transient outcome from one attempt.
#[derive(Debug)]
struct AttemptFailure {
    outcome: CallOutcome,
    retryable: bool,
}

impl AttemptFailure {
    fn retryable(cause: impl Into<String>) -> Self {
        Self { outcome: CallOutcome::transient(cause), retryable: true }
    }

    fn terminal(cause: impl Into<String>) -> Self {
        Self { outcome: CallOutcome::transient(cause), retryable: false }
    }
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.outcome.detail().unwrap_or("transient failure"))
    }
}

/// Retries transient provider failures; circuit-open and cancellation stop.
#[derive(Debug, Clone, Copy)]
struct RetryTransient;

impl RetryPolicy<AttemptFailure> for RetryTransient {
    fn decide(&self, error: &AttemptFailure, _attempt: u32) -> RetryDecision {
        if error.retryable {
            RetryDecision::Retry
        } else {
            RetryDecision::Stop
        }
    }
}

/// Charges one request against the provider with retry, timeout and circuit
/// breaking.
pub struct ResilientCaller {
    gateway: Arc<dyn ChargeGateway>,
    secrets: Arc<dyn SecretProvider>,
    breaker: Arc<dyn Breaker>,
    executor: RetryExecutor<RetryTransient>,
    endpoint: String,
    call_timeout: Duration,
    classification: ClassificationTable,
}

impl fmt::Debug for ResilientCaller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilientCaller")
            .field("endpoint", &self.endpoint)
            .field("call_timeout", &self.call_timeout)
            .field("breaker", &self.breaker.state())
            .finish_non_exhaustive()
    }
}

impl ResilientCaller {
    pub fn new(
        gateway: Arc<dyn ChargeGateway>,
        secrets: Arc<dyn SecretProvider>,
        breaker: Arc<dyn Breaker>,
        settings: CallerSettings,
    ) -> Result<Self> {
        if settings.call_timeout.is_zero() {
            return Err(PaySchedError::Config("call timeout must be greater than 0".into()));
        }
        settings.classification.validate()?;
        let executor = RetryExecutor::new(settings.retry, RetryTransient)
            .map_err(|e| PaySchedError::Config(e.to_string()))?;

        Ok(Self {
            gateway,
            secrets,
            breaker,
            executor,
            endpoint: settings.endpoint,
            call_timeout: settings.call_timeout,
            classification: settings.classification,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Charge `request`.
    ///
    /// Returns `Err(PaySchedError::InvalidRequest)` for a malformed request;
    /// every other failure is a [`CallOutcome`].
    #[instrument(skip_all, fields(item = %request.item_id, endpoint = %self.endpoint))]
    pub async fn call(&self, request: &ChargeRequest, cancel: &CancelSignal) -> Result<CallResult> {
        request.validate()?;

        if cancel.is_cancelled() {
            return Ok(CallResult { outcome: CallOutcome::transient(CAUSE_CANCELLED), attempts: 0 });
        }

        let api_key = match self.secrets.api_key().await {
            Ok(key) => key,
            Err(error) => {
                warn!(%error, "Provider API key unavailable");
                return Ok(CallResult {
                    outcome: CallOutcome::transient(CAUSE_CREDENTIALS_UNAVAILABLE),
                    attempts: 0,
                });
            }
        };

        let run = self
            .executor
            .execute(|attempt| self.attempt(request, &api_key, cancel, attempt), cancel.graceful())
            .await;

        let outcome = match run.result {
            Ok(outcome) => outcome,
            Err(RetryError::Exhausted { last, .. } | RetryError::NonRetryable { error: last, .. }) => {
                last.outcome
            }
            Err(RetryError::Cancelled { .. }) => CallOutcome::transient(CAUSE_CANCELLED),
        };

        let attempts = attempts_reaching_provider(&outcome, run.attempts);
        debug!(attempts, kind = %outcome.kind(), "Call settled");
        Ok(CallResult { outcome, attempts })
    }

    /// One attempt: breaker admission, then the timed provider request.
    async fn attempt(
        &self,
        request: &ChargeRequest,
        api_key: &str,
        cancel: &CancelSignal,
        attempt: u32,
    ) -> std::result::Result<CallOutcome, AttemptFailure> {
        let Some(permit) = CallPermit::acquire(self.breaker.as_ref()) else {
            debug!(attempt, "Circuit open, failing fast");
            return Err(AttemptFailure::terminal(CAUSE_CIRCUIT_OPEN));
        };

        let submitted = tokio::select! {
            biased;
            () = cancel.forced().cancelled() => {
                // The permit drops unsettled, abandoning the attempt.
                return Err(AttemptFailure::terminal(CAUSE_CANCELLED));
            }
            submitted = tokio::time::timeout(
                self.call_timeout,
                self.gateway.submit(&self.endpoint, request, api_key),
            ) => submitted,
        };

        match submitted {
            Err(_elapsed) => {
                permit.fail();
                debug!(attempt, timeout_ms = self.call_timeout.as_millis(), "Attempt timed out");
                Err(AttemptFailure::retryable(CAUSE_TIMEOUT))
            }
            Ok(Err(transport)) => {
                permit.fail();
                debug!(attempt, error = %transport, "Transport failure");
                Err(AttemptFailure::retryable(transport.to_string()))
            }
            Ok(Ok(response)) => {
                let outcome = self.classification.classify(&response);
                if outcome.is_transient() {
                    permit.fail();
                    debug!(attempt, status = response.status, "Transient provider response");
                    Err(AttemptFailure { outcome, retryable: true })
                } else {
                    // Declines and permanent failures are healthy endpoint
                    // responses.
                    permit.succeed();
                    Ok(outcome)
                }
            }
        }
    }
}

/// A call that failed fast on an open circuit never reached the provider on
/// its final attempt.
fn attempts_reaching_provider(outcome: &CallOutcome, attempts: u32) -> u32 {
    match outcome.detail() {
        Some(CAUSE_CIRCUIT_OPEN) if outcome.is_transient() => attempts.saturating_sub(1),
        _ => attempts,
    }
}
