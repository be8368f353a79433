//! Per-item processing: slot, call, reconcile

use std::sync::Arc;
use std::time::Duration;

use paysched_common::resilience::Bulkhead;
use paysched_domain::constants::{CAUSE_CANCELLED, RECONCILIATION_FAILED_PREFIX};
use paysched_domain::{
    CallOutcome, ChargeRequest, ItemReport, JobConfig, PaySchedError, ReconciliationAction,
    WorkItem, WorkItemId,
};
use tracing::{debug, error, info, instrument, warn};

use super::caller::{CallResult, ResilientCaller};
use super::cancel::CancelSignal;
use super::ports::ReconciliationSink;

/// Request building and reconciliation settings.
#[derive(Debug, Clone)]
pub struct ProcessorSettings {
    pub currency: String,
    pub description: String,
    pub reconcile_timeout: Duration,
}

impl ProcessorSettings {
    pub fn from_config(config: &JobConfig) -> Self {
        Self {
            currency: config.provider.currency.clone(),
            description: config.provider.description.clone(),
            reconcile_timeout: config.reconcile_timeout(),
        }
    }
}

/// Charges one work item and settles it in the system of record.
#[derive(Clone)]
pub struct ItemProcessor {
    caller: Arc<ResilientCaller>,
    limiter: Bulkhead,
    sink: Arc<dyn ReconciliationSink>,
    settings: ProcessorSettings,
}

impl ItemProcessor {
    pub fn new(
        caller: Arc<ResilientCaller>,
        limiter: Bulkhead,
        sink: Arc<dyn ReconciliationSink>,
        settings: ProcessorSettings,
    ) -> Self {
        Self { caller, limiter, sink, settings }
    }

    pub fn limiter(&self) -> &Bulkhead {
        &self.limiter
    }

    /// Process `item` to exactly one outcome and one reconciliation attempt.
    #[instrument(skip_all, fields(item = %item.id))]
    pub async fn process(&self, item: &WorkItem, cancel: &CancelSignal) -> ItemReport {
        let CallResult { outcome, attempts } = self.charge(item, cancel).await;

        let mut report = ItemReport::new(item.id.clone(), outcome, attempts);
        report.reconciliation_error = self.reconcile(&item.id, &report.outcome).await;

        match &report.outcome {
            CallOutcome::Success { provider_reference } => {
                info!(attempts, provider_reference = %provider_reference, "Charge succeeded");
            }
            outcome => {
                warn!(
                    attempts,
                    kind = %outcome.kind(),
                    detail = outcome.detail().unwrap_or_default(),
                    "Charge not completed"
                );
            }
        }
        report
    }

    async fn charge(&self, item: &WorkItem, cancel: &CancelSignal) -> CallResult {
        let built = ChargeRequest::from_item(item, &self.settings.currency, &self.settings.description)
            .and_then(|request| request.validate().map(|()| request));
        let request = match built {
            Ok(request) => request,
            Err(error) => return invalid_request(&error),
        };

        let Ok(permit) = self.limiter.acquire(cancel.graceful()).await else {
            debug!("Cancelled while waiting for a slot");
            return CallResult { outcome: CallOutcome::transient(CAUSE_CANCELLED), attempts: 0 };
        };

        let result = self.caller.call(&request, cancel).await;
        self.limiter.release(permit);

        result.unwrap_or_else(|error| invalid_request(&error))
    }

    /// Write the outcome to the sink. Returns the error text on failure.
    ///
    /// A charged item whose completion cannot be recorded is parked in the
    /// dead-letter sink instead; the error is still returned so the round
    /// reports it.
    pub(super) async fn reconcile(&self, id: &WorkItemId, outcome: &CallOutcome) -> Option<String> {
        let action = outcome.reconciliation_action();
        let failure = self.write(id, &action).await.err()?;
        warn!(item = %id, error = %failure, "Reconciliation write failed");

        if !matches!(action, ReconciliationAction::MarkComplete { .. }) {
            return Some(failure);
        }

        let parked = ReconciliationAction::DeadLetter {
            reason: format!("{RECONCILIATION_FAILED_PREFIX}: {failure}"),
        };
        match self.write(id, &parked).await {
            Ok(()) => {
                info!(item = %id, "Completed charge parked in dead letter");
                Some(failure)
            }
            Err(fallback) => {
                error!(item = %id, error = %fallback, "Dead-letter write failed too");
                Some(format!("{failure}; dead letter also failed: {fallback}"))
            }
        }
    }

    async fn write(&self, id: &WorkItemId, action: &ReconciliationAction) -> Result<(), String> {
        let timeout = self.settings.reconcile_timeout;
        match tokio::time::timeout(timeout, self.sink.apply(id, action)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(error)) => Err(error.to_string()),
            Err(_) => Err(format!("reconciliation timed out after {}ms", timeout.as_millis())),
        }
    }
}

fn invalid_request(error: &PaySchedError) -> CallResult {
    let detail = match error {
        PaySchedError::InvalidRequest(message) => message.clone(),
        other => other.to_string(),
    };
    CallResult { outcome: CallOutcome::permanent(format!("invalid request: {detail}")), attempts: 0 }
}
