//! Fan-out dispatcher

use std::sync::Arc;
use std::time::{Duration, Instant};

use paysched_domain::constants::CAUSE_TASK_ABORTED;
use paysched_domain::{BatchResult, CallOutcome, ItemReport, WorkItem};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use super::cancel::CancelSignal;
use super::processor::ItemProcessor;

/// Runs one [`ItemProcessor`] task per item and waits for all of them.
///
/// Concurrency is bounded by the processor's limiter, not by the dispatcher.
/// A failing item never stops the others.
#[derive(Clone)]
pub struct FanOutDispatcher {
    processor: Arc<ItemProcessor>,
    grace_period: Duration,
}

impl FanOutDispatcher {
    pub fn new(processor: Arc<ItemProcessor>, grace_period: Duration) -> Self {
        Self { processor, grace_period }
    }

    pub fn processor(&self) -> &ItemProcessor {
        &self.processor
    }

    /// Dispatch `items` and aggregate one report per item.
    ///
    /// After `cancel` fires, queued items resolve as cancelled right away and
    /// in-flight attempts get the grace period before they are aborted.
    #[instrument(skip_all, fields(items = items.len()))]
    pub async fn dispatch(&self, items: Vec<WorkItem>, cancel: &CancellationToken) -> BatchResult {
        let started = Instant::now();
        let (signal, _escalation) = CancelSignal::linked(cancel, self.grace_period);

        let tasks: Vec<_> = items
            .into_iter()
            .map(|item| {
                let processor = Arc::clone(&self.processor);
                let signal = signal.clone();
                let id = item.id.clone();
                let handle = tokio::spawn(async move { processor.process(&item, &signal).await });
                (id, handle)
            })
            .collect();

        let mut result = BatchResult::new();
        for (id, handle) in tasks {
            match handle.await {
                Ok(report) => result.record(report),
                Err(join_error) => {
                    error!(item = %id, error = %join_error, "Item task aborted");
                    let outcome = CallOutcome::transient(CAUSE_TASK_ABORTED);
                    let reconciliation_error = self.processor.reconcile(&id, &outcome).await;
                    let mut report = ItemReport::new(id, outcome, 0);
                    report.reconciliation_error = reconciliation_error;
                    result.record(report);
                }
            }
        }

        info!(
            succeeded = result.succeeded,
            declined = result.declined,
            failed = result.failed,
            errored = result.errored,
            reconciliation_failures = result.reconciliation_failures.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "Batch dispatched"
        );
        result
    }
}
