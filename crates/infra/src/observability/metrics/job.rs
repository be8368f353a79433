//! Per-job round counters
//!
//! ## Design
//! - **Atomic counters** so the scheduler callback never blocks
//! - **Snapshot reads** for logging and tests; counters are never reset

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use paysched_core::{RunReport, SkipReason};
use serde::Serialize;
use tracing::info;

/// Counters for one scheduled job.
#[derive(Debug, Default)]
pub struct JobMetrics {
    runs_started: AtomicU64,
    runs_completed: AtomicU64,
    runs_skipped: AtomicU64,
    overlaps: AtomicU64,
    fetch_failures: AtomicU64,
    trigger_errors: AtomicU64,
    items_succeeded: AtomicU64,
    items_declined: AtomicU64,
    items_failed: AtomicU64,
    items_errored: AtomicU64,
    reconciliation_failures: AtomicU64,
    last_run_ms: AtomicU64,
}

/// Point-in-time copy of [`JobMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobMetricsSnapshot {
    pub runs_started: u64,
    pub runs_completed: u64,
    pub runs_skipped: u64,
    pub overlaps: u64,
    pub fetch_failures: u64,
    pub trigger_errors: u64,
    pub items_succeeded: u64,
    pub items_declined: u64,
    pub items_failed: u64,
    pub items_errored: u64,
    pub reconciliation_failures: u64,
    pub last_run_ms: u64,
}

impl JobMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// A trigger fired.
    pub fn record_trigger(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
    }

    /// A trigger surfaced an error outside the round itself.
    pub fn record_trigger_error(&self) {
        self.trigger_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Fold the result of one round in.
    pub fn record_report(&self, report: &RunReport, elapsed: Duration) {
        match report {
            RunReport::Completed(result) => {
                self.runs_completed.fetch_add(1, Ordering::Relaxed);
                self.items_succeeded.fetch_add(count(result.succeeded), Ordering::Relaxed);
                self.items_declined.fetch_add(count(result.declined), Ordering::Relaxed);
                self.items_failed.fetch_add(count(result.failed), Ordering::Relaxed);
                self.items_errored.fetch_add(count(result.errored), Ordering::Relaxed);
                self.reconciliation_failures
                    .fetch_add(count(result.reconciliation_failures.len()), Ordering::Relaxed);
                self.last_run_ms.store(
                    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                    Ordering::Relaxed,
                );
            }
            RunReport::Skipped(reason) => {
                self.runs_skipped.fetch_add(1, Ordering::Relaxed);
                if matches!(reason, SkipReason::Overlap { .. }) {
                    self.overlaps.fetch_add(1, Ordering::Relaxed);
                }
            }
            RunReport::FetchFailed(_) => {
                self.fetch_failures.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn snapshot(&self) -> JobMetricsSnapshot {
        JobMetricsSnapshot {
            runs_started: self.runs_started.load(Ordering::Relaxed),
            runs_completed: self.runs_completed.load(Ordering::Relaxed),
            runs_skipped: self.runs_skipped.load(Ordering::Relaxed),
            overlaps: self.overlaps.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            trigger_errors: self.trigger_errors.load(Ordering::Relaxed),
            items_succeeded: self.items_succeeded.load(Ordering::Relaxed),
            items_declined: self.items_declined.load(Ordering::Relaxed),
            items_failed: self.items_failed.load(Ordering::Relaxed),
            items_errored: self.items_errored.load(Ordering::Relaxed),
            reconciliation_failures: self.reconciliation_failures.load(Ordering::Relaxed),
            last_run_ms: self.last_run_ms.load(Ordering::Relaxed),
        }
    }

    /// Emit the current totals as one structured log line.
    pub fn log(&self, job: &str) {
        let s = self.snapshot();
        info!(
            job,
            runs_started = s.runs_started,
            runs_completed = s.runs_completed,
            runs_skipped = s.runs_skipped,
            fetch_failures = s.fetch_failures,
            items_succeeded = s.items_succeeded,
            items_declined = s.items_declined,
            items_failed = s.items_failed,
            items_errored = s.items_errored,
            reconciliation_failures = s.reconciliation_failures,
            last_run_ms = s.last_run_ms,
            "Job metrics"
        );
    }
}

fn count(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}
