//! Batch aggregation

use serde::{Deserialize, Serialize};

use super::outcome::{ItemReport, OutcomeKind, ReconciliationAction};
use super::work_item::WorkItemId;

/// An item whose reconciliation write failed after its call settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationFailure {
    pub item_id: WorkItemId,
    pub action: ReconciliationAction,
    pub error: String,
}

/// Aggregated result of one dispatch.
///
/// Counter buckets: `succeeded` = success, `declined` = declined, `failed` =
/// permanent failure, `errored` = transient failure. Every report lands in
/// exactly one bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub succeeded: usize,
    pub declined: usize,
    pub failed: usize,
    pub errored: usize,
    pub reports: Vec<ItemReport>,
    pub reconciliation_failures: Vec<ReconciliationFailure>,
}

impl BatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one item report into the result.
    pub fn record(&mut self, report: ItemReport) {
        match report.outcome.kind() {
            OutcomeKind::Success => self.succeeded += 1,
            OutcomeKind::Declined => self.declined += 1,
            OutcomeKind::Permanent => self.failed += 1,
            OutcomeKind::Transient => self.errored += 1,
        }
        if let Some(error) = &report.reconciliation_error {
            self.reconciliation_failures.push(ReconciliationFailure {
                item_id: report.item_id.clone(),
                action: report.outcome.reconciliation_action(),
                error: error.clone(),
            });
        }
        self.reports.push(report);
    }

    /// Combine two partial results.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        self.succeeded += other.succeeded;
        self.declined += other.declined;
        self.failed += other.failed;
        self.errored += other.errored;
        self.reports.extend(other.reports);
        self.reconciliation_failures.extend(other.reconciliation_failures);
        self
    }

    /// Order reports and failures by item id so results merged in any order
    /// compare equal.
    #[must_use]
    pub fn normalize(mut self) -> Self {
        self.reports.sort_by(|a, b| a.item_id.cmp(&b.item_id));
        self.reconciliation_failures.sort_by(|a, b| a.item_id.cmp(&b.item_id));
        self
    }

    /// Sum of the four counters.
    pub fn total(&self) -> usize {
        self.succeeded + self.declined + self.failed + self.errored
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    pub fn report_for(&self, id: &WorkItemId) -> Option<&ItemReport> {
        self.reports.iter().find(|report| &report.item_id == id)
    }
}

impl FromIterator<ItemReport> for BatchResult {
    fn from_iter<I: IntoIterator<Item = ItemReport>>(iter: I) -> Self {
        let mut result = Self::new();
        for report in iter {
            result.record(report);
        }
        result
    }
}

impl Extend<ItemReport> for BatchResult {
    fn extend<I: IntoIterator<Item = ItemReport>>(&mut self, iter: I) {
        for report in iter {
            self.record(report);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CallOutcome;

    fn report(id: i64, outcome: CallOutcome) -> ItemReport {
        ItemReport::new(WorkItemId::Numeric(id), outcome, 1)
    }

    fn sample() -> Vec<ItemReport> {
        let mut unreconciled = report(4, CallOutcome::transient("cancelled"));
        unreconciled.reconciliation_error = Some("ledger unavailable".into());
        vec![
            report(1, CallOutcome::success("ch_1")),
            report(2, CallOutcome::declined("card_declined")),
            report(3, CallOutcome::permanent("invalid request: amount must be positive")),
            unreconciled,
        ]
    }

    #[test]
    fn each_report_lands_in_one_bucket() {
        let result: BatchResult = sample().into_iter().collect();

        assert_eq!((result.succeeded, result.declined, result.failed, result.errored), (1, 1, 1, 1));
        assert_eq!(result.total(), 4);
        assert_eq!(result.reports.len(), 4);
        assert_eq!(result.reconciliation_failures.len(), 1);
        assert_eq!(
            result.reconciliation_failures[0].action,
            ReconciliationAction::DeadLetter { reason: "cancelled".into() }
        );
    }

    #[test]
    fn merge_is_associative_and_commutative() {
        let reports = sample();
        let part = |range: std::ops::Range<usize>| -> BatchResult {
            reports[range].iter().cloned().collect()
        };

        let left = part(0..1).merge(part(1..3)).merge(part(3..4)).normalize();
        let right = part(3..4).merge(part(1..3).merge(part(0..1))).normalize();
        let whole: BatchResult = reports.iter().cloned().collect();

        assert_eq!(left, right);
        assert_eq!(left, whole.normalize());
        assert_eq!(BatchResult::new().merge(part(0..2)).normalize(), part(0..2).normalize());
    }
}
