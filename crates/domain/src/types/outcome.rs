//! Per-item call outcomes and reports

use std::fmt;

use serde::{Deserialize, Serialize};

use super::work_item::WorkItemId;
use crate::constants::DECLINED_REASON_PREFIX;

/// Terminal result of charging one work item.
///
/// Ordinary provider failures are values of this type, never errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CallOutcome {
    Success { provider_reference: String },
    Declined { reason: String },
    /// Worth retrying later: network trouble, 5xx, timeouts, open circuit
    TransientFailure { cause: String },
    /// Retrying the same request will not help
    PermanentFailure { cause: String },
}

/// Discriminant of [`CallOutcome`], used by the classification table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    Declined,
    Transient,
    Permanent,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "success",
            Self::Declined => "declined",
            Self::Transient => "transient",
            Self::Permanent => "permanent",
        })
    }
}

impl CallOutcome {
    pub fn success(reference: impl Into<String>) -> Self {
        Self::Success { provider_reference: reference.into() }
    }

    pub fn declined(reason: impl Into<String>) -> Self {
        Self::Declined { reason: reason.into() }
    }

    pub fn transient(cause: impl Into<String>) -> Self {
        Self::TransientFailure { cause: cause.into() }
    }

    pub fn permanent(cause: impl Into<String>) -> Self {
        Self::PermanentFailure { cause: cause.into() }
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Success { .. } => OutcomeKind::Success,
            Self::Declined { .. } => OutcomeKind::Declined,
            Self::TransientFailure { .. } => OutcomeKind::Transient,
            Self::PermanentFailure { .. } => OutcomeKind::Permanent,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientFailure { .. })
    }

    /// Cause or reason text for failures, `None` on success.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Declined { reason } => Some(reason),
            Self::TransientFailure { cause } | Self::PermanentFailure { cause } => Some(cause),
        }
    }

    /// The write that settles this outcome in the system of record.
    pub fn reconciliation_action(&self) -> ReconciliationAction {
        match self {
            Self::Success { provider_reference } => {
                ReconciliationAction::MarkComplete { provider_reference: provider_reference.clone() }
            }
            Self::Declined { reason } => ReconciliationAction::DeadLetter {
                reason: format!("{DECLINED_REASON_PREFIX}: {reason}"),
            },
            Self::TransientFailure { cause } | Self::PermanentFailure { cause } => {
                ReconciliationAction::DeadLetter { reason: cause.clone() }
            }
        }
    }
}

/// Reconciliation write for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReconciliationAction {
    MarkComplete { provider_reference: String },
    DeadLetter { reason: String },
}

/// What happened to one item in a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemReport {
    pub item_id: WorkItemId,
    pub outcome: CallOutcome,
    /// Provider attempts made, zero when the call never left the process
    pub attempts: u32,
    /// Set when the reconciliation write failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconciliation_error: Option<String>,
}

impl ItemReport {
    pub fn new(item_id: WorkItemId, outcome: CallOutcome, attempts: u32) -> Self {
        Self { item_id, outcome, attempts, reconciliation_error: None }
    }
}
