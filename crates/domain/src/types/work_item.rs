//! Work items fetched from the batch source

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Opaque work item identifier, integer or string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkItemId {
    Numeric(i64),
    Text(String),
}

impl fmt::Display for WorkItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for WorkItemId {
    fn from(id: i64) -> Self {
        Self::Numeric(id)
    }
}

impl From<&str> for WorkItemId {
    fn from(id: &str) -> Self {
        Self::Text(id.to_string())
    }
}

impl From<String> for WorkItemId {
    fn from(id: String) -> Self {
        Self::Text(id)
    }
}

/// A scheduled payment waiting to be charged.
///
/// Immutable once it enters a batch. `amount` is in major currency units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: WorkItemId,
    pub amount: Decimal,
    pub manager_id: i64,
    pub user_id: i64,
    /// Provider-side payment source (customer or card token)
    pub account_token: String,
    /// Set by the provider on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_reference: Option<String>,
}

impl WorkItem {
    pub fn new(id: impl Into<WorkItemId>, amount: Decimal, account_token: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            amount,
            manager_id: 0,
            user_id: 0,
            account_token: account_token.into(),
            provider_reference: None,
        }
    }

    #[must_use]
    pub fn with_owner(mut self, manager_id: i64, user_id: i64) -> Self {
        self.manager_id = manager_id;
        self.user_id = user_id;
        self
    }
}
