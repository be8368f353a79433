//! Batch source backed by a JSON file of work items

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use paysched_core::BatchSource;
use paysched_domain::{PaySchedError, Result, WorkItem};
use tracing::debug;

use super::ledger::JsonlLedger;

/// Reads a JSON array of [`WorkItem`]s on every fetch.
///
/// Items that already carry a provider reference are done. With a ledger
/// attached, items the ledger has already settled are left out too, so a
/// replayed file never charges twice.
#[derive(Debug, Clone)]
pub struct JsonFileBatchSource {
    path: PathBuf,
    ledger: Option<Arc<JsonlLedger>>,
}

impl JsonFileBatchSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), ledger: None }
    }

    #[must_use]
    pub fn with_ledger(mut self, ledger: Arc<JsonlLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }
}

#[async_trait]
impl BatchSource for JsonFileBatchSource {
    async fn fetch_pending_items(&self) -> Result<Vec<WorkItem>> {
        let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            PaySchedError::Fetch(format!("Failed to read {}: {e}", self.path.display()))
        })?;
        let items: Vec<WorkItem> = serde_json::from_str(&contents).map_err(|e| {
            PaySchedError::Fetch(format!("Invalid work item file {}: {e}", self.path.display()))
        })?;

        let settled = match &self.ledger {
            Some(ledger) => ledger.settled_ids().await.map_err(|e| {
                PaySchedError::Fetch(format!("Failed to read ledger: {e}"))
            })?,
            None => Default::default(),
        };

        let total = items.len();
        let pending: Vec<WorkItem> = items
            .into_iter()
            .filter(|item| item.provider_reference.is_none() && !settled.contains(&item.id))
            .collect();

        debug!(total, pending = pending.len(), path = %self.path.display(), "Loaded work items");
        Ok(pending)
    }
}
