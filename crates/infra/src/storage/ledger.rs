//! Reconciliation ledgers
//!
//! [`JsonlLedger`] appends one JSON line per reconciliation write;
//! [`InMemoryLedger`] keeps the same entries in memory.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use parking_lot::Mutex;
use paysched_core::ReconciliationSink;
use paysched_domain::{PaySchedError, ReconciliationAction, Result, WorkItemId};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// One reconciliation write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub item_id: WorkItemId,
    #[serde(flatten)]
    pub action: ReconciliationAction,
    /// Unix epoch milliseconds
    pub recorded_at_ms: u64,
}

impl LedgerEntry {
    fn now(item_id: &WorkItemId, action: ReconciliationAction) -> Self {
        let recorded_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX));
        Self { item_id: item_id.clone(), action, recorded_at_ms }
    }
}

/// Append-only JSON-lines ledger.
///
/// Writes are serialized so concurrent items never interleave lines.
#[derive(Debug)]
pub struct JsonlLedger {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonlLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: tokio::sync::Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every entry. A missing file is an empty ledger; unparsable lines
    /// are skipped.
    pub async fn entries(&self) -> Result<Vec<LedgerEntry>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(PaySchedError::Reconciliation(format!(
                    "Failed to read ledger {}: {e}",
                    self.path.display()
                )))
            }
        };

        Ok(contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(entry) => Some(entry),
                Err(error) => {
                    warn!(%error, "Skipping malformed ledger line");
                    None
                }
            })
            .collect())
    }

    /// Ids that already have a terminal entry.
    pub async fn settled_ids(&self) -> Result<HashSet<WorkItemId>> {
        Ok(self.entries().await?.into_iter().map(|entry| entry.item_id).collect())
    }

    async fn append(&self, entry: &LedgerEntry) -> Result<()> {
        let mut line = serde_json::to_string(entry)
            .map_err(|e| PaySchedError::Internal(format!("Failed to encode ledger entry: {e}")))?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.write_error(&e))?;
        file.write_all(line.as_bytes()).await.map_err(|e| self.write_error(&e))?;
        file.flush().await.map_err(|e| self.write_error(&e))?;

        debug!(item = %entry.item_id, path = %self.path.display(), "Ledger entry written");
        Ok(())
    }

    fn write_error(&self, error: &std::io::Error) -> PaySchedError {
        PaySchedError::Reconciliation(format!(
            "Failed to write ledger {}: {error}",
            self.path.display()
        ))
    }
}

#[async_trait]
impl ReconciliationSink for JsonlLedger {
    async fn mark_complete(&self, id: &WorkItemId, provider_reference: &str) -> Result<()> {
        let action = ReconciliationAction::MarkComplete {
            provider_reference: provider_reference.to_string(),
        };
        self.append(&LedgerEntry::now(id, action)).await
    }

    async fn dead_letter(&self, id: &WorkItemId, reason: &str) -> Result<()> {
        let action = ReconciliationAction::DeadLetter { reason: reason.to_string() };
        self.append(&LedgerEntry::now(id, action)).await
    }
}

/// Ledger kept in memory, for run-once mode and tests.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    entries: Mutex<Vec<LedgerEntry>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl ReconciliationSink for InMemoryLedger {
    async fn mark_complete(&self, id: &WorkItemId, provider_reference: &str) -> Result<()> {
        let action = ReconciliationAction::MarkComplete {
            provider_reference: provider_reference.to_string(),
        };
        self.entries.lock().push(LedgerEntry::now(id, action));
        Ok(())
    }

    async fn dead_letter(&self, id: &WorkItemId, reason: &str) -> Result<()> {
        let action = ReconciliationAction::DeadLetter { reason: reason.to_string() };
        self.entries.lock().push(LedgerEntry::now(id, action));
        Ok(())
    }
}
