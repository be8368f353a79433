//! Port interfaces for the scheduled job

use std::sync::Arc;

use async_trait::async_trait;
use paysched_domain::{Result, WorkItem};

use super::scheduled_job::ScheduledJob;

/// Source of pending work items
#[async_trait]
pub trait BatchSource: Send + Sync {
    /// Items due for charging now. An error skips the round.
    async fn fetch_pending_items(&self) -> Result<Vec<WorkItem>>;
}

/// Fires a [`ScheduledJob`] on some cadence.
#[async_trait]
pub trait JobTrigger: Send + Sync {
    /// Begin triggering `job`.
    async fn start(&self, job: Arc<ScheduledJob>) -> Result<()>;

    /// Stop triggering and cancel the round in progress, if any.
    async fn stop(&self) -> Result<()>;
}
