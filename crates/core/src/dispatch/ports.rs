//! Port interfaces for charging and reconciliation

use async_trait::async_trait;
use paysched_domain::{
    ChargeRequest, ProviderResponse, ReconciliationAction, Result, TransportError, WorkItemId,
};

/// Posts a charge to the payment provider.
///
/// Any response that reached the provider is `Ok`, whatever its status.
/// `Err` means the request never produced a response.
#[async_trait]
pub trait ChargeGateway: Send + Sync {
    async fn submit(
        &self,
        endpoint: &str,
        request: &ChargeRequest,
        api_key: &str,
    ) -> std::result::Result<ProviderResponse, TransportError>;
}

/// System of record for charge results
#[async_trait]
pub trait ReconciliationSink: Send + Sync {
    /// Record a successful charge against the item
    async fn mark_complete(&self, id: &WorkItemId, provider_reference: &str) -> Result<()>;

    /// Park the item for manual follow-up
    async fn dead_letter(&self, id: &WorkItemId, reason: &str) -> Result<()>;

    /// Apply a reconciliation action
    async fn apply(&self, id: &WorkItemId, action: &ReconciliationAction) -> Result<()> {
        match action {
            ReconciliationAction::MarkComplete { provider_reference } => {
                self.mark_complete(id, provider_reference).await
            }
            ReconciliationAction::DeadLetter { reason } => self.dead_letter(id, reason).await,
        }
    }
}

/// Supplies the provider API key
#[async_trait]
pub trait SecretProvider: Send + Sync {
    async fn api_key(&self) -> Result<String>;
}
