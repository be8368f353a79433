//! Charge requests and raw provider responses

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::work_item::{WorkItem, WorkItemId};
use crate::constants::IDEMPOTENCY_KEY_PREFIX;
use crate::errors::{PaySchedError, Result};

/// Minor units per major unit for two-decimal currencies.
const MINOR_UNITS: i64 = 100;

/// Form body sent to the provider for one work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeRequest {
    /// Stable per item and amount, so retries never double charge
    pub idempotency_key: String,
    pub item_id: WorkItemId,
    /// Amount in minor units (cents)
    pub amount_minor: i64,
    pub currency: String,
    /// Account token charged
    pub source: String,
    pub description: String,
}

impl ChargeRequest {
    /// Build the request for `item`.
    ///
    /// Fails when the amount cannot be expressed exactly in minor units.
    pub fn from_item(item: &WorkItem, currency: &str, description: &str) -> Result<Self> {
        let amount_minor = to_minor_units(item.amount)?;
        Ok(Self {
            idempotency_key: format!("{IDEMPOTENCY_KEY_PREFIX}:{}:{amount_minor}", item.id),
            item_id: item.id.clone(),
            amount_minor,
            currency: currency.to_string(),
            source: item.account_token.clone(),
            description: format!("{description} {}", item.id),
        })
    }

    /// Check the request is well formed before it goes on the wire.
    pub fn validate(&self) -> Result<()> {
        if self.amount_minor <= 0 {
            return Err(PaySchedError::InvalidRequest(format!(
                "amount must be positive, got {}",
                self.amount_minor
            )));
        }
        if self.source.trim().is_empty() {
            return Err(PaySchedError::InvalidRequest("account token is empty".into()));
        }
        if self.currency.trim().is_empty() {
            return Err(PaySchedError::InvalidRequest("currency is empty".into()));
        }
        Ok(())
    }

    /// Form fields in provider order.
    pub fn form_fields(&self) -> [(&'static str, String); 4] {
        [
            ("amount", self.amount_minor.to_string()),
            ("currency", self.currency.clone()),
            ("source", self.source.clone()),
            ("description", self.description.clone()),
        ]
    }
}

fn to_minor_units(amount: Decimal) -> Result<i64> {
    let minor = amount
        .checked_mul(Decimal::from(MINOR_UNITS))
        .ok_or_else(|| PaySchedError::InvalidRequest(format!("amount {amount} overflows")))?;
    if !minor.fract().is_zero() {
        return Err(PaySchedError::InvalidRequest(format!(
            "amount {amount} has more precision than the currency allows"
        )));
    }
    minor
        .to_i64()
        .ok_or_else(|| PaySchedError::InvalidRequest(format!("amount {amount} out of range")))
}

/// What came back from the provider when the request reached it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub status: u16,
    /// Provider charge id on success
    pub reference: Option<String>,
    pub error_code: Option<String>,
    pub message: Option<String>,
}

impl ProviderResponse {
    pub fn ok(reference: impl Into<String>) -> Self {
        Self { status: 200, reference: Some(reference.into()), error_code: None, message: None }
    }

    pub fn error(status: u16, code: Option<&str>, message: Option<&str>) -> Self {
        Self {
            status,
            reference: None,
            error_code: code.map(str::to_string),
            message: message.map(str::to_string),
        }
    }
}

/// The request did not produce a provider response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("transport failure: {0}")]
    Other(String),
}
