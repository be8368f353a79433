//! Provider response classification
//!
//! Maps a provider status code, and optionally the provider's error code, to
//! an [`OutcomeKind`]. Rules are checked in order and the first match wins.

use serde::{Deserialize, Serialize};

use crate::errors::{PaySchedError, Result};
use crate::types::{CallOutcome, OutcomeKind, ProviderResponse};

/// One row of the table: an inclusive status range plus optional error codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRule {
    pub from: u16,
    pub to: u16,
    /// Empty matches any error code
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub error_codes: Vec<String>,
    pub outcome: OutcomeKind,
}

impl StatusRule {
    pub fn range(from: u16, to: u16, outcome: OutcomeKind) -> Self {
        Self { from, to, error_codes: Vec::new(), outcome }
    }

    pub fn status(status: u16, outcome: OutcomeKind) -> Self {
        Self::range(status, status, outcome)
    }

    #[must_use]
    pub fn with_codes(mut self, codes: &[&str]) -> Self {
        self.error_codes = codes.iter().map(|code| (*code).to_string()).collect();
        self
    }

    fn matches(&self, response: &ProviderResponse) -> bool {
        if !(self.from..=self.to).contains(&response.status) {
            return false;
        }
        self.error_codes.is_empty()
            || response
                .error_code
                .as_deref()
                .is_some_and(|code| self.error_codes.iter().any(|c| c == code))
    }
}

/// Ordered classification rules with a fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationTable {
    pub rules: Vec<StatusRule>,
    #[serde(default = "default_fallback")]
    pub fallback: OutcomeKind,
}

fn default_fallback() -> OutcomeKind {
    OutcomeKind::Permanent
}

/// Provider error codes that mean the card or account refused the charge.
const DECLINE_CODES: &[&str] = &[
    "card_declined",
    "expired_card",
    "incorrect_cvc",
    "incorrect_number",
    "insufficient_funds",
];

impl Default for ClassificationTable {
    fn default() -> Self {
        Self {
            rules: vec![
                StatusRule::range(200, 299, OutcomeKind::Success),
                StatusRule::status(402, OutcomeKind::Declined),
                StatusRule::range(400, 499, OutcomeKind::Declined).with_codes(DECLINE_CODES),
                StatusRule::status(408, OutcomeKind::Transient),
                StatusRule::status(409, OutcomeKind::Transient),
                StatusRule::status(429, OutcomeKind::Transient),
                StatusRule::range(500, 599, OutcomeKind::Transient),
                StatusRule::range(400, 499, OutcomeKind::Permanent),
            ],
            fallback: OutcomeKind::Permanent,
        }
    }
}

impl ClassificationTable {
    /// Reject inverted or out-of-range status ranges.
    pub fn validate(&self) -> Result<()> {
        for (index, rule) in self.rules.iter().enumerate() {
            if rule.from > rule.to {
                return Err(PaySchedError::Config(format!(
                    "classification rule {index}: range {}-{} is inverted",
                    rule.from, rule.to
                )));
            }
            if rule.from < 100 || rule.to > 599 {
                return Err(PaySchedError::Config(format!(
                    "classification rule {index}: range {}-{} is outside 100-599",
                    rule.from, rule.to
                )));
            }
        }
        Ok(())
    }

    pub fn kind_of(&self, response: &ProviderResponse) -> OutcomeKind {
        self.rules
            .iter()
            .find(|rule| rule.matches(response))
            .map_or(self.fallback, |rule| rule.outcome)
    }

    /// Turn a provider response into a call outcome.
    pub fn classify(&self, response: &ProviderResponse) -> CallOutcome {
        let detail = response
            .error_code
            .as_deref()
            .or(response.message.as_deref())
            .map_or_else(|| format!("status {}", response.status), str::to_string);

        match self.kind_of(response) {
            OutcomeKind::Success => CallOutcome::success(
                response.reference.clone().unwrap_or_else(|| "unknown".to_string()),
            ),
            OutcomeKind::Declined => CallOutcome::declined(detail),
            OutcomeKind::Transient => {
                CallOutcome::transient(format!("provider status {}: {detail}", response.status))
            }
            OutcomeKind::Permanent => {
                CallOutcome::permanent(format!("provider status {}: {detail}", response.status))
            }
        }
    }
}
