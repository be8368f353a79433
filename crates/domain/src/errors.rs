//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for paysched
///
/// Call failures are not errors: they travel as
/// [`CallOutcome`](crate::types::CallOutcome) values. This enum covers the
/// failures around the calls.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum PaySchedError {
    /// Invalid or missing configuration. Aborts startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The batch source could not produce pending items.
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// A mark-complete or dead-letter write failed.
    #[error("Reconciliation error: {0}")]
    Reconciliation(String),

    #[error("Secret error: {0}")]
    Secret(String),

    /// A charge request broke the caller's contract.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PaySchedError {
    /// Whether this error should stop the job rather than a single round.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Result type alias for paysched operations
pub type Result<T> = std::result::Result<T, PaySchedError>;
