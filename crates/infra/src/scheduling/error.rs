//! Scheduler error types

use std::time::Duration;

use paysched_domain::PaySchedError;
use thiserror::Error;
use tokio::task::JoinError;
use tokio::time::error::Elapsed;
use tokio_cron_scheduler::JobSchedulerError;

use crate::errors::InfraError;

/// Scheduler-specific errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Scheduler is already running
    #[error("Scheduler already running")]
    AlreadyRunning,

    /// Scheduler is not running
    #[error("Scheduler not running")]
    NotRunning,

    /// Cadence could not be parsed
    #[error("Invalid cadence `{cadence}`: {reason}")]
    InvalidCadence { cadence: String, reason: String },

    /// Failed to create scheduler
    #[error("Failed to create scheduler: {source}")]
    CreationFailed {
        #[source]
        source: JobSchedulerError,
    },

    /// Failed to start scheduler
    #[error("Failed to start scheduler: {source}")]
    StartFailed {
        #[source]
        source: JobSchedulerError,
    },

    /// Failed to stop scheduler
    #[error("Failed to stop scheduler: {source}")]
    StopFailed {
        #[source]
        source: JobSchedulerError,
    },

    /// Failed to register job
    #[error("Failed to register job: {source}")]
    JobRegistrationFailed {
        #[source]
        source: JobSchedulerError,
    },

    /// Operation timed out
    #[error("Operation timed out after {}ms", duration.as_millis())]
    Timeout {
        duration: Duration,
        #[source]
        source: Elapsed,
    },

    /// Task join failed
    #[error("Task join failed: {0}")]
    TaskJoinFailed(#[from] JoinError),
}

impl From<SchedulerError> for InfraError {
    fn from(err: SchedulerError) -> Self {
        let paysched_err = match err {
            SchedulerError::InvalidCadence { .. } => PaySchedError::Config(err.to_string()),
            SchedulerError::AlreadyRunning | SchedulerError::NotRunning => {
                PaySchedError::InvalidRequest(err.to_string())
            }
            _ => PaySchedError::Internal(err.to_string()),
        };
        InfraError(paysched_err)
    }
}

impl From<SchedulerError> for PaySchedError {
    fn from(err: SchedulerError) -> Self {
        InfraError::from(err).into()
    }
}

/// Convenience type alias for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_to_domain_errors() {
        let cadence =
            SchedulerError::InvalidCadence { cadence: "nope".into(), reason: "bad".into() };
        assert!(matches!(PaySchedError::from(cadence), PaySchedError::Config(_)));
        assert!(matches!(
            PaySchedError::from(SchedulerError::AlreadyRunning),
            PaySchedError::InvalidRequest(_)
        ));
    }
}
