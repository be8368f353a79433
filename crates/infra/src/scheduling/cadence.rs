//! Cadence parsing for the cron trigger

use paysched_common::CronExpression;

use super::error::{SchedulerError, SchedulerResult};

/// Parse a five- or six-field cadence and return the six-field form the
/// cron runtime expects (seconds first).
pub fn scheduler_expression(cadence: &str) -> SchedulerResult<String> {
    CronExpression::parse(cadence)
        .map(|expr| expr.to_scheduler_expression())
        .map_err(|e| SchedulerError::InvalidCadence {
            cadence: cadence.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_fields_gain_a_seconds_column() {
        assert_eq!(scheduler_expression("*/1 * * * *").unwrap(), "0 */1 * * * *");
    }

    #[test]
    fn six_fields_pass_through() {
        assert_eq!(scheduler_expression("*/1 * * * * *").unwrap(), "*/1 * * * * *");
    }

    #[test]
    fn rejects_garbage() {
        for bad in ["", "every minute", "61 * * * *", "* * *"] {
            let err = scheduler_expression(bad).unwrap_err();
            assert!(matches!(err, SchedulerError::InvalidCadence { .. }), "{bad}");
        }
    }
}
