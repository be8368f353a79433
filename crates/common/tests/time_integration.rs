//! Integration tests for cadence parsing

#![cfg(feature = "foundation")]

use chrono::{TimeZone, Utc};
use paysched_common::time::{CronExpression, CronParseError};

/// Validates the documented default cadence and its scheduler form.
///
/// # Test Steps
/// 1. Parse `*/1 * * * *`
/// 2. Convert to the six-field scheduler expression
/// 3. Verify consecutive occurrences are one minute apart at second zero
#[test]
fn test_default_cadence_fires_every_minute() {
    let cron = CronExpression::parse("*/1 * * * *").expect("default cadence parses");
    assert_eq!(cron.to_scheduler_expression(), "0 */1 * * * *");

    let start = Utc.with_ymd_and_hms(2025, 3, 9, 23, 59, 12).unwrap();
    let first = cron.next_after(&start).expect("next occurrence");
    let second = cron.next_after(&first).expect("following occurrence");

    assert_eq!(first, Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap());
    assert_eq!(second - first, chrono::Duration::minutes(1));
}

#[test]
fn test_weekday_schedule_skips_weekend() {
    // 09:30 on weekdays
    let cron = CronExpression::parse("30 9 * * 1-5").expect("parses");
    // Saturday 2025-03-08
    let saturday = Utc.with_ymd_and_hms(2025, 3, 8, 10, 0, 0).unwrap();

    let next = cron.next_after(&saturday).expect("next occurrence");
    assert_eq!(next, Utc.with_ymd_and_hms(2025, 3, 10, 9, 30, 0).unwrap());
}

#[test]
fn test_rejects_malformed_cadence() {
    assert!(matches!(
        CronExpression::parse("* * * * * * *"),
        Err(CronParseError::FieldCount(7))
    ));
    assert!(matches!(
        CronExpression::parse("0 0 32 * *"),
        Err(CronParseError::InvalidField { name: "day", .. })
    ));
}
