//! Cron cadence parsing
//!
//! Accepts the classic five-field form (`minute hour day month weekday`) and
//! the six-field form with a leading seconds field used by
//! `tokio-cron-scheduler`. Whatever form was parsed, [`CronExpression`] can
//! render the six-field form the scheduler expects.

use std::fmt;

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use thiserror::Error;

/// Error type for cron parsing
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CronParseError {
    #[error("empty cron expression")]
    Empty,

    #[error("invalid field `{field}` ({name}): {reason}")]
    InvalidField { name: &'static str, field: String, reason: String },

    #[error("expected 5 or 6 fields, got {0}")]
    FieldCount(usize),
}

#[derive(Debug, Clone, Copy)]
struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
}

const SECOND: FieldSpec = FieldSpec { name: "second", min: 0, max: 59 };
const MINUTE: FieldSpec = FieldSpec { name: "minute", min: 0, max: 59 };
const HOUR: FieldSpec = FieldSpec { name: "hour", min: 0, max: 23 };
const DAY: FieldSpec = FieldSpec { name: "day", min: 1, max: 31 };
const MONTH: FieldSpec = FieldSpec { name: "month", min: 1, max: 12 };
const WEEKDAY: FieldSpec = FieldSpec { name: "weekday", min: 0, max: 6 };

/// A parsed cron expression
///
/// # Examples
///
/// ```
/// use paysched_common::time::cron::CronExpression;
///
/// // Top of every minute
/// let cron = CronExpression::parse("*/1 * * * *").unwrap();
/// assert_eq!(cron.to_scheduler_expression(), "0 */1 * * * *");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpression {
    second: CronField,
    minute: CronField,
    hour: CronField,
    day: CronField,
    month: CronField,
    weekday: CronField,
}

impl CronExpression {
    /// Parse a five- or six-field cron expression
    pub fn parse(expr: &str) -> Result<Self, CronParseError> {
        let parts: Vec<&str> = expr.split_whitespace().collect();

        let (second, rest) = match parts.len() {
            0 => return Err(CronParseError::Empty),
            5 => (CronField::Single(0), &parts[..]),
            6 => (CronField::parse(parts[0], SECOND)?, &parts[1..]),
            n => return Err(CronParseError::FieldCount(n)),
        };

        Ok(Self {
            second,
            minute: CronField::parse(rest[0], MINUTE)?,
            hour: CronField::parse(rest[1], HOUR)?,
            day: CronField::parse(rest[2], DAY)?,
            month: CronField::parse(rest[3], MONTH)?,
            weekday: CronField::parse(rest[4], WEEKDAY)?,
        })
    }

    /// Six-field form with seconds first, as `tokio-cron-scheduler` wants it.
    pub fn to_scheduler_expression(&self) -> String {
        format!("{} {}", self.second, self.without_seconds())
    }

    fn without_seconds(&self) -> String {
        format!("{} {} {} {} {}", self.minute, self.hour, self.day, self.month, self.weekday)
    }

    /// Check if a datetime matches this cron expression
    pub fn matches(&self, dt: &DateTime<Utc>) -> bool {
        self.second.matches(dt.second())
            && self.minute.matches(dt.minute())
            && self.hour.matches(dt.hour())
            && self.day.matches(dt.day())
            && self.month.matches(dt.month())
            && self.weekday.matches(dt.weekday().num_days_from_sunday())
    }

    /// Next matching whole second strictly after `dt`, searching at most
    /// four years ahead.
    pub fn next_after(&self, dt: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut current = dt.with_nanosecond(0)? + Duration::seconds(1);
        let horizon = *dt + Duration::days(4 * 365);

        while current <= horizon {
            if !self.minute_matches(&current) {
                // Jump to the start of the next minute.
                current = current.with_second(0)? + Duration::minutes(1);
                continue;
            }
            if self.second.matches(current.second()) {
                return Some(current);
            }
            current += Duration::seconds(1);
        }

        None
    }

    fn minute_matches(&self, dt: &DateTime<Utc>) -> bool {
        self.minute.matches(dt.minute())
            && self.hour.matches(dt.hour())
            && self.day.matches(dt.day())
            && self.month.matches(dt.month())
            && self.weekday.matches(dt.weekday().num_days_from_sunday())
    }
}

impl fmt::Display for CronExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.second == CronField::Single(0) {
            f.write_str(&self.without_seconds())
        } else {
            f.write_str(&self.to_scheduler_expression())
        }
    }
}

impl std::str::FromStr for CronExpression {
    type Err = CronParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CronField {
    Any,
    Single(u32),
    List(Vec<u32>),
    Range(u32, u32),
    /// `start-end/step`; `*/n` is stored with the field's bounds
    Step { start: u32, end: u32, step: u32, wildcard: bool },
}

impl CronField {
    fn parse(s: &str, spec: FieldSpec) -> Result<Self, CronParseError> {
        let invalid = |reason: String| CronParseError::InvalidField {
            name: spec.name,
            field: s.to_string(),
            reason,
        };
        let number = |raw: &str| -> Result<u32, CronParseError> {
            let value: u32 =
                raw.trim().parse().map_err(|_| invalid(format!("`{raw}` is not a number")))?;
            if value < spec.min || value > spec.max {
                return Err(invalid(format!("{value} not in range {}-{}", spec.min, spec.max)));
            }
            Ok(value)
        };

        if s == "*" {
            return Ok(CronField::Any);
        }

        if s.contains(',') {
            let values = s.split(',').map(number).collect::<Result<Vec<_>, _>>()?;
            return Ok(CronField::List(values));
        }

        if let Some((base, step)) = s.split_once('/') {
            let step: u32 = step.parse().map_err(|_| invalid(format!("bad step `{step}`")))?;
            if step == 0 {
                return Err(invalid("step must be greater than 0".to_string()));
            }
            let (start, end, wildcard) = match base {
                "*" => (spec.min, spec.max, true),
                _ => match base.split_once('-') {
                    Some((start, end)) => (number(start)?, number(end)?, false),
                    None => (number(base)?, spec.max, false),
                },
            };
            if start > end {
                return Err(invalid(format!("{start}-{end} is an empty range")));
            }
            return Ok(CronField::Step { start, end, step, wildcard });
        }

        if let Some((start, end)) = s.split_once('-') {
            let (start, end) = (number(start)?, number(end)?);
            if start > end {
                return Err(invalid(format!("{start}-{end} is an empty range")));
            }
            return Ok(CronField::Range(start, end));
        }

        number(s).map(CronField::Single)
    }

    fn matches(&self, value: u32) -> bool {
        match self {
            CronField::Any => true,
            CronField::Single(v) => *v == value,
            CronField::List(values) => values.contains(&value),
            CronField::Range(start, end) => (*start..=*end).contains(&value),
            CronField::Step { start, end, step, .. } => {
                (*start..=*end).contains(&value) && (value - start) % step == 0
            }
        }
    }
}

impl fmt::Display for CronField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CronField::Any => write!(f, "*"),
            CronField::Single(v) => write!(f, "{v}"),
            CronField::List(values) => {
                let strs: Vec<String> = values.iter().map(ToString::to_string).collect();
                write!(f, "{}", strs.join(","))
            }
            CronField::Range(start, end) => write!(f, "{start}-{end}"),
            CronField::Step { step, wildcard: true, .. } => write!(f, "*/{step}"),
            CronField::Step { start, end, step, .. } => write!(f, "{start}-{end}/{step}"),
        }
    }
}
