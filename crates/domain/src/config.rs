//! Job configuration structures
//!
//! Every field has a default so partial files and bare environments load.
//! Timeouts are stored in milliseconds and exposed as [`Duration`]s.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classification::ClassificationTable;
use crate::constants::{
    DEFAULT_API_KEY_FILE, DEFAULT_BACKOFF_INITIAL_MS, DEFAULT_BACKOFF_MAX_MS,
    DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_BREAKER_COOLDOWN_MS, DEFAULT_BREAKER_THRESHOLD,
    DEFAULT_CADENCE, DEFAULT_CALL_TIMEOUT_MS, DEFAULT_CONCURRENCY_CAP, DEFAULT_CURRENCY,
    DEFAULT_DESCRIPTION, DEFAULT_FETCH_TIMEOUT_MS, DEFAULT_GRACE_PERIOD_MS,
    DEFAULT_PROVIDER_ENDPOINT, DEFAULT_RECONCILE_TIMEOUT_MS, DEFAULT_RETRY_ATTEMPTS,
};
use crate::errors::{PaySchedError, Result};

/// Top-level configuration for the scheduled payment job.
///
/// Retries and the breaker share one endpoint: every failed attempt counts
/// toward `breaker.failure_threshold`. When the threshold is at or below
/// `retry.max_attempts` (the defaults, 5 and 6) a call that keeps failing
/// opens the circuit mid-run, and its remaining attempts fail fast with
/// `circuit-open` instead of reaching the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Cron cadence, five fields (or six with leading seconds)
    pub cadence: String,
    /// Maximum concurrent provider calls
    pub concurrency_cap: usize,
    /// Per-attempt provider timeout
    pub call_timeout_ms: u64,
    /// How long in-flight attempts may keep running after cancellation
    pub grace_period_ms: u64,
    /// Bound on each mark-complete / dead-letter write
    pub reconcile_timeout_ms: u64,
    /// Bound on fetching the batch
    pub fetch_timeout_ms: u64,
    pub retry: RetrySettings,
    pub breaker: BreakerSettings,
    pub provider: ProviderSettings,
    pub classification: ClassificationTable,
    pub secret: SecretSource,
    pub storage: StorageSettings,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            cadence: DEFAULT_CADENCE.to_string(),
            concurrency_cap: DEFAULT_CONCURRENCY_CAP,
            call_timeout_ms: DEFAULT_CALL_TIMEOUT_MS,
            grace_period_ms: DEFAULT_GRACE_PERIOD_MS,
            reconcile_timeout_ms: DEFAULT_RECONCILE_TIMEOUT_MS,
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            retry: RetrySettings::default(),
            breaker: BreakerSettings::default(),
            provider: ProviderSettings::default(),
            classification: ClassificationTable::default(),
            secret: SecretSource::default(),
            storage: StorageSettings::default(),
        }
    }
}

impl JobConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn reconcile_timeout(&self) -> Duration {
        Duration::from_millis(self.reconcile_timeout_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Structural checks. Cadence syntax is checked where it is parsed.
    pub fn validate(&self) -> Result<()> {
        if self.cadence.trim().is_empty() {
            return Err(PaySchedError::Config("cadence must not be empty".into()));
        }
        if self.concurrency_cap == 0 {
            return Err(PaySchedError::Config("concurrency_cap must be greater than 0".into()));
        }
        for (name, value) in [
            ("call_timeout_ms", self.call_timeout_ms),
            ("reconcile_timeout_ms", self.reconcile_timeout_ms),
            ("fetch_timeout_ms", self.fetch_timeout_ms),
        ] {
            if value == 0 {
                return Err(PaySchedError::Config(format!("{name} must be greater than 0")));
            }
        }
        self.retry.validate()?;
        self.breaker.validate()?;
        self.provider.validate()?;
        self.secret.validate()?;
        self.classification.validate()
    }
}

/// Retry behaviour for provider calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts including the first
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_ATTEMPTS,
            initial_backoff_ms: DEFAULT_BACKOFF_INITIAL_MS,
            max_backoff_ms: DEFAULT_BACKOFF_MAX_MS,
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            jitter: true,
        }
    }
}

impl RetrySettings {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(PaySchedError::Config("retry.max_attempts must be at least 1".into()));
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(PaySchedError::Config(
                "retry.initial_backoff_ms must not exceed retry.max_backoff_ms".into(),
            ));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(PaySchedError::Config("retry.multiplier must be >= 1.0".into()));
        }
        Ok(())
    }
}

/// Circuit breaker thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    /// Consecutive transient failures before opening
    pub failure_threshold: u64,
    pub cooldown_ms: u64,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self { failure_threshold: DEFAULT_BREAKER_THRESHOLD, cooldown_ms: DEFAULT_BREAKER_COOLDOWN_MS }
    }
}

impl BreakerSettings {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.failure_threshold == 0 {
            return Err(PaySchedError::Config(
                "breaker.failure_threshold must be greater than 0".into(),
            ));
        }
        if self.cooldown_ms == 0 {
            return Err(PaySchedError::Config("breaker.cooldown_ms must be greater than 0".into()));
        }
        Ok(())
    }
}

/// Where and how charges are posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub endpoint: String,
    pub currency: String,
    /// Prefix of the charge description; the item id is appended
    pub description: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_PROVIDER_ENDPOINT.to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
            description: DEFAULT_DESCRIPTION.to_string(),
        }
    }
}

impl ProviderSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.endpoint.starts_with("https://") || self.endpoint.starts_with("http://")) {
            return Err(PaySchedError::Config(format!(
                "provider.endpoint must be an http(s) URL, got `{}`",
                self.endpoint
            )));
        }
        if self.currency.trim().is_empty() {
            return Err(PaySchedError::Config("provider.currency must not be empty".into()));
        }
        Ok(())
    }
}

/// Where the provider API key comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SecretSource {
    /// First line of a file, trimmed
    File { path: PathBuf },
    /// A named environment variable
    Env { var: String },
}

impl Default for SecretSource {
    fn default() -> Self {
        Self::File { path: PathBuf::from(DEFAULT_API_KEY_FILE) }
    }
}

impl SecretSource {
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::File { path } if path.as_os_str().is_empty() => {
                Err(PaySchedError::Config("secret.path must not be empty".into()))
            }
            Self::Env { var } if var.trim().is_empty() => {
                Err(PaySchedError::Config("secret.var must not be empty".into()))
            }
            _ => Ok(()),
        }
    }
}

/// Local storage used by the bundled batch source and ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// JSON array of pending work items
    pub items_path: Option<PathBuf>,
    /// JSON-lines reconciliation ledger
    pub ledger_path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = JobConfig::default();
        assert_eq!(config.cadence, "*/1 * * * *");
        assert_eq!(config.retry.max_attempts, 6);
        assert_eq!(config.breaker.failure_threshold, 5);
        assert_eq!(config.concurrency_cap, 20);
        assert_eq!(config.provider.endpoint, "https://api.stripe.com/v1/charges");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: JobConfig = toml::from_str(
            r#"
            concurrency_cap = 4

            [retry]
            max_attempts = 3

            [secret]
            kind = "env"
            var = "PAYSCHED_API_KEY"
            "#,
        )
        .unwrap();

        assert_eq!(config.concurrency_cap, 4);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.initial_backoff_ms, 200);
        assert_eq!(config.secret, SecretSource::Env { var: "PAYSCHED_API_KEY".into() });
        assert_eq!(config.breaker, BreakerSettings::default());
    }

    #[test]
    fn validate_rejects_zero_limits() {
        let mut config = JobConfig { concurrency_cap: 0, ..JobConfig::default() };
        assert!(matches!(config.validate(), Err(PaySchedError::Config(_))));

        config.concurrency_cap = 1;
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());

        config.retry.max_attempts = 1;
        config.breaker.failure_threshold = 0;
        assert!(config.validate().is_err());

        config.breaker.failure_threshold = 1;
        config.provider.endpoint = "ftp://nope".into();
        assert!(config.validate().is_err());
    }
}
