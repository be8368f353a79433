//! Integration tests for configuration loader
//!
//! Tests the end-to-end behavior of loading configuration from files.

use std::path::PathBuf;
use std::time::Duration;

use paysched_domain::{OutcomeKind, PaySchedError, ProviderResponse, SecretSource};
use paysched_infra::config;
use paysched_infra::scheduling::{CronScheduler, CronSchedulerConfig};
use tempfile::TempDir;

const FULL_TOML: &str = r#"
cadence = "*/2 * * * *"
concurrency_cap = 10
call_timeout_ms = 8000
grace_period_ms = 3000
reconcile_timeout_ms = 4000
fetch_timeout_ms = 20000

[retry]
max_attempts = 4
initial_backoff_ms = 100
max_backoff_ms = 5000
multiplier = 3.0
jitter = false

[breaker]
failure_threshold = 7
cooldown_ms = 60000

[provider]
endpoint = "https://payments.internal/v1/charges"
currency = "gbp"
description = "Monthly fee"

[secret]
kind = "env"
var = "PROVIDER_API_KEY"

[storage]
items_path = "/var/lib/paysched/items.json"
ledger_path = "/var/lib/paysched/ledger.jsonl"

[classification]
fallback = "transient"

[[classification.rules]]
from = 200
to = 299
outcome = "success"

[[classification.rules]]
from = 400
to = 499
error_codes = ["card_declined"]
outcome = "declined"

[[classification.rules]]
from = 400
to = 499
outcome = "permanent"
"#;

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).expect("write config");
    path
}

#[test]
fn test_load_full_toml_file() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "paysched.toml", FULL_TOML);

    let config = config::load_from_file(Some(path)).expect("config loads");
    config::validate(&config).expect("config validates");

    assert_eq!(config.cadence, "*/2 * * * *");
    assert_eq!(config.concurrency_cap, 10);
    assert_eq!(config.call_timeout(), Duration::from_secs(8));
    assert_eq!(config.grace_period(), Duration::from_secs(3));
    assert_eq!(config.retry.max_attempts, 4);
    assert!(!config.retry.jitter);
    assert_eq!(config.breaker.failure_threshold, 7);
    assert_eq!(config.breaker.cooldown(), Duration::from_secs(60));
    assert_eq!(config.provider.currency, "gbp");
    assert_eq!(config.secret, SecretSource::Env { var: "PROVIDER_API_KEY".into() });
    assert_eq!(config.storage.items_path, Some(PathBuf::from("/var/lib/paysched/items.json")));

    let table = &config.classification;
    assert_eq!(table.rules.len(), 3);
    assert_eq!(
        table.kind_of(&ProviderResponse::error(402, Some("card_declined"), None)),
        OutcomeKind::Declined
    );
    assert_eq!(table.kind_of(&ProviderResponse::error(404, None, None)), OutcomeKind::Permanent);
    assert_eq!(table.kind_of(&ProviderResponse::error(503, None, None)), OutcomeKind::Transient);
}

#[test]
fn test_partial_json_file_keeps_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "config.json", r#"{"concurrency_cap": 3}"#);

    let config = config::load_from_file(Some(path)).unwrap();
    let defaults = paysched_domain::JobConfig::default();

    assert_eq!(config.concurrency_cap, 3);
    assert_eq!(config.cadence, defaults.cadence);
    assert_eq!(config.retry, defaults.retry);
    assert_eq!(config.classification, defaults.classification);
}

#[test]
fn test_invalid_values_are_config_errors() {
    let dir = TempDir::new().unwrap();
    let cases = [
        ("zero_cap.toml", "concurrency_cap = 0"),
        ("zero_attempts.toml", "[retry]\nmax_attempts = 0"),
        ("zero_threshold.toml", "[breaker]\nfailure_threshold = 0"),
        ("bad_cadence.toml", "cadence = \"whenever\""),
        (
            "inverted_rule.toml",
            "[[classification.rules]]\nfrom = 500\nto = 400\noutcome = \"transient\"",
        ),
    ];

    for (name, contents) in cases {
        let path = write(&dir, name, contents);
        let result = config::load_from_file(Some(path)).and_then(|c| config::validate(&c));
        assert!(matches!(result, Err(PaySchedError::Config(_))), "{name} should be rejected");
    }
}

#[test]
fn test_malformed_toml_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "broken.toml", "cadence = ");
    assert!(matches!(config::load_from_file(Some(path)), Err(PaySchedError::Config(_))));
}

#[test]
fn test_loaded_cadence_drives_scheduler() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "paysched.toml", FULL_TOML);
    let config = config::load_from_file(Some(path)).unwrap();

    let scheduler = CronScheduler::new(CronSchedulerConfig::from_job_config(&config)).unwrap();
    assert_eq!(scheduler.expression(), "0 */2 * * * *");
}
