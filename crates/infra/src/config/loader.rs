//! Configuration loader
//!
//! Builds a [`JobConfig`] from defaults, an optional file and the
//! environment, then validates it.
//!
//! ## Loading Strategy
//! 1. Start from [`JobConfig::default`]
//! 2. Replace with the config file, when one is given or found by probing
//! 3. Apply environment overrides on top
//! 4. Validate the result, including the cadence
//!
//! ## Environment Variables
//! - `PAYSCHED_CADENCE`: cron cadence (5 or 6 fields)
//! - `PAYSCHED_CONCURRENCY_CAP`: max concurrent provider calls
//! - `PAYSCHED_CALL_TIMEOUT_MS`, `PAYSCHED_GRACE_PERIOD_MS`,
//!   `PAYSCHED_RECONCILE_TIMEOUT_MS`, `PAYSCHED_FETCH_TIMEOUT_MS`
//! - `PAYSCHED_RETRY_ATTEMPTS` (alias `HttpClientRetryCount`)
//! - `PAYSCHED_RETRY_JITTER`: true/false
//! - `PAYSCHED_BREAKER_THRESHOLD` (alias
//!   `HttpClientExceptionsAllowedBeforeBreaking`)
//! - `PAYSCHED_BREAKER_COOLDOWN_MS`
//! - `PAYSCHED_PROVIDER_ENDPOINT`, `PAYSCHED_CURRENCY`
//! - `PAYSCHED_API_KEY_FILE`: read the API key from this file
//! - `PAYSCHED_API_KEY_ENV`: read the API key from this variable instead
//! - `PAYSCHED_ITEMS_PATH`, `PAYSCHED_LEDGER_PATH`
//!
//! The `PAYSCHED_*` name wins when both it and its alias are set.
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.toml` or `./config.json` (current working directory)
//! 2. `./paysched.toml` or `./paysched.json` (current working directory)
//! 3. The same names in the parent directory
//! 4. The same names next to the executable

use std::path::{Path, PathBuf};
use std::str::FromStr;

use paysched_domain::{JobConfig, PaySchedError, Result, SecretSource};

use crate::scheduling::scheduler_expression;

const CONFIG_FILE_NAMES: [&str; 4] = ["config.toml", "config.json", "paysched.toml", "paysched.json"];

/// Load configuration with automatic fallback strategy
///
/// An explicit `path` must exist. Without one, the first probed file is
/// used, or the defaults when nothing is found.
///
/// # Errors
/// Returns `PaySchedError::Config` if the file cannot be read or parsed, an
/// environment value is malformed, or the merged configuration is invalid.
pub fn load(path: Option<PathBuf>) -> Result<JobConfig> {
    let mut config = match path {
        Some(path) => load_from_file(Some(path))?,
        None => match probe_config_paths() {
            Some(found) => load_from_file(Some(found))?,
            None => {
                tracing::debug!("No config file found, using defaults");
                JobConfig::default()
            }
        },
    };

    apply_env_overrides(&mut config)?;
    validate(&config)?;
    Ok(config)
}

/// Load configuration from defaults plus environment variables only
///
/// # Errors
/// Returns `PaySchedError::Config` if a variable has an invalid value or the
/// result does not validate.
pub fn load_from_env() -> Result<JobConfig> {
    let mut config = JobConfig::default();
    apply_env_overrides(&mut config)?;
    validate(&config)?;
    tracing::info!("Configuration loaded from environment variables");
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations. Supports JSON and
/// TOML (detected by extension). Missing fields take their defaults. The
/// result is not validated; [`load`] validates after applying overrides.
///
/// # Errors
/// Returns `PaySchedError::Config` if no file is found or it cannot be
/// parsed.
pub fn load_from_file(path: Option<PathBuf>) -> Result<JobConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(PaySchedError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            PaySchedError::Config("No config file found in any of the standard locations".into())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| PaySchedError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Full validation: structure plus cadence syntax.
///
/// # Errors
/// Returns `PaySchedError::Config` describing the first problem found.
pub fn validate(config: &JobConfig) -> Result<()> {
    config.validate()?;
    scheduler_expression(&config.cadence)?;
    Ok(())
}

fn parse_config(contents: &str, path: &Path) -> Result<JobConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| PaySchedError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| PaySchedError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(PaySchedError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe the standard locations for a configuration file
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd.clone());
        dirs.push(cwd.join(".."));
    }
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            dirs.push(exe_dir.to_path_buf());
        }
    }

    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

/// Overlay `PAYSCHED_*` variables (and the legacy aliases) onto `config`.
///
/// # Errors
/// Returns `PaySchedError::Config` when a numeric variable does not parse.
pub fn apply_env_overrides(config: &mut JobConfig) -> Result<()> {
    if let Some(cadence) = env_string(&["PAYSCHED_CADENCE"]) {
        config.cadence = cadence;
    }
    set_parsed(&mut config.concurrency_cap, &["PAYSCHED_CONCURRENCY_CAP"])?;
    set_parsed(&mut config.call_timeout_ms, &["PAYSCHED_CALL_TIMEOUT_MS"])?;
    set_parsed(&mut config.grace_period_ms, &["PAYSCHED_GRACE_PERIOD_MS"])?;
    set_parsed(&mut config.reconcile_timeout_ms, &["PAYSCHED_RECONCILE_TIMEOUT_MS"])?;
    set_parsed(&mut config.fetch_timeout_ms, &["PAYSCHED_FETCH_TIMEOUT_MS"])?;

    set_parsed(
        &mut config.retry.max_attempts,
        &["PAYSCHED_RETRY_ATTEMPTS", "HttpClientRetryCount"],
    )?;
    config.retry.jitter = env_bool("PAYSCHED_RETRY_JITTER", config.retry.jitter);
    set_parsed(
        &mut config.breaker.failure_threshold,
        &["PAYSCHED_BREAKER_THRESHOLD", "HttpClientExceptionsAllowedBeforeBreaking"],
    )?;
    set_parsed(&mut config.breaker.cooldown_ms, &["PAYSCHED_BREAKER_COOLDOWN_MS"])?;

    if let Some(endpoint) = env_string(&["PAYSCHED_PROVIDER_ENDPOINT"]) {
        config.provider.endpoint = endpoint;
    }
    if let Some(currency) = env_string(&["PAYSCHED_CURRENCY"]) {
        config.provider.currency = currency;
    }

    if let Some(var) = env_string(&["PAYSCHED_API_KEY_ENV"]) {
        config.secret = SecretSource::Env { var };
    } else if let Some(path) = env_string(&["PAYSCHED_API_KEY_FILE"]) {
        config.secret = SecretSource::File { path: PathBuf::from(path) };
    }

    if let Some(path) = env_string(&["PAYSCHED_ITEMS_PATH"]) {
        config.storage.items_path = Some(PathBuf::from(path));
    }
    if let Some(path) = env_string(&["PAYSCHED_LEDGER_PATH"]) {
        config.storage.ledger_path = Some(PathBuf::from(path));
    }
    Ok(())
}

/// First non-empty value among `keys`.
fn env_string(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| std::env::var(key).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

fn set_parsed<T>(target: &mut T, keys: &[&str]) -> Result<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(key) = keys.iter().find(|key| {
        std::env::var(key).map(|v| !v.trim().is_empty()).unwrap_or(false)
    }) else {
        return Ok(());
    };
    let raw = std::env::var(key).unwrap_or_default();
    *target = raw
        .trim()
        .parse()
        .map_err(|e| PaySchedError::Config(format!("Invalid value for {key}: {e}")))?;
    Ok(())
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
