//! Application constants
//!
//! Defaults shared by configuration, the daemon and tests.

// Scheduling
pub const DEFAULT_CADENCE: &str = "*/1 * * * *";

// Resilience
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 6;
pub const DEFAULT_BREAKER_THRESHOLD: u64 = 5;
pub const DEFAULT_BREAKER_COOLDOWN_MS: u64 = 30_000;
pub const DEFAULT_BACKOFF_INITIAL_MS: u64 = 200;
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 10_000;
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_CONCURRENCY_CAP: usize = 20;

// Timeouts
pub const DEFAULT_CALL_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_GRACE_PERIOD_MS: u64 = 5_000;
pub const DEFAULT_RECONCILE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 30_000;

// Provider
pub const DEFAULT_PROVIDER_ENDPOINT: &str = "https://api.stripe.com/v1/charges";
pub const DEFAULT_CURRENCY: &str = "usd";
pub const DEFAULT_DESCRIPTION: &str = "Scheduled payment";
pub const DEFAULT_API_KEY_FILE: &str = "StripeApiKey.txt";
pub const IDEMPOTENCY_KEY_PREFIX: &str = "paysched";

// Outcome causes
pub const CAUSE_CIRCUIT_OPEN: &str = "circuit-open";
pub const CAUSE_CANCELLED: &str = "cancelled";
pub const CAUSE_TASK_ABORTED: &str = "task-aborted";
pub const CAUSE_TIMEOUT: &str = "timeout";
pub const CAUSE_CREDENTIALS_UNAVAILABLE: &str = "credentials unavailable";
pub const DECLINED_REASON_PREFIX: &str = "declined";
pub const RECONCILIATION_FAILED_PREFIX: &str = "reconciliation failed";
