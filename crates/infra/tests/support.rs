//! Shared helpers for `paysched-infra` integration tests.
//!
//! Builds a real pipeline (HTTP gateway, file secret, JSON source, JSONL
//! ledger) in a temporary directory, pointed at a `wiremock` provider.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use paysched_core::{BatchSource, ReconciliationSink, ScheduledJob};
use paysched_domain::{JobConfig, RetrySettings, SecretSource, StorageSettings};
use paysched_infra::http::{HttpChargeGateway, HttpClient};
use paysched_infra::pipeline::{build_job, Adapters};
use paysched_infra::secrets;
use paysched_infra::storage::{JsonFileBatchSource, JsonlLedger};
use serde_json::Value;
use tempfile::TempDir;
use wiremock::MockServer;

pub const API_KEY: &str = "sk_test_123";
pub const CHARGES_PATH: &str = "/v1/charges";

/// Temporary directory holding the item file, key file and ledger.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        std::fs::write(dir.path().join("api_key.txt"), format!("{API_KEY}\n")).expect("key file");
        Self { dir }
    }

    pub fn items_path(&self) -> PathBuf {
        self.dir.path().join("items.json")
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.dir.path().join("ledger.jsonl")
    }

    pub fn key_path(&self) -> PathBuf {
        self.dir.path().join("api_key.txt")
    }

    pub fn write_items(&self, items: &[Value]) {
        let body = serde_json::to_string(items).expect("items json");
        std::fs::write(self.items_path(), body).expect("items file");
    }
}

/// Configuration with fast backoff, aimed at `server`.
pub fn config_for(server: &MockServer, workspace: &Workspace) -> JobConfig {
    let mut config = JobConfig {
        concurrency_cap: 4,
        call_timeout_ms: 500,
        grace_period_ms: 200,
        reconcile_timeout_ms: 1_000,
        fetch_timeout_ms: 1_000,
        retry: RetrySettings {
            max_attempts: 3,
            initial_backoff_ms: 10,
            max_backoff_ms: 40,
            multiplier: 2.0,
            jitter: false,
        },
        secret: SecretSource::File { path: workspace.key_path() },
        storage: StorageSettings {
            items_path: Some(workspace.items_path()),
            ledger_path: Some(workspace.ledger_path()),
        },
        ..JobConfig::default()
    };
    config.provider.endpoint = format!("{}{CHARGES_PATH}", server.uri());
    config
}

/// Real pipeline over the workspace files.
pub fn build(config: &JobConfig, workspace: &Workspace) -> (Arc<ScheduledJob>, Arc<JsonlLedger>) {
    let ledger = Arc::new(JsonlLedger::new(workspace.ledger_path()));
    let source = JsonFileBatchSource::new(workspace.items_path()).with_ledger(Arc::clone(&ledger));
    let adapters = Adapters {
        gateway: Arc::new(HttpChargeGateway::new(HttpClient::new().expect("http client"))),
        secrets: secrets::from_source(&config.secret),
        sink: Arc::clone(&ledger) as Arc<dyn ReconciliationSink>,
    };
    let job = build_job("integration", config, Arc::new(source) as Arc<dyn BatchSource>, adapters)
        .expect("job");
    (Arc::new(job), ledger)
}

pub fn item(id: i64, amount: &str, token: &str) -> Value {
    serde_json::json!({
        "id": id,
        "amount": amount,
        "manager_id": 1,
        "user_id": 100 + id,
        "account_token": token,
    })
}
