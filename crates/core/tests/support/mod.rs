//! Shared test helpers for `paysched-core` integration tests.
//!
//! Lightweight in-memory implementations of every port plus a builder that
//! wires them into a dispatcher.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use paysched_common::resilience::{
    BackoffStrategy, Breaker, Bulkhead, BulkheadConfig, CircuitBreaker, CircuitBreakerConfig,
    Jitter, RetryConfig,
};
use paysched_common::testing::ConcurrencyGauge;
use paysched_core::{
    BatchSource, CallerSettings, ChargeGateway, FanOutDispatcher, ItemProcessor,
    ProcessorSettings, ReconciliationSink, ResilientCaller, SecretProvider,
};
use paysched_domain::{
    ChargeRequest, ClassificationTable, PaySchedError, ProviderResponse, Result, TransportError,
    WorkItem, WorkItemId,
};
use rust_decimal::Decimal;

pub const ENDPOINT: &str = "https://provider.test/v1/charges";

/// How the scripted gateway answers a given account token.
#[derive(Debug, Clone)]
pub enum Behavior {
    Approve,
    Decline(&'static str),
    Status(u16),
    /// Never answers; only the per-attempt timeout ends the call
    Hang,
    Transport,
    Panic,
}

/// Gateway that answers by account token and records every call.
pub struct ScriptedGateway {
    behaviors: HashMap<String, Behavior>,
    latency: Duration,
    calls: AtomicUsize,
    calls_by_token: Mutex<HashMap<String, usize>>,
    gauge: ConcurrencyGauge,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self {
            behaviors: HashMap::new(),
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
            calls_by_token: Mutex::new(HashMap::new()),
            gauge: ConcurrencyGauge::new(),
        }
    }

    pub fn on(mut self, token: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(token.to_string(), behavior);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, token: &str) -> usize {
        self.calls_by_token.lock().get(token).copied().unwrap_or(0)
    }

    pub fn gauge(&self) -> &ConcurrencyGauge {
        &self.gauge
    }
}

#[async_trait]
impl ChargeGateway for ScriptedGateway {
    async fn submit(
        &self,
        _endpoint: &str,
        request: &ChargeRequest,
        api_key: &str,
    ) -> std::result::Result<ProviderResponse, TransportError> {
        assert_eq!(api_key, "sk_test_123");
        let _inside = self.gauge.enter();
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.calls_by_token.lock().entry(request.source.clone()).or_insert(0) += 1;

        let behavior = self.behaviors.get(&request.source).cloned().unwrap_or(Behavior::Approve);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match behavior {
            Behavior::Approve => Ok(ProviderResponse::ok(format!("ch_{}", request.item_id))),
            Behavior::Decline(code) => {
                Ok(ProviderResponse::error(402, Some(code), Some("Your card was declined.")))
            }
            Behavior::Status(status) => Ok(ProviderResponse::error(status, None, None)),
            Behavior::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            Behavior::Transport => Err(TransportError::Connect("connection refused".into())),
            Behavior::Panic => panic!("gateway exploded"),
        }
    }
}

/// Reconciliation write recorded by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    Complete { id: WorkItemId, reference: String },
    DeadLetter { id: WorkItemId, reason: String },
}

/// Sink that records writes and can be told to fail for certain items.
#[derive(Default)]
pub struct RecordingSink {
    writes: Mutex<Vec<Write>>,
    failing: Mutex<Vec<WorkItemId>>,
    rejecting_completion: Mutex<Vec<WorkItemId>>,
    stalling_completion: Mutex<Vec<WorkItemId>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, id: WorkItemId) {
        self.failing.lock().push(id);
    }

    /// Fail `mark_complete` for `id` while still accepting dead letters.
    pub fn reject_completion_for(&self, id: WorkItemId) {
        self.rejecting_completion.lock().push(id);
    }

    /// Never answer `mark_complete` for `id`.
    pub fn stall_completion_for(&self, id: WorkItemId) {
        self.stalling_completion.lock().push(id);
    }

    pub fn writes(&self) -> Vec<Write> {
        self.writes.lock().clone()
    }

    pub fn writes_for(&self, id: &WorkItemId) -> Vec<Write> {
        self.writes()
            .into_iter()
            .filter(|write| match write {
                Write::Complete { id: written, .. } | Write::DeadLetter { id: written, .. } => {
                    written == id
                }
            })
            .collect()
    }

    fn check(&self, id: &WorkItemId) -> Result<()> {
        if self.failing.lock().contains(id) {
            return Err(PaySchedError::Reconciliation(format!("ledger rejected item {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl ReconciliationSink for RecordingSink {
    async fn mark_complete(&self, id: &WorkItemId, provider_reference: &str) -> Result<()> {
        self.check(id)?;
        if self.rejecting_completion.lock().contains(id) {
            return Err(PaySchedError::Reconciliation("payments db down".into()));
        }
        let stalled = self.stalling_completion.lock().contains(id);
        if stalled {
            std::future::pending::<()>().await;
        }
        self.writes
            .lock()
            .push(Write::Complete { id: id.clone(), reference: provider_reference.to_string() });
        Ok(())
    }

    async fn dead_letter(&self, id: &WorkItemId, reason: &str) -> Result<()> {
        self.check(id)?;
        self.writes.lock().push(Write::DeadLetter { id: id.clone(), reason: reason.to_string() });
        Ok(())
    }
}

pub struct StaticSecret(pub Option<&'static str>);

#[async_trait]
impl SecretProvider for StaticSecret {
    async fn api_key(&self) -> Result<String> {
        self.0
            .map(str::to_string)
            .ok_or_else(|| PaySchedError::Secret("key file missing".into()))
    }
}

/// Batch source returning queued responses, then empty batches.
#[derive(Default)]
pub struct QueuedSource {
    batches: Mutex<Vec<Result<Vec<WorkItem>>>>,
    delay: Duration,
    fetches: AtomicUsize,
}

impl QueuedSource {
    pub fn new(batches: Vec<Result<Vec<WorkItem>>>) -> Self {
        Self { batches: Mutex::new(batches), delay: Duration::ZERO, fetches: AtomicUsize::new(0) }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BatchSource for QueuedSource {
    async fn fetch_pending_items(&self) -> Result<Vec<WorkItem>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let mut batches = self.batches.lock();
        if batches.is_empty() {
            Ok(Vec::new())
        } else {
            batches.remove(0)
        }
    }
}

pub fn item(id: i64, amount: Decimal, token: &str) -> WorkItem {
    WorkItem::new(id, amount, token).with_owner(1, 100 + id)
}

/// Knobs for [`Harness::build`].
#[derive(Clone)]
pub struct HarnessConfig {
    pub cap: usize,
    pub attempts: u32,
    pub threshold: u64,
    pub call_timeout: Duration,
    pub grace: Duration,
    pub reconcile_timeout: Duration,
    pub secret: Option<&'static str>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            cap: 20,
            attempts: 6,
            threshold: 50,
            call_timeout: Duration::from_secs(2),
            grace: Duration::from_millis(500),
            reconcile_timeout: Duration::from_secs(1),
            secret: Some("sk_test_123"),
        }
    }
}

/// Everything a dispatch test needs, wired together.
pub struct Harness {
    pub gateway: Arc<ScriptedGateway>,
    pub sink: Arc<RecordingSink>,
    pub breaker: Arc<dyn Breaker>,
    pub limiter: Bulkhead,
    pub caller: Arc<ResilientCaller>,
    pub dispatcher: FanOutDispatcher,
}

impl Harness {
    pub fn build(gateway: ScriptedGateway, config: HarnessConfig) -> Self {
        let breaker = CircuitBreaker::new(ENDPOINT, breaker_config(config.threshold))
            .expect("breaker");
        Self::with_breaker(gateway, config, Arc::new(breaker))
    }

    /// Build around a caller-supplied breaker, e.g. one driven by a mock clock.
    pub fn with_breaker(
        gateway: ScriptedGateway,
        config: HarnessConfig,
        breaker: Arc<dyn Breaker>,
    ) -> Self {
        let gateway = Arc::new(gateway);
        let sink = Arc::new(RecordingSink::new());
        let limiter =
            Bulkhead::new(BulkheadConfig::builder().max_concurrent(config.cap).build().expect("cap"))
                .expect("limiter");

        let settings = CallerSettings {
            endpoint: ENDPOINT.to_string(),
            call_timeout: config.call_timeout,
            retry: RetryConfig::builder()
                .max_attempts(config.attempts)
                .initial_delay(Duration::from_millis(10))
                .max_delay(Duration::from_millis(40))
                .backoff(BackoffStrategy::Exponential { multiplier: 2.0 })
                .jitter(Jitter::None)
                .build()
                .expect("retry config"),
            classification: ClassificationTable::default(),
        };
        let caller = Arc::new(
            ResilientCaller::new(
                Arc::clone(&gateway) as Arc<dyn ChargeGateway>,
                Arc::new(StaticSecret(config.secret)),
                Arc::clone(&breaker),
                settings,
            )
            .expect("caller"),
        );

        let processor = ItemProcessor::new(
            Arc::clone(&caller),
            limiter.clone(),
            Arc::clone(&sink) as Arc<dyn ReconciliationSink>,
            ProcessorSettings {
                currency: "usd".into(),
                description: "Scheduled payment".into(),
                reconcile_timeout: config.reconcile_timeout,
            },
        );
        let dispatcher = FanOutDispatcher::new(Arc::new(processor), config.grace);

        Self { gateway, sink, breaker, limiter, caller, dispatcher }
    }
}

pub fn breaker_config(threshold: u64) -> CircuitBreakerConfig {
    CircuitBreakerConfig::builder()
        .failure_threshold(threshold)
        .cooldown(Duration::from_secs(30))
        .build()
        .expect("breaker config")
}
