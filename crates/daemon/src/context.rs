//! Application context - wires configuration into running components

use std::sync::Arc;

use paysched_core::{BatchSource, JobTrigger, ReconciliationSink, RunReport, ScheduledJob};
use paysched_domain::{JobConfig, PaySchedError, Result};
use paysched_infra::http::{HttpChargeGateway, HttpClient};
use paysched_infra::pipeline::{build_job, Adapters};
use paysched_infra::scheduling::{CronScheduler, CronSchedulerConfig};
use paysched_infra::storage::{InMemoryLedger, JsonFileBatchSource, JsonlLedger};
use paysched_infra::{secrets, JobMetrics};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const JOB_NAME: &str = "scheduled-payments";

/// Holds the job and its trigger for the lifetime of the process.
pub struct AppContext {
    pub config: JobConfig,
    pub job: Arc<ScheduledJob>,
    pub scheduler: CronScheduler,
}

impl AppContext {
    /// Build every component described by `config`. Nothing runs until
    /// [`start`](Self::start) or [`run_once`](Self::run_once).
    pub fn new(config: JobConfig) -> Result<Self> {
        let items_path = config.storage.items_path.clone().ok_or_else(|| {
            PaySchedError::Config("storage.items_path must be set".into())
        })?;

        let mut source = JsonFileBatchSource::new(items_path);
        let sink: Arc<dyn ReconciliationSink> = match &config.storage.ledger_path {
            Some(path) => {
                let ledger = Arc::new(JsonlLedger::new(path.clone()));
                source = source.with_ledger(Arc::clone(&ledger));
                ledger as Arc<dyn ReconciliationSink>
            }
            None => {
                warn!("No ledger configured; reconciliation results are kept in memory only");
                Arc::new(InMemoryLedger::new())
            }
        };

        let client = HttpClient::builder().timeout(config.call_timeout()).build()?;
        let adapters = Adapters {
            gateway: Arc::new(HttpChargeGateway::new(client)),
            secrets: secrets::from_source(&config.secret),
            sink,
        };

        let source: Arc<dyn BatchSource> = Arc::new(source);
        let job = build_job(JOB_NAME, &config, source, adapters)?;
        let scheduler = CronScheduler::new(CronSchedulerConfig::from_job_config(&config))?;

        info!(
            cadence = %config.cadence,
            endpoint = %config.provider.endpoint,
            concurrency_cap = config.concurrency_cap,
            "Application context ready"
        );
        Ok(Self { config, job: Arc::new(job), scheduler })
    }

    /// Start firing the job on its cadence.
    pub async fn start(&self) -> Result<()> {
        JobTrigger::start(&self.scheduler, Arc::clone(&self.job)).await
    }

    /// Stop the trigger and wait for the round in progress to settle.
    pub async fn shutdown(&self) -> Result<()> {
        info!("shutdown called on AppContext");
        JobTrigger::stop(&self.scheduler).await
    }

    /// Run a single round now, outside the schedule.
    pub async fn run_once(&self, cancel: &CancellationToken) -> RunReport {
        self.job.run(cancel).await
    }

    pub fn metrics(&self) -> Arc<JobMetrics> {
        self.scheduler.metrics()
    }
}
