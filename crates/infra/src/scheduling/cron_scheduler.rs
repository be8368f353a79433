//! Cron trigger for the scheduled payment job.
//!
//! Wraps `tokio-cron-scheduler` with explicit lifecycle management: every
//! start and stop is bounded by a timeout, the round in progress is cancelled
//! on stop, and stop waits (bounded) for the job to settle before returning.
//!
//! Each firing runs on its own task, so a firing that lands while a round is
//! still running reaches [`ScheduledJob::run`] and is skipped there as an
//! overlap. A round that fails never stops later firings.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use paysched_core::{JobTrigger, ScheduledJob};
//! use paysched_infra::scheduling::{CronScheduler, CronSchedulerConfig};
//!
//! # async fn example(job: Arc<ScheduledJob>) -> paysched_domain::Result<()> {
//! let scheduler = CronScheduler::new(CronSchedulerConfig::new("*/1 * * * *"))?;
//! JobTrigger::start(&scheduler, job).await?;
//! // ... application runs ...
//! JobTrigger::stop(&scheduler).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use paysched_core::{JobTrigger, RunReport, ScheduledJob};
use paysched_domain::{JobConfig, PaySchedError};
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::cadence::scheduler_expression;
use super::error::{SchedulerError, SchedulerResult};
use crate::observability::JobMetrics;

/// Configuration for the cron scheduler.
#[derive(Debug, Clone)]
pub struct CronSchedulerConfig {
    /// Five-field cadence, or six with leading seconds
    pub cadence: String,
    /// Timeout for creating and starting the underlying scheduler.
    pub start_timeout: Duration,
    /// Timeout for shutting the underlying scheduler down.
    pub stop_timeout: Duration,
    /// How long stop waits for the cancelled round to finish.
    pub settle_timeout: Duration,
}

impl CronSchedulerConfig {
    pub fn new(cadence: impl Into<String>) -> Self {
        Self {
            cadence: cadence.into(),
            start_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
            settle_timeout: Duration::from_secs(15),
        }
    }

    /// Settle timeout covers the grace period plus one reconciliation write.
    pub fn from_job_config(config: &JobConfig) -> Self {
        Self {
            settle_timeout: config.grace_period()
                + config.reconcile_timeout()
                + Duration::from_secs(1),
            ..Self::new(config.cadence.clone())
        }
    }
}

struct Running {
    scheduler: JobScheduler,
    job: Arc<ScheduledJob>,
    cancellation: CancellationToken,
    job_id: Uuid,
}

/// Cron-driven [`JobTrigger`].
pub struct CronScheduler {
    config: CronSchedulerConfig,
    expression: String,
    metrics: Arc<JobMetrics>,
    running: Mutex<Option<Running>>,
}

impl CronScheduler {
    /// Validates the cadence up front; nothing is scheduled until `start`.
    pub fn new(config: CronSchedulerConfig) -> SchedulerResult<Self> {
        Self::with_metrics(config, Arc::new(JobMetrics::new()))
    }

    pub fn with_metrics(
        config: CronSchedulerConfig,
        metrics: Arc<JobMetrics>,
    ) -> SchedulerResult<Self> {
        let expression = scheduler_expression(&config.cadence)?;
        Ok(Self { config, expression, metrics, running: Mutex::new(None) })
    }

    pub fn metrics(&self) -> Arc<JobMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Six-field expression handed to the cron runtime.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Begin firing `job` on the configured cadence.
    #[instrument(skip_all, fields(job = %job.name(), cadence = %self.config.cadence))]
    pub async fn start(&self, job: Arc<ScheduledJob>) -> SchedulerResult<()> {
        let mut slot = self.running.lock().await;
        if slot.is_some() {
            return Err(SchedulerError::AlreadyRunning);
        }

        let start_timeout = self.config.start_timeout;
        let scheduler = tokio::time::timeout(start_timeout, JobScheduler::new())
            .await
            .map_err(|source| SchedulerError::Timeout { duration: start_timeout, source })?
            .map_err(|source| SchedulerError::CreationFailed { source })?;

        let cancellation = CancellationToken::new();
        let job_id = self.register(&scheduler, Arc::clone(&job), cancellation.clone()).await?;

        tokio::time::timeout(start_timeout, scheduler.start())
            .await
            .map_err(|source| SchedulerError::Timeout { duration: start_timeout, source })?
            .map_err(|source| SchedulerError::StartFailed { source })?;

        info!(expression = %self.expression, %job_id, "Cron scheduler started");
        *slot = Some(Running { scheduler, job, cancellation, job_id });
        Ok(())
    }

    /// Stop firing, cancel the round in progress and wait for it to settle.
    #[instrument(skip_all)]
    pub async fn stop(&self) -> SchedulerResult<()> {
        let Some(mut running) = self.running.lock().await.take() else {
            return Err(SchedulerError::NotRunning);
        };

        running.cancellation.cancel();
        running.job.stop();

        let stop_timeout = self.config.stop_timeout;
        tokio::time::timeout(stop_timeout, running.scheduler.shutdown())
            .await
            .map_err(|source| SchedulerError::Timeout { duration: stop_timeout, source })?
            .map_err(|source| SchedulerError::StopFailed { source })?;

        let settle_timeout = self.config.settle_timeout;
        let state = tokio::time::timeout(settle_timeout, running.job.wait_settled())
            .await
            .map_err(|source| SchedulerError::Timeout { duration: settle_timeout, source })?;

        self.metrics.log(running.job.name());
        info!(job_id = %running.job_id, %state, "Cron scheduler stopped");
        Ok(())
    }

    async fn register(
        &self,
        scheduler: &JobScheduler,
        job: Arc<ScheduledJob>,
        cancellation: CancellationToken,
    ) -> SchedulerResult<Uuid> {
        let metrics = Arc::clone(&self.metrics);

        let definition = Job::new_async(self.expression.as_str(), move |_id, _lock| {
            let job = Arc::clone(&job);
            let cancellation = cancellation.clone();
            let metrics = Arc::clone(&metrics);

            Box::pin(async move {
                if cancellation.is_cancelled() {
                    return;
                }
                metrics.record_trigger();
                let started = Instant::now();
                let report = job.run(&cancellation).await;
                metrics.record_report(&report, started.elapsed());
                log_report(job.name(), &report, started.elapsed());
                metrics.log(job.name());
            })
        })
        .map_err(|source| SchedulerError::JobRegistrationFailed { source })?;

        let job_id = definition.guid();
        scheduler
            .add(definition)
            .await
            .map_err(|source| SchedulerError::JobRegistrationFailed { source })?;

        debug!(expression = %self.expression, %job_id, "Registered scheduled job");
        Ok(job_id)
    }
}

fn log_report(job: &str, report: &RunReport, elapsed: Duration) {
    let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    match report {
        RunReport::Completed(result) if result.is_empty() => {
            debug!(job, elapsed_ms, "Round finished with nothing to do");
        }
        RunReport::Completed(result) => {
            info!(
                job,
                elapsed_ms,
                succeeded = result.succeeded,
                declined = result.declined,
                failed = result.failed,
                errored = result.errored,
                reconciliation_failures = result.reconciliation_failures.len(),
                "Round finished"
            );
            for failure in &result.reconciliation_failures {
                warn!(job, item = %failure.item_id, error = %failure.error, "Reconciliation failed");
            }
        }
        RunReport::Skipped(reason) => debug!(job, ?reason, "Round skipped"),
        RunReport::FetchFailed(error) => warn!(job, %error, "Round failed to fetch"),
    }
}

#[async_trait]
impl JobTrigger for CronScheduler {
    async fn start(&self, job: Arc<ScheduledJob>) -> paysched_domain::Result<()> {
        Self::start(self, job).await.map_err(PaySchedError::from)
    }

    async fn stop(&self) -> paysched_domain::Result<()> {
        Self::stop(self).await.map_err(PaySchedError::from)
    }
}

impl Drop for CronScheduler {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut() {
            warn!("CronScheduler dropped while running; cancelling job");
            running.cancellation.cancel();
            running.job.stop();
        }
    }
}
