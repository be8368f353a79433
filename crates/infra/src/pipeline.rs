//! Assembles the charge pipeline from configuration
//!
//! Adapters are chosen by the caller; this module only wires the resilience
//! layer (one breaker per endpoint, one shared limiter) around them.

use std::sync::Arc;

use paysched_common::resilience::{
    Breaker, Bulkhead, BulkheadConfig, CircuitBreakerConfig, CircuitBreakerRegistry,
};
use paysched_core::{
    BatchSource, CallerSettings, ChargeGateway, FanOutDispatcher, ItemProcessor,
    ProcessorSettings, ReconciliationSink, ResilientCaller, ScheduledJob, SecretProvider,
};
use paysched_domain::{JobConfig, PaySchedError, Result};
use tracing::debug;

/// Ports the pipeline is built around.
pub struct Adapters {
    pub gateway: Arc<dyn ChargeGateway>,
    pub secrets: Arc<dyn SecretProvider>,
    pub sink: Arc<dyn ReconciliationSink>,
}

/// Build the dispatcher described by `config` over `adapters`.
pub fn build_dispatcher(config: &JobConfig, adapters: Adapters) -> Result<FanOutDispatcher> {
    config.validate()?;

    let breakers = CircuitBreakerRegistry::new(
        CircuitBreakerConfig::builder()
            .failure_threshold(config.breaker.failure_threshold)
            .cooldown(config.breaker.cooldown())
            .build()
            .map_err(config_error)?,
    )
    .map_err(config_error)?;
    let breaker: Arc<dyn Breaker> = breakers.breaker(&config.provider.endpoint);

    let limiter = Bulkhead::new(
        BulkheadConfig::builder()
            .max_concurrent(config.concurrency_cap)
            .build()
            .map_err(config_error)?,
    )
    .map_err(config_error)?;

    let caller = ResilientCaller::new(
        adapters.gateway,
        adapters.secrets,
        breaker,
        CallerSettings::from_config(config)?,
    )?;
    let processor = ItemProcessor::new(
        Arc::new(caller),
        limiter,
        adapters.sink,
        ProcessorSettings::from_config(config),
    );

    debug!(
        endpoint = %config.provider.endpoint,
        concurrency_cap = config.concurrency_cap,
        max_attempts = config.retry.max_attempts,
        "Built charge pipeline"
    );
    Ok(FanOutDispatcher::new(Arc::new(processor), config.grace_period()))
}

/// Build a [`ScheduledJob`] fed by `source`.
pub fn build_job(
    name: &str,
    config: &JobConfig,
    source: Arc<dyn BatchSource>,
    adapters: Adapters,
) -> Result<ScheduledJob> {
    let dispatcher = build_dispatcher(config, adapters)?;
    Ok(ScheduledJob::new(name, source, dispatcher, config.fetch_timeout()))
}

fn config_error(err: impl std::fmt::Display) -> PaySchedError {
    PaySchedError::Config(err.to_string())
}
