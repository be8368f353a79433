//! Integration tests for the scheduled job state machine

mod support;

use std::sync::Arc;
use std::time::Duration;

use paysched_common::testing::timeout_ok;
use paysched_core::{JobState, RunReport, ScheduledJob, SkipReason};
use paysched_domain::PaySchedError;
use rust_decimal_macros::dec;
use support::{item, Behavior, Harness, HarnessConfig, QueuedSource, ScriptedGateway};
use tokio_util::sync::CancellationToken;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

fn job(source: QueuedSource, gateway: ScriptedGateway) -> (Arc<ScheduledJob>, Arc<QueuedSource>, Harness) {
    let harness = Harness::build(gateway, HarnessConfig::default());
    let source = Arc::new(source);
    let job = ScheduledJob::new(
        "charges",
        Arc::clone(&source) as _,
        harness.dispatcher.clone(),
        FETCH_TIMEOUT,
    );
    (Arc::new(job), source, harness)
}

/// Validates the full `Idle → Fetching → Dispatching → Idle` cycle.
///
/// # Test Steps
/// 1. Fetch takes 50ms, every call takes 100ms
/// 2. Observe the state at fixed points of the paused clock
/// 3. The round completes and the job is idle again
#[tokio::test(start_paused = true)]
async fn round_walks_through_every_state() {
    let source = QueuedSource::new(vec![Ok(vec![item(1, dec!(10.00), "tok_ok")])])
        .with_delay(Duration::from_millis(50));
    let gateway = ScriptedGateway::new().with_latency(Duration::from_millis(100));
    let (job, _source, harness) = job(source, gateway);
    assert_eq!(job.state(), JobState::Idle);

    let run = {
        let job = Arc::clone(&job);
        tokio::spawn(async move { job.run(&CancellationToken::new()).await })
    };

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(job.state(), JobState::Fetching);

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(job.state(), JobState::Dispatching);

    let report = run.await.expect("run task");
    assert_eq!(job.state(), JobState::Idle);
    match report {
        RunReport::Completed(result) => assert_eq!(result.succeeded, 1),
        other => panic!("unexpected report {other:?}"),
    }
    assert_eq!(harness.sink.writes().len(), 1);
}

/// Validates that a trigger arriving mid-round is skipped, not queued.
#[tokio::test(start_paused = true)]
async fn overlapping_trigger_is_skipped() {
    let source = QueuedSource::new(vec![Ok(vec![item(1, dec!(10.00), "tok_ok")])])
        .with_delay(Duration::from_millis(50));
    let (job, source, _harness) = job(source, ScriptedGateway::new());

    let first = {
        let job = Arc::clone(&job);
        tokio::spawn(async move { job.run(&CancellationToken::new()).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    let second = job.run(&CancellationToken::new()).await;
    assert_eq!(second, RunReport::Skipped(SkipReason::Overlap { state: JobState::Fetching }));

    assert!(matches!(first.await.expect("run task"), RunReport::Completed(_)));
    assert_eq!(source.fetches(), 1);
    assert_eq!(job.state(), JobState::Idle);
}

/// Validates that a failed fetch skips the round but not the next one.
#[tokio::test]
async fn fetch_failure_skips_round_and_job_recovers() {
    let source = QueuedSource::new(vec![
        Err(PaySchedError::Fetch("database unavailable".into())),
        Ok(vec![item(1, dec!(10.00), "tok_ok")]),
    ]);
    let (job, _source, harness) = job(source, ScriptedGateway::new());
    let cancel = CancellationToken::new();

    match job.run(&cancel).await {
        RunReport::FetchFailed(message) => assert!(message.contains("database unavailable")),
        other => panic!("unexpected report {other:?}"),
    }
    assert_eq!(job.state(), JobState::Idle);
    assert!(harness.sink.writes().is_empty());

    match job.run(&cancel).await {
        RunReport::Completed(result) => assert_eq!(result.succeeded, 1),
        other => panic!("unexpected report {other:?}"),
    }
}

/// Validates that a fetch slower than the fetch timeout fails the round.
#[tokio::test(start_paused = true)]
async fn slow_fetch_times_out() {
    let source = QueuedSource::new(vec![Ok(vec![item(1, dec!(10.00), "tok_ok")])])
        .with_delay(FETCH_TIMEOUT + Duration::from_secs(5));
    let (job, _source, harness) = job(source, ScriptedGateway::new());

    match job.run(&CancellationToken::new()).await {
        RunReport::FetchFailed(message) => assert!(message.contains("timed out")),
        other => panic!("unexpected report {other:?}"),
    }
    assert_eq!(job.state(), JobState::Idle);
    assert_eq!(harness.gateway.calls(), 0);
}

/// Validates that an empty fetch completes without dispatching.
#[tokio::test]
async fn empty_fetch_completes_with_empty_result() {
    let (job, source, harness) = job(QueuedSource::new(Vec::new()), ScriptedGateway::new());

    let report = job.run(&CancellationToken::new()).await;

    assert!(matches!(report, RunReport::Completed(ref result) if result.is_empty()));
    assert_eq!(source.fetches(), 1);
    assert_eq!(harness.gateway.calls(), 0);
    assert_eq!(job.state(), JobState::Idle);
}

/// Validates that cancelling mid-dispatch stops the job for good.
///
/// Assertions:
/// - The round still reports every item
/// - The job ends `Stopped` and ignores later triggers
#[tokio::test(start_paused = true)]
async fn cancel_during_dispatch_stops_the_job() {
    let items = (1..=4).map(|id| item(id, dec!(2.00), "tok_slow")).collect();
    let source = QueuedSource::new(vec![Ok(items)]);
    let gateway = ScriptedGateway::new().on("tok_slow", Behavior::Hang);
    let (job, _source, harness) = job(source, gateway);
    let cancel = CancellationToken::new();

    let run = {
        let job = Arc::clone(&job);
        let cancel = cancel.clone();
        tokio::spawn(async move { job.run(&cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(job.state(), JobState::Dispatching);

    cancel.cancel();
    match run.await.expect("run task") {
        RunReport::Completed(result) => {
            assert_eq!(result.total(), 4);
            assert_eq!(result.errored, 4);
        }
        other => panic!("unexpected report {other:?}"),
    }
    assert_eq!(job.state(), JobState::Stopped);
    assert_eq!(harness.sink.writes().len(), 4);

    let next = job.run(&CancellationToken::new()).await;
    assert_eq!(next, RunReport::Skipped(SkipReason::Stopped));
}

/// Validates that cancelling while fetching skips the round.
#[tokio::test(start_paused = true)]
async fn cancel_during_fetch_skips_round() {
    let source = QueuedSource::new(vec![Ok(vec![item(1, dec!(10.00), "tok_ok")])])
        .with_delay(Duration::from_secs(5));
    let (job, _source, harness) = job(source, ScriptedGateway::new());
    let cancel = CancellationToken::new();

    let run = {
        let job = Arc::clone(&job);
        let cancel = cancel.clone();
        tokio::spawn(async move { job.run(&cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();

    assert_eq!(run.await.expect("run task"), RunReport::Skipped(SkipReason::Cancelled));
    assert_eq!(job.state(), JobState::Stopped);
    assert_eq!(harness.gateway.calls(), 0);
}

/// Validates `stop` on an idle job and on a running one.
#[tokio::test(start_paused = true)]
async fn stop_prevents_further_rounds() {
    let (idle, source, _harness) = job(QueuedSource::new(Vec::new()), ScriptedGateway::new());
    idle.stop();
    assert_eq!(idle.state(), JobState::Stopped);
    assert_eq!(idle.run(&CancellationToken::new()).await, RunReport::Skipped(SkipReason::Stopped));
    assert_eq!(source.fetches(), 0);

    let source = QueuedSource::new(vec![Ok(vec![item(1, dec!(1.00), "tok_ok")])])
        .with_delay(Duration::from_secs(1));
    let (busy, _source, _harness) = job(source, ScriptedGateway::new());
    let run = {
        let busy = Arc::clone(&busy);
        tokio::spawn(async move { busy.run(&CancellationToken::new()).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    busy.stop();
    let settled = timeout_ok(Duration::from_secs(5), busy.wait_settled()).await;
    assert_eq!(settled.expect("stopped job settles"), JobState::Stopped);
    assert_eq!(run.await.expect("run task"), RunReport::Skipped(SkipReason::Cancelled));
}

/// Validates that `wait_settled` returns once the running round ends.
#[tokio::test(start_paused = true)]
async fn wait_settled_returns_after_round() {
    let source = QueuedSource::new(vec![Ok(vec![item(1, dec!(10.00), "tok_ok")])]);
    let gateway = ScriptedGateway::new().with_latency(Duration::from_millis(200));
    let (job, _source, _harness) = job(source, gateway);

    let run = {
        let job = Arc::clone(&job);
        tokio::spawn(async move { job.run(&CancellationToken::new()).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!job.state().is_settled());

    let started = tokio::time::Instant::now();
    let settled = timeout_ok(Duration::from_secs(5), job.wait_settled()).await;
    assert_eq!(settled.expect("round settles"), JobState::Idle);
    assert!(started.elapsed() >= Duration::from_millis(150));
    assert!(matches!(run.await.expect("run task"), RunReport::Completed(_)));
}
