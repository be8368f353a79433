//! Scheduled job state machine
//!
//! `Idle → Fetching → Dispatching → Idle`, with `Stopped` as the terminal
//! state. A trigger that arrives while a round is running is skipped, never
//! queued.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use paysched_domain::BatchResult;
use tokio::sync::watch;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::ports::BatchSource;
use crate::dispatch::FanOutDispatcher;

/// Lifecycle state of a [`ScheduledJob`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    Idle,
    Fetching,
    Dispatching,
    Stopped,
}

impl JobState {
    /// No round is in progress.
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Idle | Self::Stopped)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Dispatching => "dispatching",
            Self::Stopped => "stopped",
        })
    }
}

/// Why a trigger did not produce a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A previous round was still in `state`
    Overlap { state: JobState },
    /// The job no longer accepts triggers
    Stopped,
    /// Cancellation arrived before the batch was fetched
    Cancelled,
}

/// Result of one trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunReport {
    Completed(BatchResult),
    Skipped(SkipReason),
    FetchFailed(String),
}

/// Fetches pending items on each trigger and fans them out.
pub struct ScheduledJob {
    name: String,
    source: Arc<dyn BatchSource>,
    dispatcher: FanOutDispatcher,
    fetch_timeout: Duration,
    state: watch::Sender<JobState>,
    shutdown: CancellationToken,
}

impl fmt::Debug for ScheduledJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledJob")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("fetch_timeout", &self.fetch_timeout)
            .finish_non_exhaustive()
    }
}

impl ScheduledJob {
    pub fn new(
        name: impl Into<String>,
        source: Arc<dyn BatchSource>,
        dispatcher: FanOutDispatcher,
        fetch_timeout: Duration,
    ) -> Self {
        let (state, _) = watch::channel(JobState::Idle);
        Self {
            name: name.into(),
            source,
            dispatcher,
            fetch_timeout,
            state,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> JobState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<JobState> {
        self.state.subscribe()
    }

    /// Stop accepting triggers and cancel the round in progress.
    pub fn stop(&self) {
        self.shutdown.cancel();
        self.state.send_if_modified(|state| {
            if *state == JobState::Idle {
                *state = JobState::Stopped;
                true
            } else {
                false
            }
        });
    }

    /// Wait until no round is running.
    pub async fn wait_settled(&self) -> JobState {
        let mut state = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        state.wait_for(|state| state.is_settled()).await.map_or(JobState::Stopped, |state| *state)
    }

    /// Handle one trigger.
    ///
    /// `cancel` is the caller's shutdown signal; cancelling it mid-round
    /// cancels the dispatch and leaves the job `Stopped`.
    #[instrument(skip_all, fields(job = %self.name, round = %Uuid::now_v7()))]
    pub async fn run(&self, cancel: &CancellationToken) -> RunReport {
        let mut observed = JobState::Idle;
        let claimed = self.state.send_if_modified(|state| {
            observed = *state;
            if *state == JobState::Idle {
                *state = JobState::Fetching;
                true
            } else {
                false
            }
        });

        if !claimed {
            return match observed {
                JobState::Stopped => {
                    debug!("Job stopped, ignoring trigger");
                    RunReport::Skipped(SkipReason::Stopped)
                }
                state => {
                    warn!(%state, "Previous round still running, skipping trigger");
                    RunReport::Skipped(SkipReason::Overlap { state })
                }
            };
        }

        let round = self.shutdown.child_token();
        if cancel.is_cancelled() {
            round.cancel();
        }
        let _forward = forward_cancel(cancel, &round);
        let report = self.run_round(&round).await;

        if cancel.is_cancelled() || round.is_cancelled() {
            self.state.send_replace(JobState::Stopped);
            info!("Job stopped after cancellation");
        } else {
            self.state.send_replace(JobState::Idle);
        }
        report
    }

    async fn run_round(&self, round: &CancellationToken) -> RunReport {
        let fetched = tokio::select! {
            biased;
            () = round.cancelled() => return RunReport::Skipped(SkipReason::Cancelled),
            fetched = tokio::time::timeout(self.fetch_timeout, self.source.fetch_pending_items()) => fetched,
        };

        let items = match fetched {
            Ok(Ok(items)) => items,
            Ok(Err(error)) => {
                warn!(%error, "Fetching pending items failed, skipping round");
                return RunReport::FetchFailed(error.to_string());
            }
            Err(_) => {
                let message =
                    format!("fetch timed out after {}ms", self.fetch_timeout.as_millis());
                warn!(%message, "Fetching pending items failed, skipping round");
                return RunReport::FetchFailed(message);
            }
        };

        if items.is_empty() {
            debug!("No pending items");
            return RunReport::Completed(BatchResult::new());
        }

        self.state.send_replace(JobState::Dispatching);
        info!(items = items.len(), "Dispatching batch");
        RunReport::Completed(self.dispatcher.dispatch(items, round).await)
    }
}

/// Cancel `target` when `parent` fires, until the guard is dropped.
fn forward_cancel(parent: &CancellationToken, target: &CancellationToken) -> DropGuard {
    let parent = parent.clone();
    let target = target.clone();
    let done = CancellationToken::new();
    let finished = done.clone();

    tokio::spawn(async move {
        tokio::select! {
            () = parent.cancelled() => target.cancel(),
            () = finished.cancelled() => {}
        }
    });

    done.drop_guard()
}
