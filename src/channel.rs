//! Job channel: the message protocol between a host and the scoring worker.
//!
//! The worker runs in its own task and owns an explicit state machine:
//!
//! ```text
//! Idle ──init──▶ Loading ──ok──▶ Ready ──job──▶ Scoring ──done──▶ Ready
//!                   │
//!                   └──err──▶ Failed ──init──▶ Loading
//! ```
//!
//! Jobs that arrive in any state other than `Ready` are rejected with a
//! `protocol_violation` failure message; they are never queued or
//! interleaved with a running job.

use crate::config::ScoringConfig;
use crate::error::{FailureKind, HostError, ScoringError};
use crate::metrics::PipelineMetrics;
use crate::models::registry::{ClassifierSet, ModelRegistry};
use crate::runner::{emit, BatchRunner};
use crate::types::{CompositeScore, HostMessage, WorkerMessage};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Worker lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Loading,
    Ready,
    Scoring,
    /// The last load attempt failed; an init retries it
    Failed,
}

enum Activity {
    Loading(JoinHandle<crate::error::Result<Arc<ClassifierSet>>>),
    Scoring {
        job_id: Uuid,
        handle: JoinHandle<crate::error::Result<Vec<Option<CompositeScore>>>>,
        cancel: CancellationToken,
    },
}

enum Finished {
    Loaded(crate::error::Result<Arc<ClassifierSet>>),
    Scored(Uuid, crate::error::Result<Vec<Option<CompositeScore>>>),
}

/// Resolve once the in-flight activity ends; never resolves when idle.
async fn finished(activity: &mut Option<Activity>) -> Finished {
    match activity {
        Some(Activity::Loading(handle)) => Finished::Loaded(handle.await.unwrap_or_else(|e| {
            Err(ScoringError::model_load("registry", format!("load task failed: {}", e)))
        })),
        Some(Activity::Scoring { job_id, handle, .. }) => {
            let job_id = *job_id;
            Finished::Scored(
                job_id,
                handle.await.unwrap_or_else(|e| {
                    Err(ScoringError::Inference {
                        position: 0,
                        model: "runner".to_string(),
                        message: format!("scoring task failed: {}", e),
                    })
                }),
            )
        }
        None => std::future::pending().await,
    }
}

struct Worker {
    registry: Arc<ModelRegistry>,
    runner: Arc<BatchRunner>,
    metrics: Arc<PipelineMetrics>,
    events: mpsc::Sender<WorkerMessage>,
    state: watch::Sender<WorkerState>,
}

impl Worker {
    fn current(&self) -> WorkerState {
        *self.state.borrow()
    }

    fn transition(&self, next: WorkerState) {
        let previous = self.state.send_replace(next);
        debug!(from = ?previous, to = ?next, "Worker state changed");
    }

    async fn run(self, mut inbox: mpsc::Receiver<HostMessage>) {
        let mut activity: Option<Activity> = None;

        loop {
            tokio::select! {
                biased;

                outcome = finished(&mut activity) => {
                    activity = None;
                    self.complete(outcome).await;
                }
                message = inbox.recv() => match message {
                    Some(message) => self.handle(message, &mut activity).await,
                    None => break,
                },
            }
        }

        if let Some(Activity::Scoring { cancel, .. }) = &activity {
            cancel.cancel();
        }
        info!("Host disconnected, scoring worker stopping");
    }

    async fn handle(&self, message: HostMessage, activity: &mut Option<Activity>) {
        match message {
            HostMessage::Init => self.on_init(activity),
            HostMessage::Job { comments } if comments.is_empty() => self.on_init(activity),
            HostMessage::Job { comments } => self.on_job(comments, activity).await,
            HostMessage::Cancel => self.on_cancel(activity),
        }
    }

    fn on_init(&self, activity: &mut Option<Activity>) {
        match self.current() {
            WorkerState::Idle | WorkerState::Failed => self.start_loading(activity),
            state => debug!(state = ?state, "Init ignored"),
        }
    }

    async fn on_job(&self, comments: Vec<String>, activity: &mut Option<Activity>) {
        let reason = match self.current() {
            WorkerState::Ready => {
                self.start_scoring(comments, activity);
                return;
            }
            WorkerState::Idle | WorkerState::Failed => {
                // Any first message loads the models, but the job itself
                // must wait for `ready`.
                self.start_loading(activity);
                "models are not loaded; wait for ready before submitting"
            }
            WorkerState::Loading => "models are still loading; wait for ready before submitting",
            WorkerState::Scoring => "a job is already in flight",
        };

        let err = ScoringError::Protocol(reason.to_string());
        warn!(comments = comments.len(), error = %err, "Rejected job");
        emit(&self.events, WorkerMessage::from(&err)).await;
    }

    fn on_cancel(&self, activity: &mut Option<Activity>) {
        match activity {
            Some(Activity::Scoring { job_id, cancel, .. }) => {
                info!(job_id = %job_id, "Cancellation requested");
                cancel.cancel();
            }
            _ => debug!("Cancel ignored, no job in flight"),
        }
    }

    fn start_loading(&self, activity: &mut Option<Activity>) {
        self.transition(WorkerState::Loading);
        let registry = Arc::clone(&self.registry);
        *activity = Some(Activity::Loading(tokio::spawn(async move {
            registry.ensure_loaded().await
        })));
    }

    fn start_scoring(&self, comments: Vec<String>, activity: &mut Option<Activity>) {
        let job_id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let runner = Arc::clone(&self.runner);
        let events = self.events.clone();
        let token = cancel.clone();

        info!(job_id = %job_id, comments = comments.len(), "Job accepted");
        self.transition(WorkerState::Scoring);
        let handle = tokio::spawn(async move { runner.run(&comments, &events, &token).await });

        *activity = Some(Activity::Scoring {
            job_id,
            handle,
            cancel,
        });
    }

    async fn complete(&self, outcome: Finished) {
        match outcome {
            Finished::Loaded(Ok(_)) => {
                self.transition(WorkerState::Ready);
                emit(&self.events, WorkerMessage::Ready).await;
            }
            Finished::Loaded(Err(err)) => {
                error!(error = %err, "Model registry failed to load");
                self.transition(WorkerState::Failed);
                emit(&self.events, WorkerMessage::from(&err)).await;
            }
            Finished::Scored(job_id, Ok(output)) => {
                info!(job_id = %job_id, comments = output.len(), "Job complete");
                self.metrics.record_job(true);
                // Ready before `complete`, so a host reacting to it can
                // submit the next job straight away.
                self.transition(WorkerState::Ready);
                emit(&self.events, WorkerMessage::Complete { output }).await;
            }
            Finished::Scored(job_id, Err(err)) => {
                error!(job_id = %job_id, error = %err, "Job failed");
                self.metrics.record_job(false);
                self.transition(WorkerState::Ready);
                emit(&self.events, WorkerMessage::from(&err)).await;
            }
        }
    }
}

/// Start a scoring worker and return the host's end of the channel.
pub fn spawn_worker(
    registry: Arc<ModelRegistry>,
    options: ScoringConfig,
    metrics: Arc<PipelineMetrics>,
    capacity: usize,
) -> WorkerHandle {
    let capacity = capacity.max(1);
    let (command_tx, command_rx) = mpsc::channel(capacity);
    let (event_tx, event_rx) = mpsc::channel(capacity);
    let (state_tx, state_rx) = watch::channel(WorkerState::Idle);

    let runner = Arc::new(BatchRunner::new(
        Arc::clone(&registry),
        options,
        Arc::clone(&metrics),
    ));
    let worker = Worker {
        registry,
        runner,
        metrics,
        events: event_tx,
        state: state_tx,
    };
    let task = tokio::spawn(worker.run(command_rx));

    WorkerHandle {
        commands: command_tx,
        events: event_rx,
        state: state_rx,
        task,
        ready_seen: false,
        pending_jobs: 0,
    }
}

/// Host side of the job channel.
///
/// Every non-empty job gets exactly one terminal reply, `complete` or a
/// non-load `failed`. The handle counts jobs still awaiting theirs, so its
/// helpers never mistake another request's reply for their own.
pub struct WorkerHandle {
    commands: mpsc::Sender<HostMessage>,
    events: mpsc::Receiver<WorkerMessage>,
    state: watch::Receiver<WorkerState>,
    task: JoinHandle<()>,
    ready_seen: bool,
    pending_jobs: usize,
}

impl WorkerHandle {
    /// Send a raw host message
    pub async fn send(&mut self, message: HostMessage) -> Result<(), HostError> {
        let is_job = matches!(&message, HostMessage::Job { comments } if !comments.is_empty());
        self.commands
            .send(message)
            .await
            .map_err(|_| HostError::Closed)?;
        if is_job {
            self.pending_jobs += 1;
        }
        Ok(())
    }

    /// Ask the worker to load its models
    pub async fn init(&mut self) -> Result<(), HostError> {
        self.send(HostMessage::Init).await
    }

    /// Submit a job; the worker must already be ready
    pub async fn submit(&mut self, comments: Vec<String>) -> Result<(), HostError> {
        self.send(HostMessage::Job { comments }).await
    }

    /// Cancel the running job at its next comment boundary
    pub async fn cancel(&mut self) -> Result<(), HostError> {
        self.send(HostMessage::Cancel).await
    }

    /// Next message from the worker; `None` once it has stopped
    pub async fn recv(&mut self) -> Option<WorkerMessage> {
        let message = self.events.recv().await?;
        self.observe(&message);
        Some(message)
    }

    fn observe(&mut self, message: &WorkerMessage) {
        match message {
            WorkerMessage::Ready => self.ready_seen = true,
            WorkerMessage::Complete { .. } => {
                self.pending_jobs = self.pending_jobs.saturating_sub(1);
            }
            WorkerMessage::Failed { error, .. } if *error != FailureKind::ModelLoadFailure => {
                self.pending_jobs = self.pending_jobs.saturating_sub(1);
            }
            WorkerMessage::Failed { .. } | WorkerMessage::Progress { .. } => {}
        }
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Trigger model loading and wait for the `ready` message.
    ///
    /// Rejections of jobs sent before `ready` are skipped; only a model
    /// load failure ends the wait with an error.
    pub async fn wait_ready(&mut self) -> Result<(), HostError> {
        if self.ready_seen {
            return Ok(());
        }
        self.init().await?;

        loop {
            match self.recv().await.ok_or(HostError::Closed)? {
                WorkerMessage::Ready => return Ok(()),
                WorkerMessage::Failed {
                    error: FailureKind::ModelLoadFailure,
                    message,
                } => {
                    return Err(HostError::Failed {
                        kind: FailureKind::ModelLoadFailure,
                        message,
                    })
                }
                other => debug!(
                    status = other.status(),
                    "Skipping message while waiting for ready"
                ),
            }
        }
    }

    /// Load if needed, score `comments` and collect the ordered output.
    ///
    /// `on_progress` receives every progress count as it arrives. Fails
    /// with [`HostError::Busy`] while an earlier job is unfinished.
    pub async fn score<F>(
        &mut self,
        comments: Vec<String>,
        mut on_progress: F,
    ) -> Result<Vec<Option<CompositeScore>>, HostError>
    where
        F: FnMut(usize),
    {
        if self.pending_jobs > 0 || self.state() == WorkerState::Scoring {
            return Err(HostError::Busy);
        }
        self.wait_ready().await?;
        if comments.is_empty() {
            return Ok(Vec::new());
        }
        self.submit(comments).await?;

        loop {
            match self.recv().await.ok_or(HostError::Closed)? {
                WorkerMessage::Progress { progress_count } => on_progress(progress_count),
                WorkerMessage::Complete { output } => return Ok(output),
                WorkerMessage::Failed { error, message } => {
                    return Err(HostError::Failed {
                        kind: error,
                        message,
                    })
                }
                WorkerMessage::Ready => {}
            }
        }
    }

    /// Split into the raw sender and receiver, for transports that relay
    /// messages elsewhere.
    pub fn into_parts(
        self,
    ) -> (
        mpsc::Sender<HostMessage>,
        mpsc::Receiver<WorkerMessage>,
        JoinHandle<()>,
    ) {
        (self.commands, self.events, self.task)
    }

    /// Close the channel and wait for the worker task to stop
    pub async fn shutdown(self) {
        let (commands, events, task) = self.into_parts();
        drop(commands);
        drop(events);
        if let Err(e) = task.await {
            warn!(error = %e, "Scoring worker ended abnormally");
        }
    }
}
