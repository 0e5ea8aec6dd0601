//! Job channel behaviour against scripted classifiers

use anyhow::anyhow;
use async_trait::async_trait;
use qual_scoring::config::ScoringConfig;
use qual_scoring::metrics::PipelineMetrics;
use qual_scoring::models::{ClassifierFactory, ModelRegistry, TextClassifier};
use qual_scoring::types::{ClassifierOutput, ModelSlot};
use qual_scoring::{
    spawn_worker, FailureKind, HostError, HostMessage, WorkerHandle, WorkerMessage, WorkerState,
    YesNo,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

const TIMEOUT: Duration = Duration::from_secs(5);

/// "great" comments score 3, everything else 0. Model 1 blocks on the
/// gate for comments containing "hold". "boom" makes model 2 fail and
/// "garbage" makes model 3 answer outside the label vocabulary.
struct Scripted {
    slot: ModelSlot,
    gate: Arc<Notify>,
}

#[async_trait]
impl TextClassifier for Scripted {
    fn name(&self) -> &str {
        self.slot.id()
    }

    async fn classify(&self, text: &str) -> anyhow::Result<ClassifierOutput> {
        if self.slot == ModelSlot::Q1 && text.contains("hold") {
            self.gate.notified().await;
        }
        if self.slot == ModelSlot::Q2i && text.contains("boom") {
            return Err(anyhow!("inference session crashed"));
        }
        if self.slot == ModelSlot::Q3i && text.contains("garbage") {
            return Ok(ClassifierOutput::single("NEGATIVE"));
        }
        let label = match (self.slot, text.contains("great")) {
            (ModelSlot::Q1, true) | (ModelSlot::Q2i | ModelSlot::Q3i, false) => "LABEL_1",
            _ => "LABEL_0",
        };
        Ok(ClassifierOutput::single(label))
    }
}

struct ScriptedFactory {
    gate: Arc<Notify>,
    failures_left: AtomicUsize,
}

#[async_trait]
impl ClassifierFactory for ScriptedFactory {
    async fn build(&self, slot: ModelSlot) -> anyhow::Result<Arc<dyn TextClassifier>> {
        if slot == ModelSlot::Q1
            && self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        {
            return Err(anyhow!("could not fetch model weights"));
        }
        Ok(Arc::new(Scripted {
            slot,
            gate: Arc::clone(&self.gate),
        }))
    }
}

struct Harness {
    worker: WorkerHandle,
    registry: Arc<ModelRegistry>,
    gate: Arc<Notify>,
}

fn harness_with(options: ScoringConfig, load_failures: usize) -> Harness {
    let gate = Arc::new(Notify::new());
    let factory = ScriptedFactory {
        gate: Arc::clone(&gate),
        failures_left: AtomicUsize::new(load_failures),
    };
    let registry = Arc::new(ModelRegistry::new(Arc::new(factory)));
    let worker = spawn_worker(
        Arc::clone(&registry),
        options,
        Arc::new(PipelineMetrics::new()),
        16,
    );
    Harness {
        worker,
        registry,
        gate,
    }
}

fn harness() -> Harness {
    harness_with(ScoringConfig::default(), 0)
}

async fn next(worker: &mut WorkerHandle) -> WorkerMessage {
    tokio::time::timeout(TIMEOUT, worker.recv())
        .await
        .expect("timed out waiting for worker message")
        .expect("worker stopped")
}

async fn assert_quiet(worker: &mut WorkerHandle) {
    let extra = tokio::time::timeout(Duration::from_millis(100), worker.recv()).await;
    assert!(extra.is_err(), "unexpected message: {:?}", extra);
}

fn comments(texts: &[&str]) -> Vec<String> {
    texts.iter().map(|t| t.to_string()).collect()
}

fn failure_kind(message: &WorkerMessage) -> Option<FailureKind> {
    match message {
        WorkerMessage::Failed { error, .. } => Some(*error),
        _ => None,
    }
}

#[tokio::test]
async fn test_ready_is_emitted_once() {
    let mut h = harness();

    h.worker.init().await.unwrap();
    h.worker.init().await.unwrap();
    assert_eq!(next(&mut h.worker).await, WorkerMessage::Ready);

    h.worker.init().await.unwrap();
    h.worker.send(HostMessage::Init).await.unwrap();
    assert_quiet(&mut h.worker).await;

    assert_eq!(h.worker.state(), WorkerState::Ready);
    assert_eq!(h.registry.load_count(), 1);
}

#[tokio::test]
async fn test_job_progress_and_completion_in_order() {
    let mut h = harness();
    h.worker.wait_ready().await.unwrap();

    h.worker
        .submit(comments(&["great detail", "ok", "great plan"]))
        .await
        .unwrap();

    for expected in 1..=3 {
        assert_eq!(
            next(&mut h.worker).await,
            WorkerMessage::Progress {
                progress_count: expected
            }
        );
    }
    let WorkerMessage::Complete { output } = next(&mut h.worker).await else {
        panic!("expected completion");
    };
    let quals: Vec<u8> = output.iter().map(|s| s.as_ref().unwrap().qual).collect();
    assert_eq!(quals, vec![3, 0, 3]);
    assert_eq!(output[1].as_ref().unwrap().q3i, YesNo::No);

    assert_eq!(h.worker.state(), WorkerState::Ready);
    assert_quiet(&mut h.worker).await;
}

#[tokio::test]
async fn test_job_before_ready_is_rejected_and_triggers_load() {
    let mut h = harness();

    h.worker.submit(comments(&["great"])).await.unwrap();

    let rejection = next(&mut h.worker).await;
    assert_eq!(failure_kind(&rejection), Some(FailureKind::ProtocolViolation));
    assert_eq!(next(&mut h.worker).await, WorkerMessage::Ready);

    let output = h.worker.score(comments(&["great"]), |_| {}).await.unwrap();
    assert_eq!(output.len(), 1);
}

#[tokio::test]
async fn test_wait_ready_skips_earlier_rejection() {
    let mut h = harness();

    h.worker.submit(comments(&["great"])).await.unwrap();
    h.worker.wait_ready().await.unwrap();
    assert_eq!(h.worker.state(), WorkerState::Ready);

    // Nothing stale is left for the next job to pick up
    let output = h.worker.score(comments(&["great", "ok"]), |_| {}).await.unwrap();
    assert_eq!(output.len(), 2);
    assert_quiet(&mut h.worker).await;
}

#[tokio::test]
async fn test_score_while_job_in_flight_is_busy() {
    let mut h = harness();
    h.worker.wait_ready().await.unwrap();

    h.worker.submit(comments(&["hold, great"])).await.unwrap();
    assert_eq!(
        next(&mut h.worker).await,
        WorkerMessage::Progress { progress_count: 1 }
    );

    let busy = tokio::time::timeout(TIMEOUT, h.worker.score(comments(&["great"]), |_| {}))
        .await
        .expect("score blocked behind the running job");
    assert_eq!(busy, Err(HostError::Busy));

    h.gate.notify_one();
    let WorkerMessage::Complete { output } = next(&mut h.worker).await else {
        panic!("expected completion of the running job");
    };
    assert_eq!(output.len(), 1);

    let output = h.worker.score(comments(&["ok"]), |_| {}).await.unwrap();
    assert_eq!(output[0].as_ref().unwrap().qual, 0);
}

#[tokio::test]
async fn test_inference_failure_mid_batch() {
    let mut h = harness();
    h.worker.wait_ready().await.unwrap();

    h.worker
        .submit(comments(&["great", "ok", "boom", "great"]))
        .await
        .unwrap();
    for expected in 1..=3 {
        assert_eq!(
            next(&mut h.worker).await,
            WorkerMessage::Progress {
                progress_count: expected
            }
        );
    }
    let failed = next(&mut h.worker).await;
    assert_eq!(failure_kind(&failed), Some(FailureKind::InferenceFailure));
    assert_quiet(&mut h.worker).await;
    assert_eq!(h.worker.state(), WorkerState::Ready);
}

#[tokio::test]
async fn test_label_violation_mid_batch() {
    let mut h = harness_with(
        ScoringConfig {
            continue_on_error: true,
            ..Default::default()
        },
        0,
    );
    h.worker.wait_ready().await.unwrap();

    let err = h
        .worker
        .score(comments(&["great", "garbage"]), |_| {})
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        HostError::Failed {
            kind: FailureKind::LabelFormatViolation,
            ..
        }
    ));
    assert_quiet(&mut h.worker).await;
    assert_eq!(h.worker.state(), WorkerState::Ready);
}

#[tokio::test]
async fn test_second_job_while_scoring_is_rejected() {
    let mut h = harness();
    h.worker.wait_ready().await.unwrap();

    h.worker
        .submit(comments(&["hold, great work", "fine"]))
        .await
        .unwrap();
    assert_eq!(
        next(&mut h.worker).await,
        WorkerMessage::Progress { progress_count: 1 }
    );
    assert_eq!(h.worker.state(), WorkerState::Scoring);

    h.worker.submit(comments(&["intruder"])).await.unwrap();
    let rejection = next(&mut h.worker).await;
    assert_eq!(failure_kind(&rejection), Some(FailureKind::ProtocolViolation));

    h.gate.notify_one();
    assert_eq!(
        next(&mut h.worker).await,
        WorkerMessage::Progress { progress_count: 2 }
    );
    let WorkerMessage::Complete { output } = next(&mut h.worker).await else {
        panic!("expected completion of the first job");
    };
    assert_eq!(output.len(), 2);
    assert_eq!(output[0].as_ref().unwrap().qual, 3);
}

#[tokio::test]
async fn test_cancel_stops_at_comment_boundary() {
    let mut h = harness();
    h.worker.wait_ready().await.unwrap();

    h.worker
        .submit(comments(&["hold", "great", "great"]))
        .await
        .unwrap();
    assert_eq!(
        next(&mut h.worker).await,
        WorkerMessage::Progress { progress_count: 1 }
    );

    h.worker.cancel().await.unwrap();
    // The rejection proves the cancel ahead of it was handled
    h.worker.submit(comments(&["probe"])).await.unwrap();
    let rejection = next(&mut h.worker).await;
    assert_eq!(failure_kind(&rejection), Some(FailureKind::ProtocolViolation));

    h.gate.notify_one();
    let cancelled = next(&mut h.worker).await;
    assert_eq!(failure_kind(&cancelled), Some(FailureKind::Cancelled));
    assert_quiet(&mut h.worker).await;

    // The worker accepts new work afterwards
    assert_eq!(h.worker.state(), WorkerState::Ready);
    let output = h.worker.score(comments(&["great"]), |_| {}).await.unwrap();
    assert_eq!(output[0].as_ref().unwrap().qual, 3);
}

#[tokio::test]
async fn test_cancel_without_job_is_ignored() {
    let mut h = harness();
    h.worker.wait_ready().await.unwrap();

    h.worker.cancel().await.unwrap();
    assert_quiet(&mut h.worker).await;
    assert_eq!(h.worker.state(), WorkerState::Ready);
}

#[tokio::test]
async fn test_load_failure_is_retryable() {
    let mut h = harness_with(ScoringConfig::default(), 1);

    let err = h.worker.wait_ready().await.unwrap_err();
    assert!(matches!(
        err,
        HostError::Failed {
            kind: FailureKind::ModelLoadFailure,
            ..
        }
    ));
    assert_eq!(h.worker.state(), WorkerState::Failed);

    h.worker.wait_ready().await.unwrap();
    assert_eq!(h.worker.state(), WorkerState::Ready);
    assert_eq!(h.registry.load_count(), 2);
}

#[tokio::test]
async fn test_empty_job_emits_nothing() {
    let mut h = harness();
    h.worker.wait_ready().await.unwrap();

    h.worker.submit(Vec::new()).await.unwrap();
    assert_quiet(&mut h.worker).await;

    let output = h.worker.score(Vec::new(), |_| {}).await.unwrap();
    assert!(output.is_empty());
}

#[tokio::test]
async fn test_score_reports_progress() {
    let mut h = harness_with(
        ScoringConfig {
            concurrent_models: true,
            ..Default::default()
        },
        0,
    );

    let mut seen = Vec::new();
    let output = h
        .worker
        .score(comments(&["great", "meh", "great", "meh"]), |count| {
            seen.push(count)
        })
        .await
        .unwrap();

    assert_eq!(seen, vec![1, 2, 3, 4]);
    let quals: Vec<u8> = output.iter().map(|s| s.as_ref().unwrap().qual).collect();
    assert_eq!(quals, vec![3, 0, 3, 0]);
}

#[tokio::test]
async fn test_worker_stops_when_host_disconnects() {
    let h = harness();
    tokio::time::timeout(TIMEOUT, h.worker.shutdown())
        .await
        .expect("worker did not stop");
}
