//! Sequential batch scoring over the loaded classifiers

use crate::config::ScoringConfig;
use crate::error::{Result, ScoringError};
use crate::metrics::PipelineMetrics;
use crate::models::combiner::combine;
use crate::models::registry::{ClassifierSet, ModelRegistry};
use crate::types::{ClassifierOutput, CompositeScore, ModelSlot, RawTriple, WorkerMessage};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Drives the three classifiers and the combiner across one job.
pub struct BatchRunner {
    registry: Arc<ModelRegistry>,
    options: ScoringConfig,
    metrics: Arc<PipelineMetrics>,
}

impl BatchRunner {
    pub fn new(
        registry: Arc<ModelRegistry>,
        options: ScoringConfig,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            registry,
            options,
            metrics,
        }
    }

    /// Score `comments` in order, one comment fully before the next.
    ///
    /// Emits `progress` before each comment and returns the ordered output,
    /// which the job channel delivers as the single `complete` message. An
    /// empty job emits nothing and returns nothing.
    pub async fn run(
        &self,
        comments: &[String],
        events: &mpsc::Sender<WorkerMessage>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Option<CompositeScore>>> {
        if comments.is_empty() {
            return Ok(Vec::new());
        }

        let models = self
            .registry
            .get()
            .ok_or_else(|| ScoringError::Protocol("models are not loaded".to_string()))?;

        info!(
            comments = comments.len(),
            concurrent_models = self.options.concurrent_models,
            "Started processing comments"
        );
        let job_start = Instant::now();
        let mut output = Vec::with_capacity(comments.len());

        for (index, comment) in comments.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(completed = index, "Job cancelled");
                return Err(ScoringError::Cancelled { completed: index });
            }

            let position = index + 1;
            emit(events, WorkerMessage::Progress { progress_count: position }).await;

            let started = Instant::now();
            match self.score_one(&models, position, comment).await {
                Ok(score) => {
                    self.metrics.record_comment(started.elapsed(), score.qual);
                    debug!(position = position, qual = score.qual, "Comment scored");
                    output.push(Some(score));
                }
                Err(err @ ScoringError::Inference { .. }) if self.options.continue_on_error => {
                    self.metrics.record_comment_failure();
                    warn!(position = position, error = %err, "Skipping comment");
                    output.push(None);
                }
                Err(err) => {
                    self.metrics.record_comment_failure();
                    return Err(err);
                }
            }
        }

        info!(
            comments = output.len(),
            elapsed_ms = job_start.elapsed().as_millis() as u64,
            "Processing comments complete"
        );
        Ok(output)
    }

    async fn score_one(
        &self,
        models: &ClassifierSet,
        position: usize,
        comment: &str,
    ) -> Result<CompositeScore> {
        let raw = if self.options.concurrent_models {
            let (q1, q2i, q3i) = tokio::try_join!(
                self.invoke(models, ModelSlot::Q1, position, comment),
                self.invoke(models, ModelSlot::Q2i, position, comment),
                self.invoke(models, ModelSlot::Q3i, position, comment),
            )?;
            RawTriple::new(q1, q2i, q3i)
        } else {
            let q1 = self.invoke(models, ModelSlot::Q1, position, comment).await?;
            let q2i = self.invoke(models, ModelSlot::Q2i, position, comment).await?;
            let q3i = self.invoke(models, ModelSlot::Q3i, position, comment).await?;
            RawTriple::new(q1, q2i, q3i)
        };

        combine(&raw)
    }

    async fn invoke(
        &self,
        models: &ClassifierSet,
        slot: ModelSlot,
        position: usize,
        comment: &str,
    ) -> Result<ClassifierOutput> {
        let classifier = models.get(slot);
        let started = Instant::now();

        let output = classifier
            .classify(comment)
            .await
            .map_err(|e| ScoringError::Inference {
                position,
                model: slot.id().to_string(),
                message: format!("{:#}", e),
            })?;

        self.metrics.record_model_time(classifier.name(), started.elapsed());
        Ok(output)
    }
}

/// Deliver a worker message; a closed host side is not an error here.
pub(crate) async fn emit(events: &mpsc::Sender<WorkerMessage>, message: WorkerMessage) {
    if events.send(message).await.is_err() {
        debug!("Host channel closed, dropping worker message");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::classifier::{ClassifierFactory, TextClassifier};
    use crate::types::YesNo;
    use anyhow::anyhow;
    use async_trait::async_trait;

    /// Each slot answers from a lookup on the comment text
    struct Scripted {
        slot: ModelSlot,
    }

    #[async_trait]
    impl TextClassifier for Scripted {
        fn name(&self) -> &str {
            self.slot.id()
        }

        async fn classify(&self, text: &str) -> anyhow::Result<ClassifierOutput> {
            if text.contains("boom") && self.slot == ModelSlot::Q2i {
                return Err(anyhow!("inference backend unavailable"));
            }
            if text.contains("garbage") && self.slot == ModelSlot::Q3i {
                return Ok(ClassifierOutput::single("NEGATIVE"));
            }
            let label = match (self.slot, text.contains("great")) {
                (ModelSlot::Q1, true) => "LABEL_1",
                (ModelSlot::Q1, false) => "LABEL_0",
                (_, true) => "LABEL_0",
                (_, false) => "LABEL_1",
            };
            Ok(ClassifierOutput::single(label))
        }
    }

    struct ScriptedFactory;

    #[async_trait]
    impl ClassifierFactory for ScriptedFactory {
        async fn build(&self, slot: ModelSlot) -> anyhow::Result<Arc<dyn TextClassifier>> {
            Ok(Arc::new(Scripted { slot }))
        }
    }

    async fn runner(options: ScoringConfig) -> BatchRunner {
        let registry = Arc::new(ModelRegistry::new(Arc::new(ScriptedFactory)));
        registry.ensure_loaded().await.unwrap();
        BatchRunner::new(registry, options, Arc::new(PipelineMetrics::new()))
    }

    fn comments(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    async fn drain(mut rx: mpsc::Receiver<WorkerMessage>) -> Vec<WorkerMessage> {
        let mut messages = Vec::new();
        while let Some(message) = rx.recv().await {
            messages.push(message);
        }
        messages
    }

    #[tokio::test]
    async fn test_progress_precedes_ordered_output() {
        let runner = runner(ScoringConfig::default()).await;
        let (tx, rx) = mpsc::channel(64);

        let job = comments(&["great job, very responsive", "fine", "great again"]);
        let output = runner.run(&job, &tx, &CancellationToken::new()).await.unwrap();
        drop(tx);

        assert_eq!(
            drain(rx).await,
            (1..=3)
                .map(|progress_count| WorkerMessage::Progress { progress_count })
                .collect::<Vec<_>>()
        );

        let quals: Vec<u8> = output.iter().map(|s| s.as_ref().unwrap().qual).collect();
        assert_eq!(quals, vec![3, 0, 3]);
        assert_eq!(output[1].as_ref().unwrap().q2i, YesNo::No);
    }

    #[tokio::test]
    async fn test_empty_job_emits_nothing() {
        let runner = runner(ScoringConfig::default()).await;
        let (tx, rx) = mpsc::channel(8);

        let output = runner.run(&[], &tx, &CancellationToken::new()).await.unwrap();
        drop(tx);

        assert!(output.is_empty());
        assert!(drain(rx).await.is_empty());
    }

    #[tokio::test]
    async fn test_inference_failure_aborts_batch() {
        let runner = runner(ScoringConfig::default()).await;
        let (tx, rx) = mpsc::channel(64);

        let job = comments(&["great", "boom", "great"]);
        let err = runner
            .run(&job, &tx, &CancellationToken::new())
            .await
            .unwrap_err();
        drop(tx);

        assert!(matches!(
            err,
            ScoringError::Inference { position: 2, ref model, .. } if model == "model-2"
        ));
        assert_eq!(
            drain(rx).await,
            vec![
                WorkerMessage::Progress { progress_count: 1 },
                WorkerMessage::Progress { progress_count: 2 },
            ]
        );
    }

    #[tokio::test]
    async fn test_continue_on_error_leaves_gap() {
        let runner = runner(ScoringConfig {
            continue_on_error: true,
            ..Default::default()
        })
        .await;
        let (tx, _rx) = mpsc::channel(64);

        let job = comments(&["great", "boom", "meh"]);
        let output = runner.run(&job, &tx, &CancellationToken::new()).await.unwrap();

        assert_eq!(output.len(), 3);
        assert!(output[0].is_some());
        assert!(output[1].is_none());
        assert_eq!(output[2].as_ref().unwrap().qual, 0);
    }

    #[tokio::test]
    async fn test_label_violation_aborts_even_when_continuing() {
        let runner = runner(ScoringConfig {
            continue_on_error: true,
            ..Default::default()
        })
        .await;
        let (tx, _rx) = mpsc::channel(64);

        let job = comments(&["great garbage"]);
        let err = runner
            .run(&job, &tx, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ScoringError::LabelFormat { .. }));
    }

    #[tokio::test]
    async fn test_concurrent_models_match_sequential() {
        let job = comments(&["great job", "needs work", "great", "ok"]);

        let mut results = Vec::new();
        for concurrent_models in [false, true] {
            let runner = runner(ScoringConfig {
                concurrent_models,
                ..Default::default()
            })
            .await;
            let (tx, rx) = mpsc::channel(64);
            let output = runner.run(&job, &tx, &CancellationToken::new()).await.unwrap();
            drop(tx);
            results.push((output, drain(rx).await));
        }

        assert_eq!(results[0], results[1]);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let runner = runner(ScoringConfig::default()).await;
        let (tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = runner.run(&comments(&["great"]), &tx, &cancel).await.unwrap_err();
        drop(tx);

        assert_eq!(err, ScoringError::Cancelled { completed: 0 });
        assert!(drain(rx).await.is_empty());
    }

    #[tokio::test]
    async fn test_requires_loaded_models() {
        let registry = Arc::new(ModelRegistry::new(Arc::new(ScriptedFactory)));
        let runner = BatchRunner::new(
            registry,
            ScoringConfig::default(),
            Arc::new(PipelineMetrics::new()),
        );
        let (tx, _rx) = mpsc::channel(8);

        let err = runner
            .run(&comments(&["great"]), &tx, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ScoringError::Protocol(_)));
    }
}
