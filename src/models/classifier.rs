//! Classifier seams shared by the registry, the runner and the tests

use crate::types::{ClassifierOutput, ModelSlot};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// A text classification function: one comment in, ranked labels out.
#[async_trait]
pub trait TextClassifier: Send + Sync {
    /// Model name used in logs and metrics
    fn name(&self) -> &str;

    /// Classify a single comment
    async fn classify(&self, text: &str) -> Result<ClassifierOutput>;
}

/// Builds the classifier behind a registry slot.
#[async_trait]
pub trait ClassifierFactory: Send + Sync {
    async fn build(&self, slot: ModelSlot) -> Result<Arc<dyn TextClassifier>>;
}
