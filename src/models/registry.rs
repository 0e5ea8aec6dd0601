//! Lazily loaded set of the three QuAL classifiers

use crate::config::ModelsConfig;
use crate::error::{Result, ScoringError};
use crate::models::classifier::{ClassifierFactory, TextClassifier};
use crate::models::inference::OnnxTextClassifier;
use crate::models::loader::ModelLoader;
use crate::types::ModelSlot;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{error, info};

/// The three loaded classifiers, immutable once constructed
pub struct ClassifierSet {
    pub q1: Arc<dyn TextClassifier>,
    pub q2i: Arc<dyn TextClassifier>,
    pub q3i: Arc<dyn TextClassifier>,
}

impl ClassifierSet {
    pub fn get(&self, slot: ModelSlot) -> &Arc<dyn TextClassifier> {
        match slot {
            ModelSlot::Q1 => &self.q1,
            ModelSlot::Q2i => &self.q2i,
            ModelSlot::Q3i => &self.q3i,
        }
    }
}

/// Observable registry state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    Unloaded,
    Loading,
    Ready,
}

/// Init-once holder for the classifier set.
///
/// Concurrent callers share one in-flight load. A failed load stores
/// nothing, so the next call starts over.
pub struct ModelRegistry {
    factory: Arc<dyn ClassifierFactory>,
    models: OnceCell<Arc<ClassifierSet>>,
    loading: AtomicBool,
    load_count: AtomicUsize,
}

/// Clears the loading flag however the load future ends
struct LoadingGuard<'a>(&'a AtomicBool);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ModelRegistry {
    pub fn new(factory: Arc<dyn ClassifierFactory>) -> Self {
        Self {
            factory,
            models: OnceCell::new(),
            loading: AtomicBool::new(false),
            load_count: AtomicUsize::new(0),
        }
    }

    /// Load the three classifiers if that has not happened yet.
    pub async fn ensure_loaded(&self) -> Result<Arc<ClassifierSet>> {
        self.models
            .get_or_try_init(|| self.load())
            .await
            .map(Arc::clone)
    }

    async fn load(&self) -> Result<Arc<ClassifierSet>> {
        self.loading.store(true, Ordering::Release);
        let _guard = LoadingGuard(&self.loading);
        let attempt = self.load_count.fetch_add(1, Ordering::Relaxed) + 1;

        info!(attempt = attempt, "Loading QuAL classifiers");

        let q1 = self.build(ModelSlot::Q1).await?;
        let q2i = self.build(ModelSlot::Q2i).await?;
        let q3i = self.build(ModelSlot::Q3i).await?;

        info!(
            q1 = q1.name(),
            q2i = q2i.name(),
            q3i = q3i.name(),
            "QuAL classifiers ready"
        );

        Ok(Arc::new(ClassifierSet { q1, q2i, q3i }))
    }

    async fn build(&self, slot: ModelSlot) -> Result<Arc<dyn TextClassifier>> {
        self.factory.build(slot).await.map_err(|e| {
            error!(model = %slot, error = %format!("{:#}", e), "Classifier construction failed");
            ScoringError::model_load(slot.id(), format!("{:#}", e))
        })
    }

    /// The loaded set, if loading has completed
    pub fn get(&self) -> Option<Arc<ClassifierSet>> {
        self.models.get().cloned()
    }

    pub fn state(&self) -> RegistryState {
        if self.models.initialized() {
            RegistryState::Ready
        } else if self.loading.load(Ordering::Acquire) {
            RegistryState::Loading
        } else {
            RegistryState::Unloaded
        }
    }

    /// Number of load attempts started so far
    pub fn load_count(&self) -> usize {
        self.load_count.load(Ordering::Relaxed)
    }
}

/// Builds ONNX classifiers from per-slot model directories
pub struct OnnxClassifierFactory {
    loader: Arc<ModelLoader>,
    config: ModelsConfig,
}

impl OnnxClassifierFactory {
    pub fn new(config: ModelsConfig) -> anyhow::Result<Self> {
        let loader = ModelLoader::new(config.onnx_threads, config.max_sequence_length)?;
        Ok(Self {
            loader: Arc::new(loader),
            config,
        })
    }
}

#[async_trait]
impl ClassifierFactory for OnnxClassifierFactory {
    async fn build(&self, slot: ModelSlot) -> anyhow::Result<Arc<dyn TextClassifier>> {
        let loader = Arc::clone(&self.loader);
        let dir = self.config.model_dir(slot);
        let name = self.config.model_name(slot).to_string();

        let model = tokio::task::spawn_blocking(move || loader.load_model(&dir, &name)).await??;
        Ok(Arc::new(OnnxTextClassifier::new(model)))
    }
}
