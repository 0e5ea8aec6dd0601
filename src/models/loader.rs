//! ONNX text classification model loader

use crate::text_encoder::TextEncoder;
use anyhow::{bail, Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

/// Loaded classification model with its tokenizer and label vocabulary
pub struct LoadedModel {
    /// Model name
    pub name: String,
    /// ONNX Runtime session
    pub session: Session,
    /// Tokenizer producing the session inputs
    pub encoder: TextEncoder,
    /// Session input names, in declaration order
    pub input_names: Vec<String>,
    /// Output holding the classification logits
    pub output_name: String,
    /// Label for each logit index; empty when the model ships no `id2label`
    pub labels: Vec<String>,
}

/// Subset of a Hugging Face `config.json` needed for classification
#[derive(Debug, Deserialize)]
struct ModelConfigFile {
    #[serde(default)]
    id2label: BTreeMap<String, String>,
}

/// Parse the `id2label` table of a `config.json`, ordered by class index.
pub fn parse_labels(config_json: &str) -> Result<Vec<String>> {
    let config: ModelConfigFile =
        serde_json::from_str(config_json).context("Invalid model config.json")?;

    let mut indexed = config
        .id2label
        .into_iter()
        .map(|(id, label)| {
            id.parse::<usize>()
                .map(|id| (id, label))
                .with_context(|| format!("Non-numeric class id {:?} in id2label", id))
        })
        .collect::<Result<Vec<_>>>()?;
    indexed.sort_by_key(|(id, _)| *id);

    for (expected, (id, _)) in indexed.iter().enumerate() {
        if *id != expected {
            bail!("id2label is missing class {}", expected);
        }
    }

    Ok(indexed.into_iter().map(|(_, label)| label).collect())
}

/// Loader for ONNX classification models
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
    /// Token limit applied before inference
    max_sequence_length: usize,
}

impl ModelLoader {
    /// Create a new model loader, initializing ONNX Runtime
    pub fn new(onnx_threads: usize, max_sequence_length: usize) -> Result<Self> {
        ort::init().commit()?;
        info!(onnx_threads = onnx_threads, "ONNX Runtime initialized");
        Ok(Self {
            onnx_threads,
            max_sequence_length,
        })
    }

    /// Load a model directory containing `model.onnx`, `tokenizer.json`
    /// and optionally `config.json`.
    pub fn load_model<P: AsRef<Path>>(&self, dir: P, name: &str) -> Result<LoadedModel> {
        let dir = dir.as_ref();

        let model_path = ["model.onnx", "onnx/model.onnx"]
            .iter()
            .map(|file| dir.join(file))
            .find(|path| path.exists())
            .with_context(|| format!("No model.onnx found in {:?}", dir))?;

        info!(model = %name, path = %model_path.display(), threads = self.onnx_threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(&model_path)
            .context(format!("Failed to load model from {:?}", model_path))?;

        let input_names: Vec<String> = session.inputs.iter().map(|i| i.name.clone()).collect();
        if !input_names.iter().any(|n| n == "input_ids") {
            bail!("Model {} has no input_ids input (found {:?})", name, input_names);
        }

        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name == "logits")
            .or_else(|| session.outputs.first())
            .map(|o| o.name.clone())
            .with_context(|| format!("Model {} declares no outputs", name))?;

        let encoder = TextEncoder::from_file(dir.join("tokenizer.json"), self.max_sequence_length)?;

        let config_path = dir.join("config.json");
        let labels = if config_path.exists() {
            let raw = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {:?}", config_path))?;
            parse_labels(&raw)?
        } else {
            warn!(model = %name, "No config.json, labels default to LABEL_<index>");
            Vec::new()
        };

        info!(
            model = %name,
            inputs = ?input_names,
            output = %output_name,
            labels = labels.len(),
            "Model loaded successfully"
        );

        Ok(LoadedModel {
            name: name.to_string(),
            session,
            encoder,
            input_names,
            output_name,
            labels,
        })
    }
}
