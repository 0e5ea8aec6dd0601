//! ONNX Runtime text classifier

use crate::models::classifier::TextClassifier;
use crate::models::loader::LoadedModel;
use crate::types::{ClassifierOutput, LabelScore};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use ort::session::SessionInputValue;
use ort::value::Tensor;
use std::borrow::Cow;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Sequence classifier backed by an ONNX Runtime session.
///
/// The session runs on the blocking thread pool; the mutex exists because
/// `Session::run` needs exclusive access.
pub struct OnnxTextClassifier {
    name: String,
    model: Arc<Mutex<LoadedModel>>,
}

impl OnnxTextClassifier {
    pub fn new(model: LoadedModel) -> Self {
        Self {
            name: model.name.clone(),
            model: Arc::new(Mutex::new(model)),
        }
    }
}

#[async_trait]
impl TextClassifier for OnnxTextClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn classify(&self, text: &str) -> Result<ClassifierOutput> {
        let model = Arc::clone(&self.model);
        let text = text.to_owned();

        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|e| anyhow!("Lock error: {}", e))?;
            run_model(&mut model, &text)
        })
        .await
        .context("Inference task panicked")?
    }
}

/// Tokenize, run the session and rank the softmax probabilities
fn run_model(model: &mut LoadedModel, text: &str) -> Result<ClassifierOutput> {
    let encoded = model.encoder.encode(text)?;
    let seq_len = encoded.len() as i64;

    let mut inputs: Vec<(Cow<'_, str>, SessionInputValue<'_>)> =
        Vec::with_capacity(model.input_names.len());
    for input_name in &model.input_names {
        let values = match input_name.as_str() {
            "input_ids" => encoded.input_ids.clone(),
            "attention_mask" => encoded.attention_mask.clone(),
            "token_type_ids" => encoded.token_type_ids.clone(),
            other => bail!("Model {} expects unsupported input {:?}", model.name, other),
        };
        let tensor = Tensor::from_array((vec![1_i64, seq_len], values))
            .context("Failed to create input tensor")?;
        inputs.push((Cow::Owned(input_name.clone()), tensor.into()));
    }

    let outputs = model.session.run(inputs)?;
    let output = outputs
        .get(model.output_name.as_str())
        .with_context(|| format!("Missing output {}", model.output_name))?;
    let (shape, data) = output.try_extract_tensor::<f32>()?;

    let dims: Vec<i64> = shape.iter().copied().collect();
    let num_labels = dims.last().copied().unwrap_or(0) as usize;
    if num_labels == 0 || data.len() < num_labels {
        bail!("Unexpected logits shape {:?}", dims);
    }
    let logits = &data[..num_labels];

    let ranked = rank_labels(logits, &model.labels);
    debug!(
        model = %model.name,
        tokens = seq_len,
        top = ?ranked.top().map(|t| &t.label),
        "Classification complete"
    );
    Ok(ranked)
}

/// Numerically stable softmax
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Pair each probability with its label and rank highest first.
///
/// Indices without an entry in `labels` are named `LABEL_<index>`, the
/// Hugging Face default.
pub fn rank_labels(logits: &[f32], labels: &[String]) -> ClassifierOutput {
    let scores = softmax(logits)
        .into_iter()
        .enumerate()
        .map(|(i, score)| {
            let label = labels
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("LABEL_{}", i));
            LabelScore::new(label, score)
        })
        .collect();
    ClassifierOutput::ranked(scores)
}
