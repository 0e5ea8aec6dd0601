//! Raw classifier output structures

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the three QuAL classifier slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelSlot {
    /// Evidence: how much the comment describes observed behaviour
    #[serde(rename = "model-1")]
    Q1,
    /// Suggestion: whether a suggestion for improvement is given
    #[serde(rename = "model-2")]
    Q2i,
    /// Connection: whether the suggestion is linked to the behaviour
    #[serde(rename = "model-3")]
    Q3i,
}

impl ModelSlot {
    pub const ALL: [ModelSlot; 3] = [ModelSlot::Q1, ModelSlot::Q2i, ModelSlot::Q3i];

    /// Registry identifier for the slot
    pub fn id(self) -> &'static str {
        match self {
            ModelSlot::Q1 => "model-1",
            ModelSlot::Q2i => "model-2",
            ModelSlot::Q3i => "model-3",
        }
    }
}

impl fmt::Display for ModelSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// A single (label, confidence) pair emitted by a classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f32,
}

impl LabelScore {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Ranked classifier output, highest confidence first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassifierOutput(Vec<LabelScore>);

impl ClassifierOutput {
    /// Build an output from unordered pairs, ranking them by confidence.
    pub fn ranked(mut scores: Vec<LabelScore>) -> Self {
        scores.sort_by(|a, b| b.score.total_cmp(&a.score));
        Self(scores)
    }

    /// Output holding a single label with full confidence
    pub fn single(label: impl Into<String>) -> Self {
        Self(vec![LabelScore::new(label, 1.0)])
    }

    /// The highest ranked entry, the only one consulted when combining
    pub fn top(&self) -> Option<&LabelScore> {
        self.0.first()
    }

    pub fn entries(&self) -> &[LabelScore] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The three classifier outputs for one comment
#[derive(Debug, Clone, PartialEq)]
pub struct RawTriple {
    pub q1: ClassifierOutput,
    pub q2i: ClassifierOutput,
    pub q3i: ClassifierOutput,
}

impl RawTriple {
    pub fn new(q1: ClassifierOutput, q2i: ClassifierOutput, q3i: ClassifierOutput) -> Self {
        Self { q1, q2i, q3i }
    }

    /// Output produced by the given slot
    pub fn get(&self, slot: ModelSlot) -> &ClassifierOutput {
        match slot {
            ModelSlot::Q1 => &self.q1,
            ModelSlot::Q2i => &self.q2i,
            ModelSlot::Q3i => &self.q3i,
        }
    }
}
