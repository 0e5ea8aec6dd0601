//! Error types for the scoring pipeline

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading models or scoring a job
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScoringError {
    /// One or more classifier constructions failed
    #[error("Model load failed ({model}): {message}")]
    ModelLoad { model: String, message: String },

    /// A classifier invocation failed for a specific comment.
    /// `position` is 1-based, matching the progress counter.
    #[error("Inference failed for comment {position} ({model}): {message}")]
    Inference {
        position: usize,
        model: String,
        message: String,
    },

    /// A message arrived that the worker state does not accept
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// A classifier emitted a label outside the expected vocabulary
    #[error("Label format violation ({model}): unexpected label {label:?}")]
    LabelFormat { model: String, label: String },

    /// The job was cancelled by the host
    #[error("Job cancelled after {completed} comments")]
    Cancelled { completed: usize },
}

impl ScoringError {
    /// Wire-level classification of this error
    pub fn kind(&self) -> FailureKind {
        match self {
            ScoringError::ModelLoad { .. } => FailureKind::ModelLoadFailure,
            ScoringError::Inference { .. } => FailureKind::InferenceFailure,
            ScoringError::Protocol(_) => FailureKind::ProtocolViolation,
            ScoringError::LabelFormat { .. } => FailureKind::LabelFormatViolation,
            ScoringError::Cancelled { .. } => FailureKind::Cancelled,
        }
    }

    pub(crate) fn model_load(model: &str, err: impl std::fmt::Display) -> Self {
        ScoringError::ModelLoad {
            model: model.to_string(),
            message: err.to_string(),
        }
    }
}

/// Failure category carried by the `failed` worker message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ModelLoadFailure,
    InferenceFailure,
    ProtocolViolation,
    LabelFormatViolation,
    Cancelled,
}

/// Errors seen by the host side of the job channel
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// The worker task is gone
    #[error("Scoring worker has shut down")]
    Closed,

    /// A job from this host is still running
    #[error("A job is already in flight")]
    Busy,

    /// The worker reported a failure message
    #[error("Worker reported {kind:?}: {message}")]
    Failed { kind: FailureKind, message: String },
}

/// Convenience Result type for scoring operations
pub type Result<T> = std::result::Result<T, ScoringError>;
