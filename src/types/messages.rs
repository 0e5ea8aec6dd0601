//! Job channel wire messages

use crate::error::{FailureKind, ScoringError};
use crate::types::score::CompositeScore;
use serde::{Deserialize, Serialize};

/// Message sent from the host to the scoring worker.
///
/// On the wire any object without a non-empty `comments` array, such as `{}`,
/// is an initialization ping. `{"cancel": true}` cancels the running job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "HostEnvelope", into = "HostEnvelope")]
pub enum HostMessage {
    /// Load the models if needed
    Init,
    /// Score the given comments in order
    Job { comments: Vec<String> },
    /// Stop the running job at the next comment boundary
    Cancel,
}

impl HostMessage {
    pub fn job<I, S>(comments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        HostMessage::Job {
            comments: comments.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HostEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    comments: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    cancel: bool,
}

impl From<HostEnvelope> for HostMessage {
    fn from(envelope: HostEnvelope) -> Self {
        if envelope.cancel {
            return HostMessage::Cancel;
        }
        match envelope.comments {
            Some(comments) if !comments.is_empty() => HostMessage::Job { comments },
            _ => HostMessage::Init,
        }
    }
}

impl From<HostMessage> for HostEnvelope {
    fn from(message: HostMessage) -> Self {
        match message {
            HostMessage::Init => HostEnvelope::default(),
            HostMessage::Job { comments } => HostEnvelope {
                comments: Some(comments),
                cancel: false,
            },
            HostMessage::Cancel => HostEnvelope {
                comments: None,
                cancel: true,
            },
        }
    }
}

/// Message sent from the scoring worker back to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum WorkerMessage {
    /// Models are loaded; sent once per worker lifetime
    Ready,
    /// About to score the comment with this 1-based index
    Progress {
        #[serde(rename = "progressCount")]
        progress_count: usize,
    },
    /// Scores for every comment of the job, in input order.
    /// A slot is `None` only when `continue_on_error` skipped that comment.
    Complete { output: Vec<Option<CompositeScore>> },
    /// Load, protocol or scoring failure
    Failed { error: FailureKind, message: String },
}

impl WorkerMessage {
    /// The `status` tag this message carries on the wire
    pub fn status(&self) -> &'static str {
        match self {
            WorkerMessage::Ready => "ready",
            WorkerMessage::Progress { .. } => "progress",
            WorkerMessage::Complete { .. } => "complete",
            WorkerMessage::Failed { .. } => "failed",
        }
    }
}

impl From<&ScoringError> for WorkerMessage {
    fn from(err: &ScoringError) -> Self {
        WorkerMessage::Failed {
            error: err.kind(),
            message: err.to_string(),
        }
    }
}
