//! QuAL Scoring Pipeline Library
//!
//! Scores narrative feedback comments for quality with three text
//! classifiers, combining their labels into a QuAL score. A scoring worker
//! runs behind a message channel; hosts drive it in-process, over NATS or
//! from the `score-csv` tool.

pub mod channel;
pub mod config;
pub mod consumer;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod producer;
pub mod redaction;
pub mod runner;
pub mod tabular;
pub mod text_encoder;
pub mod types;

pub use channel::{spawn_worker, WorkerHandle, WorkerState};
pub use config::AppConfig;
pub use consumer::JobConsumer;
pub use error::{FailureKind, HostError, ScoringError};
pub use models::registry::{ModelRegistry, OnnxClassifierFactory};
pub use producer::EventPublisher;
pub use runner::BatchRunner;
pub use types::{CompositeScore, HostMessage, WorkerMessage, YesNo};
