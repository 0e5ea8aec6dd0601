//! Configuration management for the scoring pipeline

use crate::types::ModelSlot;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub models: ModelsConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject the host publishes job channel messages on
    pub job_subject: String,
    /// Subject worker messages are published on
    pub event_subject: String,
}

/// Classifier model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Directory holding one sub-directory per model
    pub models_dir: String,
    /// Evidence model directory name
    #[serde(default = "default_q1_model")]
    pub q1: String,
    /// Suggestion model directory name
    #[serde(default = "default_q2i_model")]
    pub q2i: String,
    /// Suggestion-linked model directory name
    #[serde(default = "default_q3i_model")]
    pub q3i: String,
    /// Number of threads for ONNX inference per model (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
    /// Tokens kept per comment before inference
    #[serde(default = "default_max_sequence_length")]
    pub max_sequence_length: usize,
}

impl ModelsConfig {
    /// Directory name configured for a slot
    pub fn model_name(&self, slot: ModelSlot) -> &str {
        match slot {
            ModelSlot::Q1 => &self.q1,
            ModelSlot::Q2i => &self.q2i,
            ModelSlot::Q3i => &self.q3i,
        }
    }

    /// Full path of the model directory for a slot
    pub fn model_dir(&self, slot: ModelSlot) -> PathBuf {
        Path::new(&self.models_dir).join(self.model_name(slot))
    }
}

fn default_q1_model() -> String {
    "nlp-qual-q1".to_string()
}

fn default_q2i_model() -> String {
    "nlp-qual-q2i".to_string()
}

fn default_q3i_model() -> String {
    "nlp-qual-q3i".to_string()
}

fn default_onnx_threads() -> usize {
    1
}

fn default_max_sequence_length() -> usize {
    512
}

/// Batch scoring behaviour
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Issue the three model calls for a comment concurrently
    #[serde(default)]
    pub concurrent_models: bool,
    /// Keep scoring after a per-comment failure, leaving that slot empty
    #[serde(default)]
    pub continue_on_error: bool,
}

/// Job channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Buffered messages per direction
    pub channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
        }
    }
}

/// Metrics reporting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Seconds between summary log lines
    pub report_interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: 60,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `config/config.toml` and `QUAL__*` variables
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path.
    ///
    /// The file is optional; every value can come from the environment,
    /// e.g. `QUAL__MODELS__MODELS_DIR=/opt/models`. Unset values fall back
    /// to [`AppConfig::default`].
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let defaults = Config::try_from(&AppConfig::default())
            .context("Failed to encode default configuration")?;

        let config = Config::builder()
            .add_source(defaults)
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(Environment::with_prefix("QUAL").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                job_subject: "qual.jobs".to_string(),
                event_subject: "qual.events".to_string(),
            },
            models: ModelsConfig {
                models_dir: "models".to_string(),
                q1: default_q1_model(),
                q2i: default_q2i_model(),
                q3i: default_q3i_model(),
                onnx_threads: default_onnx_threads(),
                max_sequence_length: default_max_sequence_length(),
            },
            scoring: ScoringConfig::default(),
            pipeline: PipelineConfig::default(),
            metrics: MetricsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
