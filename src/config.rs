//! Configuration management for the churn service

use crate::types::prediction::BatchPolicy;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Prefix for environment overrides, e.g. `CHURN_GUARD__STORE__API_KEY`
pub const ENV_PREFIX: &str = "CHURN_GUARD";

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub model: ModelConfig,
    #[serde(default)]
    pub store: StoreConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Prefix of all request subjects, e.g. `churn` for `churn.predict`
    pub subject_prefix: String,
    /// Queue group shared by service replicas
    pub queue_group: String,
}

/// Churn model configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// ONNX export of the trained classifier
    pub model_path: String,
    /// JSON sidecar with training metadata
    pub metadata_path: String,
    /// Number of threads for ONNX inference (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_onnx_threads() -> usize {
    1
}

/// Feature store (PostgREST) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Base URL of the store; unset disables store-backed operations
    #[serde(default)]
    pub url: Option<String>,
    /// Service key sent as `apikey` and bearer token
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Default row limit for the risk listing
    #[serde(default = "default_risk_limit")]
    pub risk_limit: usize,
    /// Default row limit for segmentation
    #[serde(default = "default_segment_limit")]
    pub segment_limit: usize,
    /// Default row limit for drift checks
    #[serde(default = "default_drift_limit")]
    pub drift_limit: usize,
    /// Rows per insert request
    #[serde(default = "default_insert_batch_size")]
    pub insert_batch_size: usize,
}

fn default_table() -> String {
    "user_segments".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_risk_limit() -> usize {
    50
}

fn default_segment_limit() -> usize {
    500
}

fn default_drift_limit() -> usize {
    100
}

fn default_insert_batch_size() -> usize {
    100
}

impl StoreConfig {
    /// Both URL and key are set
    pub fn is_configured(&self) -> bool {
        matches!((&self.url, &self.api_key), (Some(url), Some(key)) if !url.is_empty() && !key.is_empty())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            table: default_table(),
            timeout_secs: default_timeout_secs(),
            risk_limit: default_risk_limit(),
            segment_limit: default_segment_limit(),
            drift_limit: default_drift_limit(),
            insert_batch_size: default_insert_batch_size(),
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Maximum concurrently handled requests
    pub workers: usize,
    /// How store-backed batches treat invalid rows
    #[serde(default)]
    pub batch_policy: BatchPolicy,
    /// Interval of the metrics summary, in seconds
    #[serde(default = "default_metrics_interval_secs")]
    pub metrics_interval_secs: u64,
}

fn default_metrics_interval_secs() -> u64 {
    60
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path, with environment overrides
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
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
                subject_prefix: "churn".to_string(),
                queue_group: "churn-guard".to_string(),
            },
            model: ModelConfig {
                model_path: "models/churn_model.onnx".to_string(),
                metadata_path: "models/churn_model.json".to_string(),
                onnx_threads: 1,
            },
            store: StoreConfig::default(),
            pipeline: PipelineConfig {
                workers: 4,
                batch_policy: BatchPolicy::FailFast,
                metrics_interval_secs: default_metrics_interval_secs(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}
