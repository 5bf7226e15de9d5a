//! Model metadata and service status structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn default_model_version() -> String {
    "1.0.0".to_string()
}

fn unknown() -> String {
    "unknown".to_string()
}

/// Training-time metadata stored next to the model artifact.
///
/// Passed through verbatim, never recomputed at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    #[serde(default = "unknown")]
    pub trained_at: String,
    /// Feature names in model input order
    #[serde(default)]
    pub features: Vec<String>,
    /// Evaluation metrics recorded at training time
    #[serde(default)]
    pub metrics: serde_json::Map<String, serde_json::Value>,
    #[serde(default = "default_model_version")]
    pub model_version: String,
}

/// Read-only model description exposed to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub trained_at: String,
    pub features: Vec<String>,
    pub metrics: serde_json::Map<String, serde_json::Value>,
}

impl From<&ModelMetadata> for ModelInfo {
    fn from(metadata: &ModelMetadata) -> Self {
        Self {
            trained_at: metadata.trained_at.clone(),
            features: metadata.features.clone(),
            metrics: metadata.metrics.clone(),
        }
    }
}

/// Lifecycle status of the loaded model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelStatus {
    pub model_version: String,
    pub trained_at: String,
    pub loaded_at: DateTime<Utc>,
    pub status: String,
}

/// Liveness report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub model_loaded: bool,
    pub store_configured: bool,
    pub timestamp: DateTime<Utc>,
}
