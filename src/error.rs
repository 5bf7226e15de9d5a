//! Error types for the churn decision layer

use thiserror::Error;

/// Result alias used throughout the decision layer
pub type Result<T> = std::result::Result<T, ChurnError>;

/// Errors surfaced by scoring, segmentation and drift operations
#[derive(Error, Debug)]
pub enum ChurnError {
    /// A feature value is outside its declared range
    #[error("Validation error on `{field}`: {message}")]
    Validation { field: &'static str, message: String },

    /// No classifier has been loaded
    #[error("Model not loaded")]
    ModelUnavailable,

    /// The classifier failed or returned an unusable output
    #[error("Prediction error: {0}")]
    Prediction(String),

    /// The feature store is unreachable or not configured
    #[error("Data source unavailable: {0}")]
    DataSourceUnavailable(String),

    /// Invalid configuration, baseline or model artifact
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// One element of a batch failed
    #[error("Batch record {index} ({record}) failed: {source}")]
    BatchRecord {
        index: usize,
        record: String,
        #[source]
        source: Box<ChurnError>,
    },

    /// Request payload could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ChurnError {
    /// Build a validation error for a named field
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        ChurnError::Validation {
            field,
            message: message.into(),
        }
    }

    /// Wrap an error with the position and identifier of the failing batch element
    pub fn in_batch(self, index: usize, record: impl Into<String>) -> Self {
        ChurnError::BatchRecord {
            index,
            record: record.into(),
            source: Box::new(self),
        }
    }

    /// Stable error code for response envelopes
    pub fn error_code(&self) -> &str {
        match self {
            ChurnError::Validation { .. } => "VALIDATION_ERROR",
            ChurnError::ModelUnavailable => "MODEL_UNAVAILABLE",
            ChurnError::Prediction(_) => "PREDICTION_ERROR",
            ChurnError::DataSourceUnavailable(_) => "DATA_SOURCE_UNAVAILABLE",
            ChurnError::Configuration(_) => "CONFIGURATION_ERROR",
            ChurnError::BatchRecord { source, .. } => source.error_code(),
            ChurnError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_record_keeps_inner_code() {
        let err = ChurnError::validation("total_clicks", "must be non-negative").in_batch(3, "user_abc");

        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        let message = err.to_string();
        assert!(message.contains("Batch record 3"));
        assert!(message.contains("user_abc"));
        assert!(message.contains("total_clicks"));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(ChurnError::ModelUnavailable.error_code(), "MODEL_UNAVAILABLE");
        assert_eq!(
            ChurnError::DataSourceUnavailable("down".into()).error_code(),
            "DATA_SOURCE_UNAVAILABLE"
        );
    }
}
