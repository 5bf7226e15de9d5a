//! Feature extraction for churn model inference.
//!
//! Produces the model input array in the exact column order the classifier
//! was trained with.

use crate::types::features::{Feature, FeatureVector};

/// Number of model input features
pub const FEATURE_COUNT: usize = Feature::ALL.len();

/// Transforms validated feature vectors into ordered model input.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    /// Create a new feature extractor.
    pub fn new() -> Self {
        Self
    }

    /// Extract the ordered model input for one user.
    ///
    /// Order: total_clicks, avg_session_time, support_tickets,
    /// days_since_signup, feature_usage_score.
    pub fn extract(&self, vector: &FeatureVector) -> [f32; FEATURE_COUNT] {
        Feature::ALL.map(|feature| vector.value(feature) as f32)
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        FEATURE_COUNT
    }

    /// Get feature names in model input order.
    pub fn feature_names(&self) -> Vec<&'static str> {
        Feature::ALL.iter().map(|f| f.name()).collect()
    }

    /// Check a model's recorded feature list against the extraction order.
    pub fn matches_model(&self, model_features: &[String]) -> bool {
        model_features.len() == FEATURE_COUNT
            && model_features
                .iter()
                .zip(self.feature_names())
                .all(|(model, ours)| model == ours)
    }
}
