//! Churn scoring over the currently loaded model

use crate::error::{ChurnError, Result};
use crate::feature_extractor::FeatureExtractor;
use crate::models::loader::LoadedModel;
use crate::types::features::FeatureVector;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Shared reference to the loaded model.
///
/// Readers clone the inner `Arc` and drop the lock before scoring. A reload
/// replaces the whole `Arc`, so a scoring call either sees the old model or
/// the new one, never a mix.
#[derive(Default)]
pub struct ModelHandle {
    current: RwLock<Option<Arc<LoadedModel>>>,
}

impl ModelHandle {
    /// Handle with no model loaded
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_model(model: LoadedModel) -> Self {
        Self {
            current: RwLock::new(Some(Arc::new(model))),
        }
    }

    /// The loaded model, or `ModelUnavailable`
    pub fn current(&self) -> Result<Arc<LoadedModel>> {
        let guard = self
            .current
            .read()
            .map_err(|e| ChurnError::Prediction(format!("Lock error: {}", e)))?;
        guard.clone().ok_or(ChurnError::ModelUnavailable)
    }

    pub fn is_loaded(&self) -> bool {
        self.current.read().map(|m| m.is_some()).unwrap_or(false)
    }

    /// Install a new model, returning the one it replaced
    pub fn swap(&self, model: LoadedModel) -> Result<Option<Arc<LoadedModel>>> {
        let mut guard = self
            .current
            .write()
            .map_err(|e| ChurnError::Prediction(format!("Lock error: {}", e)))?;
        let previous = guard.replace(Arc::new(model));

        info!(
            model_version = %guard.as_ref().map(|m| m.metadata.model_version.as_str()).unwrap_or_default(),
            replaced = previous.is_some(),
            "Churn model installed"
        );

        Ok(previous)
    }
}

/// Classifier output for one user
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub is_churned: bool,
    /// Probability of the positive (churned) class
    pub probability: f64,
}

/// Scores feature vectors with the currently loaded classifier
#[derive(Clone)]
pub struct Predictor {
    handle: Arc<ModelHandle>,
    extractor: FeatureExtractor,
}

impl Predictor {
    pub fn new(handle: Arc<ModelHandle>) -> Self {
        Self {
            handle,
            extractor: FeatureExtractor::new(),
        }
    }

    pub fn handle(&self) -> &Arc<ModelHandle> {
        &self.handle
    }

    /// Class label and churn probability for one user
    pub fn score(&self, vector: &FeatureVector) -> Result<Score> {
        let model = self.handle.current()?;
        let features = self.extractor.extract(vector);

        let (is_churned, [_, probability]) = model.classifier.evaluate(&features)?;

        if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
            return Err(ChurnError::Prediction(format!(
                "classifier returned probability {} outside [0, 1]",
                probability
            )));
        }

        debug!(
            probability = probability,
            is_churned = is_churned,
            "Scored feature vector"
        );

        Ok(Score {
            is_churned,
            probability,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::classifier::Classifier;
    use crate::types::model::ModelMetadata;

    /// Logistic-style stub: probability grows with support tickets and
    /// shrinks with clicks
    pub(crate) struct StubClassifier {
        pub fixed: Option<f64>,
    }

    impl StubClassifier {
        fn probability(&self, features: &[f32]) -> f64 {
            if let Some(p) = self.fixed {
                return p;
            }
            let clicks = features[0] as f64;
            let tickets = features[2] as f64;
            (0.5 + tickets * 0.05 - clicks * 0.001).clamp(0.0, 1.0)
        }
    }

    impl Classifier for StubClassifier {
        fn predict(&self, features: &[f32]) -> Result<bool> {
            Ok(self.probability(features) >= 0.5)
        }

        fn predict_probability(&self, features: &[f32]) -> Result<[f64; 2]> {
            let p = self.probability(features);
            Ok([1.0 - p, p])
        }
    }

    pub(crate) fn stub_metadata() -> ModelMetadata {
        ModelMetadata {
            trained_at: "2024-05-01T10:00:00".to_string(),
            features: FeatureExtractor::new()
                .feature_names()
                .iter()
                .map(|s| s.to_string())
                .collect(),
            metrics: serde_json::Map::new(),
            model_version: "1.0.0".to_string(),
        }
    }

    pub(crate) fn stub_model(fixed: Option<f64>) -> LoadedModel {
        LoadedModel::new(Arc::new(StubClassifier { fixed }), stub_metadata())
    }

    #[test]
    fn test_score_without_model() {
        let predictor = Predictor::new(Arc::new(ModelHandle::empty()));
        let v = FeatureVector::new(10, 1.0, 1, 1, 1.0).unwrap();

        assert!(matches!(predictor.score(&v), Err(ChurnError::ModelUnavailable)));
    }

    #[test]
    fn test_score_with_model() {
        let predictor = Predictor::new(Arc::new(ModelHandle::with_model(stub_model(None))));
        let v = FeatureVector::new(0, 1.0, 6, 100, 10.0).unwrap();

        let score = predictor.score(&v).unwrap();
        assert!(score.is_churned);
        assert!((score.probability - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_out_of_range_probability_is_rejected() {
        let predictor = Predictor::new(Arc::new(ModelHandle::with_model(stub_model(Some(1.5)))));
        let v = FeatureVector::new(10, 1.0, 1, 1, 1.0).unwrap();

        assert!(matches!(predictor.score(&v), Err(ChurnError::Prediction(_))));
    }

    #[test]
    fn test_swap_replaces_model_for_new_calls() {
        let handle = Arc::new(ModelHandle::empty());
        let predictor = Predictor::new(handle.clone());
        let v = FeatureVector::new(10, 1.0, 1, 1, 1.0).unwrap();

        assert!(!handle.is_loaded());
        assert!(handle.swap(stub_model(Some(0.2))).unwrap().is_none());
        let held = handle.current().unwrap();

        assert!(handle.swap(stub_model(Some(0.9))).unwrap().is_some());
        assert_eq!(predictor.score(&v).unwrap().probability, 0.9);

        // A reference taken before the swap still sees the old model
        let (_, [_, p]) = held.classifier.evaluate(&[0.0; 5]).unwrap();
        assert_eq!(p, 0.2);
    }
}
