//! ONNX churn model loader

use crate::error::{ChurnError, Result};
use crate::feature_extractor::FeatureExtractor;
use crate::models::classifier::{Classifier, OnnxClassifier};
use crate::types::model::ModelMetadata;
use anyhow::Context;
use chrono::{DateTime, Utc};
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// A classifier together with its training metadata
pub struct LoadedModel {
    pub classifier: Arc<dyn Classifier>,
    pub metadata: ModelMetadata,
    pub loaded_at: DateTime<Utc>,
}

impl LoadedModel {
    pub fn new(classifier: Arc<dyn Classifier>, metadata: ModelMetadata) -> Self {
        Self {
            classifier,
            metadata,
            loaded_at: Utc::now(),
        }
    }
}

impl std::fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModel")
            .field("metadata", &self.metadata)
            .field("loaded_at", &self.loaded_at)
            .finish_non_exhaustive()
    }
}

/// Source of freshly loaded models, used at startup and on reload
pub trait ModelProvider: Send + Sync {
    fn load(&self) -> Result<LoadedModel>;
}

/// Loader for ONNX models
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a new model loader with specified number of threads
    pub fn with_threads(onnx_threads: usize) -> anyhow::Result<Self> {
        ort::init().commit()?;
        info!(onnx_threads = onnx_threads, "ONNX Runtime initialized");
        Ok(Self { onnx_threads })
    }

    /// Load the churn classifier from an ONNX file
    pub fn load_classifier<P: AsRef<Path>>(&self, path: P, name: &str) -> anyhow::Result<OnnxClassifier> {
        let path = path.as_ref();

        info!(model = %name, path = %path.display(), threads = self.onnx_threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(path)
            .context(format!("Failed to load model from {:?}", path))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        let label_output = session
            .outputs
            .iter()
            .find(|o| o.name.contains("label"))
            .map(|o| o.name.clone());

        let probability_output = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .map(|o| o.name.clone())
            .unwrap_or_else(|| {
                session
                    .outputs
                    .last()
                    .map(|o| o.name.clone())
                    .unwrap_or_else(|| "probabilities".to_string())
            });

        info!(
            model = %name,
            input = %input_name,
            label = ?label_output,
            probabilities = %probability_output,
            "Model loaded successfully"
        );

        Ok(OnnxClassifier::new(
            name.to_string(),
            session,
            input_name,
            label_output,
            probability_output,
        ))
    }

    /// Read the JSON metadata sidecar written at training time
    pub fn load_metadata<P: AsRef<Path>>(path: P) -> anyhow::Result<ModelMetadata> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .context(format!("Failed to read model metadata from {:?}", path))?;
        serde_json::from_str(&raw).context(format!("Invalid model metadata in {:?}", path))
    }
}

/// Loads the classifier and its metadata from configured paths
pub struct OnnxModelProvider {
    loader: ModelLoader,
    model_path: PathBuf,
    metadata_path: PathBuf,
    extractor: FeatureExtractor,
}

impl OnnxModelProvider {
    pub fn new(loader: ModelLoader, model_path: impl Into<PathBuf>, metadata_path: impl Into<PathBuf>) -> Self {
        Self {
            loader,
            model_path: model_path.into(),
            metadata_path: metadata_path.into(),
            extractor: FeatureExtractor::new(),
        }
    }

    fn load_inner(&self) -> anyhow::Result<LoadedModel> {
        let metadata = ModelLoader::load_metadata(&self.metadata_path)?;

        // Input order is fixed at training time
        if !self.extractor.matches_model(&metadata.features) {
            anyhow::bail!(
                "model features {:?} do not match expected order {:?}",
                metadata.features,
                self.extractor.feature_names()
            );
        }

        let classifier = self.loader.load_classifier(&self.model_path, "churn")?;

        Ok(LoadedModel::new(Arc::new(classifier), metadata))
    }
}

impl ModelProvider for OnnxModelProvider {
    fn load(&self) -> Result<LoadedModel> {
        self.load_inner()
            .map_err(|e| ChurnError::Configuration(format!("{:#}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_metadata() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"trained_at": "2024-05-01T10:00:00", "features": ["total_clicks"], "metrics": {{"f1_score": 0.8}}}}"#
        )
        .unwrap();

        let metadata = ModelLoader::load_metadata(file.path()).unwrap();
        assert_eq!(metadata.trained_at, "2024-05-01T10:00:00");
        assert_eq!(metadata.features, vec!["total_clicks"]);
    }

    #[test]
    fn test_missing_metadata_is_an_error() {
        assert!(ModelLoader::load_metadata("does/not/exist.json").is_err());
    }
}
