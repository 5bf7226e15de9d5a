//! Churn model loading and inference

pub mod classifier;
pub mod inference;
pub mod loader;

pub use classifier::{Classifier, OnnxClassifier};
pub use inference::{ModelHandle, Predictor, Score};
pub use loader::{LoadedModel, ModelLoader, ModelProvider, OnnxModelProvider};
