//! Churn Guard Library
//!
//! Churn risk scoring, cause ranking, behavioral segmentation and drift
//! detection over user activity features, served over NATS request/reply.

pub mod config;
pub mod consumer;
pub mod decision;
pub mod error;
pub mod feature_extractor;
pub mod handler;
pub mod metrics;
pub mod models;
pub mod producer;
pub mod service;
pub mod store;
pub mod types;

pub use config::AppConfig;
pub use consumer::RequestConsumer;
pub use error::{ChurnError, Result};
pub use feature_extractor::FeatureExtractor;
pub use handler::{RequestHandler, Route};
pub use models::{ModelHandle, Predictor};
pub use producer::ReplyProducer;
pub use service::DecisionService;
pub use types::{FeatureVector, PredictionResult, UserRecord};
