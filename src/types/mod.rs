//! Type definitions for the churn decision layer

pub mod drift;
pub mod features;
pub mod model;
pub mod prediction;
pub mod segment;
pub mod user;

pub use drift::{DriftAlert, DriftReport, FeatureStats, Severity};
pub use features::{Feature, FeatureVector};
pub use model::{HealthStatus, ModelInfo, ModelMetadata, ModelStatus};
pub use prediction::{
    BatchPolicy, BatchPrediction, PredictionResult, RejectedRecord, RiskLevel, UserRisk,
    UsersWithRisk,
};
pub use segment::{Segment, SegmentReport, SegmentStats};
pub use user::UserRecord;
