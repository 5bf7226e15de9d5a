//! Decision layer: risk tiers, reason ranking, segmentation and drift

pub mod drift;
pub mod reason;
pub mod risk;
pub mod segment;

pub use drift::{Baseline, DriftDetector, FeatureBaseline};
pub use reason::{ReasonCandidate, ReasonExplainer};
pub use risk::RiskClassifier;
pub use segment::SegmentClassifier;
