//! Feature drift data structures

use crate::types::features::Feature;
use crate::types::prediction::RejectedRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Drift alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
}

/// A feature whose sample mean moved away from the calibration baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftAlert {
    pub feature: Feature,
    pub severity: Severity,
    pub baseline_mean: f64,
    pub current_mean: f64,
    /// Absolute mean difference in baseline standard deviations
    pub deviation: f64,
}

/// Summary statistics of one feature over a sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureStats {
    pub mean: f64,
    /// Population standard deviation
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

/// Result of a drift check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    pub drift_detected: bool,
    pub alert_count: usize,
    pub alerts: Vec<DriftAlert>,
    pub current_stats: BTreeMap<Feature, FeatureStats>,
    /// Set when the sample was empty
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub sample_size: usize,
    pub analyzed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<RejectedRecord>,
}
