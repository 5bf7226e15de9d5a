//! Churn prediction data structures

use crate::types::user::UserRecord;
use serde::{Deserialize, Serialize};

/// Risk tier derived from churn probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    High,
    Medium,
    Low,
}

impl RiskLevel {
    /// Determine risk level from probability and thresholds.
    ///
    /// Probabilities exactly on a threshold belong to the higher tier.
    pub fn from_probability(probability: f64, thresholds: &RiskLevelThresholds) -> Self {
        if probability >= thresholds.high {
            RiskLevel::High
        } else if probability >= thresholds.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::High => "HIGH",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::Low => "LOW",
        }
    }
}

/// Lower bounds of the HIGH and MEDIUM tiers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskLevelThresholds {
    pub medium: f64,
    pub high: f64,
}

impl Default for RiskLevelThresholds {
    fn default() -> Self {
        Self {
            medium: 0.40,
            high: 0.70,
        }
    }
}

/// Full scoring result for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Classifier decision
    pub is_churned: bool,
    /// Probability of churn, rounded to 4 decimal places
    pub churn_probability: f64,
    pub risk_level: RiskLevel,
    /// Suggested action for the risk tier
    pub recommendation: String,
    /// Most salient heuristic cause
    pub primary_reason: String,
}

/// How a batch treats elements that fail validation or scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPolicy {
    /// The first failing element aborts the whole batch
    #[default]
    FailFast,
    /// Failing elements are excluded and listed in the result
    SkipAndReport,
}

/// A batch element excluded under [`BatchPolicy::SkipAndReport`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedRecord {
    /// Position in the input batch
    pub index: usize,
    /// Identifier of the record, when one is known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<String>,
    pub code: String,
    pub error: String,
}

/// Batch scoring result with aggregate tier counts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchPrediction {
    pub predictions: Vec<PredictionResult>,
    pub total_users: usize,
    pub high_risk_count: usize,
    pub medium_risk_count: usize,
    pub low_risk_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<RejectedRecord>,
}

impl BatchPrediction {
    /// Aggregate tier counts over scored predictions
    pub fn from_predictions(predictions: Vec<PredictionResult>, rejected: Vec<RejectedRecord>) -> Self {
        let count = |level: RiskLevel| predictions.iter().filter(|p| p.risk_level == level).count();
        let high_risk_count = count(RiskLevel::High);
        let medium_risk_count = count(RiskLevel::Medium);
        let low_risk_count = count(RiskLevel::Low);

        Self {
            total_users: predictions.len(),
            predictions,
            high_risk_count,
            medium_risk_count,
            low_risk_count,
            rejected,
        }
    }
}

/// A stored user with its current churn assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRisk {
    #[serde(flatten)]
    pub user: UserRecord,
    pub churn_probability: f64,
    pub risk_level: RiskLevel,
    pub primary_reason: String,
    pub recommendation: String,
}

/// Stored users ranked by churn probability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsersWithRisk {
    pub users: Vec<UserRisk>,
    pub total_count: usize,
    /// Users at or above the watch-list probability
    pub high_risk_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<RejectedRecord>,
}

/// Round to a fixed number of decimal places.
///
/// Rounds the exact binary value with ties to even, so `0.25` becomes `0.2`
/// and `2.675` (stored just below the tie) becomes `2.67`.
pub(crate) fn round_to(value: f64, places: usize) -> f64 {
    format!("{:.*}", places, value).parse().unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(level: RiskLevel) -> PredictionResult {
        PredictionResult {
            is_churned: level == RiskLevel::High,
            churn_probability: 0.5,
            risk_level: level,
            recommendation: String::new(),
            primary_reason: "Healthy User".to_string(),
        }
    }

    #[test]
    fn test_risk_level_from_probability() {
        let thresholds = RiskLevelThresholds::default();

        assert_eq!(RiskLevel::from_probability(0.1, &thresholds), RiskLevel::Low);
        assert_eq!(RiskLevel::from_probability(0.4, &thresholds), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_probability(0.7, &thresholds), RiskLevel::High);
        assert_eq!(RiskLevel::from_probability(1.0, &thresholds), RiskLevel::High);
    }

    #[test]
    fn test_risk_level_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&RiskLevel::Medium).unwrap(), "\"MEDIUM\"");
    }

    #[test]
    fn test_batch_counts_sum_to_total() {
        let batch = BatchPrediction::from_predictions(
            vec![
                prediction(RiskLevel::High),
                prediction(RiskLevel::Low),
                prediction(RiskLevel::Low),
                prediction(RiskLevel::Medium),
            ],
            Vec::new(),
        );

        assert_eq!(batch.total_users, 4);
        assert_eq!(batch.high_risk_count, 1);
        assert_eq!(batch.medium_risk_count, 1);
        assert_eq!(batch.low_risk_count, 2);
        assert_eq!(
            batch.high_risk_count + batch.medium_risk_count + batch.low_risk_count,
            batch.total_users
        );

        let json = serde_json::to_value(&batch).unwrap();
        assert!(json.get("rejected").is_none());
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(0.123456, 4), 0.1235);
        assert_eq!(round_to(2.004, 2), 2.0);
    }

    #[test]
    fn test_round_to_ties_to_even() {
        assert_eq!(round_to(0.25, 1), 0.2);
        assert_eq!(round_to(2.125, 2), 2.12);
        assert_eq!(round_to(0.03125, 4), 0.0312);
        assert_eq!(round_to(0.35, 1), 0.3);
        assert_eq!(round_to(2.675, 2), 2.67);
        assert_eq!(round_to(0.75, 1), 0.8);
    }
}
