//! Probability to risk tier policy

use crate::types::prediction::{RiskLevel, RiskLevelThresholds};

const HIGH_RECOMMENDATION: &str =
    "Immediate intervention required. Consider offering retention incentives.";
const MEDIUM_RECOMMENDATION: &str = "Proactive outreach recommended. Schedule a check-in call.";
const LOW_RECOMMENDATION: &str = "User appears engaged. Continue current engagement strategy.";

/// Maps churn probability to a risk tier and a recommended action
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskClassifier {
    thresholds: RiskLevelThresholds,
}

impl RiskClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify a probability, first matching tier wins
    pub fn classify(&self, probability: f64) -> (RiskLevel, &'static str) {
        let level = RiskLevel::from_probability(probability, &self.thresholds);
        (level, Self::recommendation(level))
    }

    /// Fixed recommendation text for a tier
    pub fn recommendation(level: RiskLevel) -> &'static str {
        match level {
            RiskLevel::High => HIGH_RECOMMENDATION,
            RiskLevel::Medium => MEDIUM_RECOMMENDATION,
            RiskLevel::Low => LOW_RECOMMENDATION,
        }
    }

    pub fn thresholds(&self) -> &RiskLevelThresholds {
        &self.thresholds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundaries_belong_to_higher_tier() {
        let classifier = RiskClassifier::new();

        assert_eq!(classifier.classify(0.70).0, RiskLevel::High);
        assert_eq!(classifier.classify(0.6999).0, RiskLevel::Medium);
        assert_eq!(classifier.classify(0.40).0, RiskLevel::Medium);
        assert_eq!(classifier.classify(0.3999).0, RiskLevel::Low);
    }

    #[test]
    fn test_recommendations() {
        let classifier = RiskClassifier::new();

        let (_, high) = classifier.classify(0.95);
        assert_eq!(
            high,
            "Immediate intervention required. Consider offering retention incentives."
        );
        let (_, medium) = classifier.classify(0.5);
        assert_eq!(medium, "Proactive outreach recommended. Schedule a check-in call.");
        let (_, low) = classifier.classify(0.0);
        assert_eq!(low, "User appears engaged. Continue current engagement strategy.");
    }

    #[test]
    fn test_classify_is_deterministic() {
        let classifier = RiskClassifier::new();
        for p in [0.0, 0.25, 0.4, 0.55, 0.7, 0.99] {
            assert_eq!(classifier.classify(p), classifier.classify(p));
        }
    }
}
