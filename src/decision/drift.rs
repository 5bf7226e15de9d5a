//! Feature drift detection against the calibration baseline

use crate::error::{ChurnError, Result};
use crate::types::drift::{DriftAlert, DriftReport, FeatureStats, Severity};
use crate::types::features::{Feature, FeatureVector};
use crate::types::prediction::round_to;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Message reported when the sample is empty
pub const NO_DATA_MESSAGE: &str = "No data to analyze";

/// Mean shift, in baseline standard deviations, that raises an alert
const ALERT_SIGMAS: f64 = 2.0;
/// Multiple of the alert threshold above which severity is high
const HIGH_SEVERITY_FACTOR: f64 = 1.5;

/// Calibration mean and standard deviation of one feature
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureBaseline {
    pub mean: f64,
    pub std: f64,
}

/// Per-feature distribution the classifier was calibrated on
#[derive(Debug, Clone, PartialEq)]
pub struct Baseline {
    // indexed by `Feature as usize`
    entries: [FeatureBaseline; 5],
}

impl Baseline {
    /// Baseline recorded when the model was trained
    pub const fn calibration() -> Self {
        Self {
            entries: [
                FeatureBaseline { mean: 300.0, std: 200.0 },
                FeatureBaseline { mean: 20.0, std: 15.0 },
                FeatureBaseline { mean: 2.0, std: 2.0 },
                FeatureBaseline { mean: 180.0, std: 100.0 },
                FeatureBaseline { mean: 50.0, std: 25.0 },
            ],
        }
    }

    /// Build a baseline from explicit entries.
    ///
    /// Every feature must be present with a finite mean and a strictly
    /// positive, finite standard deviation.
    pub fn new(entries: &BTreeMap<Feature, FeatureBaseline>) -> Result<Self> {
        let mut table = Self::calibration().entries;
        for feature in Feature::ALL {
            let entry = entries.get(&feature).ok_or_else(|| {
                ChurnError::Configuration(format!("baseline is missing feature `{}`", feature))
            })?;
            if !entry.mean.is_finite() {
                return Err(ChurnError::Configuration(format!(
                    "baseline mean for `{}` must be finite",
                    feature
                )));
            }
            if !entry.std.is_finite() || entry.std <= 0.0 {
                return Err(ChurnError::Configuration(format!(
                    "baseline std for `{}` must be positive, got {}",
                    feature, entry.std
                )));
            }
            table[feature as usize] = *entry;
        }
        Ok(Self { entries: table })
    }

    pub fn get(&self, feature: Feature) -> FeatureBaseline {
        self.entries[feature as usize]
    }
}

impl Default for Baseline {
    fn default() -> Self {
        Self::calibration()
    }
}

/// Compares a recent sample to the calibration baseline
#[derive(Debug, Clone, Default)]
pub struct DriftDetector {
    baseline: Baseline,
}

impl DriftDetector {
    pub fn new(baseline: Baseline) -> Self {
        Self { baseline }
    }

    pub fn baseline(&self) -> &Baseline {
        &self.baseline
    }

    /// Mean, population std, min and max of every feature.
    ///
    /// Returns an empty map for an empty sample.
    pub fn feature_stats(&self, sample: &[FeatureVector]) -> BTreeMap<Feature, FeatureStats> {
        if sample.is_empty() {
            return BTreeMap::new();
        }

        Feature::ALL
            .iter()
            .map(|&feature| (feature, stats_for(sample, feature)))
            .collect()
    }

    /// Alerts for features whose sample mean moved more than two baseline
    /// standard deviations. An empty sample yields no alerts.
    pub fn detect(&self, sample: &[FeatureVector]) -> Vec<DriftAlert> {
        let stats = self.feature_stats(sample);
        self.alerts_from_stats(&stats)
    }

    /// Full drift report including current statistics
    pub fn report(&self, sample: &[FeatureVector]) -> DriftReport {
        let current_stats = self.feature_stats(sample);
        let alerts = self.alerts_from_stats(&current_stats);

        DriftReport {
            drift_detected: !alerts.is_empty(),
            alert_count: alerts.len(),
            alerts,
            current_stats,
            message: sample.is_empty().then(|| NO_DATA_MESSAGE.to_string()),
            sample_size: sample.len(),
            analyzed_at: Utc::now(),
            rejected: Vec::new(),
        }
    }

    fn alerts_from_stats(&self, stats: &BTreeMap<Feature, FeatureStats>) -> Vec<DriftAlert> {
        stats
            .iter()
            .filter_map(|(&feature, current)| {
                let baseline = self.baseline.get(feature);
                let diff = (current.mean - baseline.mean).abs();
                let threshold = baseline.std * ALERT_SIGMAS;

                if diff <= threshold {
                    return None;
                }

                let severity = if diff > threshold * HIGH_SEVERITY_FACTOR {
                    Severity::High
                } else {
                    Severity::Medium
                };

                Some(DriftAlert {
                    feature,
                    severity,
                    baseline_mean: baseline.mean,
                    current_mean: current.mean,
                    deviation: round_to(diff / baseline.std, 2),
                })
            })
            .collect()
    }
}

fn stats_for(sample: &[FeatureVector], feature: Feature) -> FeatureStats {
    let n = sample.len() as f64;
    let values = || sample.iter().map(move |v| v.value(feature));

    let mean = values().sum::<f64>() / n;
    let variance = values().map(|x| (x - mean).powi(2)).sum::<f64>() / n;

    FeatureStats {
        mean,
        std: variance.sqrt(),
        min: values().fold(f64::INFINITY, f64::min),
        max: values().fold(f64::NEG_INFINITY, f64::max),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A user sitting on the baseline mean of every feature except clicks
    fn at_baseline(clicks: i64) -> FeatureVector {
        FeatureVector::new(clicks, 20.0, 2, 180, 50.0).unwrap()
    }

    #[test]
    fn test_medium_alert_just_past_threshold() {
        let detector = DriftDetector::default();
        let sample = vec![at_baseline(701); 10];

        let alerts = detector.detect(&sample);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].feature, Feature::TotalClicks);
        assert_eq!(alerts[0].severity, Severity::Medium);
        assert_eq!(alerts[0].baseline_mean, 300.0);
        assert_eq!(alerts[0].current_mean, 701.0);
        assert!((alerts[0].deviation - 2.0).abs() < 0.01);
    }

    #[test]
    fn test_high_alert_beyond_one_and_a_half_thresholds() {
        let detector = DriftDetector::default();
        let sample = vec![at_baseline(1000); 4];

        let alerts = detector.detect(&sample);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::High);
        assert_eq!(alerts[0].deviation, 3.5);
    }

    #[test]
    fn test_exactly_one_and_a_half_thresholds_stays_medium() {
        let detector = DriftDetector::default();
        let sample = vec![at_baseline(900); 5];

        let alerts = detector.detect(&sample);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].feature, Feature::TotalClicks);
        assert_eq!(alerts[0].severity, Severity::Medium);
        assert_eq!(alerts[0].deviation, 3.0);
    }

    #[test]
    fn test_deviation_rounds_half_to_even() {
        let detector = DriftDetector::default();
        let sample: Vec<FeatureVector> = [6, 6, 7, 6]
            .into_iter()
            .map(|tickets| FeatureVector::new(300, 20.0, tickets, 180, 50.0).unwrap())
            .collect();

        let alerts = detector.detect(&sample);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].feature, Feature::SupportTickets);
        assert_eq!(alerts[0].current_mean, 6.25);
        // 4.25 / 2 = 2.125
        assert_eq!(alerts[0].deviation, 2.12);
    }

    #[test]
    fn test_exact_threshold_does_not_alert() {
        let detector = DriftDetector::default();
        assert!(detector.detect(&[at_baseline(700)]).is_empty());
        assert!(detector.detect(&[at_baseline(0)]).is_empty());
    }

    #[test]
    fn test_empty_sample() {
        let detector = DriftDetector::default();

        assert!(detector.detect(&[]).is_empty());

        let report = detector.report(&[]);
        assert!(!report.drift_detected);
        assert_eq!(report.alert_count, 0);
        assert!(report.current_stats.is_empty());
        assert_eq!(report.message.as_deref(), Some(NO_DATA_MESSAGE));
    }

    #[test]
    fn test_feature_stats_use_population_std() {
        let detector = DriftDetector::default();
        let sample = vec![at_baseline(100), at_baseline(300)];

        let stats = detector.feature_stats(&sample);
        let clicks = stats[&Feature::TotalClicks];
        assert_eq!(clicks.mean, 200.0);
        assert_eq!(clicks.std, 100.0);
        assert_eq!(clicks.min, 100.0);
        assert_eq!(clicks.max, 300.0);
        assert_eq!(stats.len(), 5);
    }

    #[test]
    fn test_report_serializes_feature_names() {
        let detector = DriftDetector::default();
        let report = detector.report(&vec![at_baseline(1000); 3]);

        assert!(report.drift_detected);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["alerts"][0]["feature"], "total_clicks");
        assert_eq!(json["alerts"][0]["severity"], "high");
        assert!(json["current_stats"]["feature_usage_score"]["mean"].is_number());
    }

    #[test]
    fn test_baseline_rejects_zero_std() {
        let mut entries: BTreeMap<Feature, FeatureBaseline> = Feature::ALL
            .iter()
            .map(|&f| (f, Baseline::calibration().get(f)))
            .collect();
        assert!(Baseline::new(&entries).is_ok());

        entries.insert(Feature::SupportTickets, FeatureBaseline { mean: 2.0, std: 0.0 });
        let err = Baseline::new(&entries).unwrap_err();
        assert!(matches!(err, ChurnError::Configuration(_)));

        entries.remove(&Feature::SupportTickets);
        assert!(Baseline::new(&entries).is_err());
    }
}
