//! Rule cascade segmentation

use crate::types::features::FeatureVector;
use crate::types::prediction::round_to;
use crate::types::segment::{Segment, SegmentReport, SegmentStats};
use std::collections::HashMap;

/// Number of member ids kept per segment for display
pub const SAMPLE_SIZE: usize = 5;

type SegmentRule = (fn(&FeatureVector) -> bool, Segment);

/// Ordered cascade, first match wins. Anything unmatched is `Engaged`.
const SEGMENT_RULES: &[SegmentRule] = &[
    (is_new_user, Segment::NewUsers),
    (is_power_user, Segment::PowerUsers),
    (is_dormant, Segment::Dormant),
    (is_at_risk, Segment::AtRisk),
];

fn is_new_user(v: &FeatureVector) -> bool {
    v.days_since_signup() <= 30
}

fn is_power_user(v: &FeatureVector) -> bool {
    v.total_clicks() > 500 && v.avg_session_time() > 30.0 && v.feature_usage_score() > 70.0
}

fn is_dormant(v: &FeatureVector) -> bool {
    v.total_clicks() < 50 || v.avg_session_time() < 5.0
}

fn is_at_risk(v: &FeatureVector) -> bool {
    v.support_tickets() > 3 || v.feature_usage_score() < 30.0
}

/// Assigns behavioral segments to users
#[derive(Debug, Clone, Copy, Default)]
pub struct SegmentClassifier;

impl SegmentClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Segment of a single user
    pub fn segment(&self, vector: &FeatureVector) -> Segment {
        SEGMENT_RULES
            .iter()
            .find(|(matches, _)| matches(vector))
            .map(|&(_, segment)| segment)
            .unwrap_or(Segment::Engaged)
    }

    /// Segment a batch of `(user_id, features)` pairs and aggregate per segment
    pub fn segment_batch<S: AsRef<str>>(&self, members: &[(S, FeatureVector)]) -> SegmentReport {
        let total = members.len();
        let mut groups: HashMap<Segment, (usize, Vec<String>)> = HashMap::new();

        for (user_id, vector) in members {
            let (count, samples) = groups.entry(self.segment(vector)).or_default();
            *count += 1;
            if samples.len() < SAMPLE_SIZE {
                samples.push(user_id.as_ref().to_string());
            }
        }

        let segments = Segment::REPORT_ORDER
            .iter()
            .map(|&segment| {
                let (count, sample_users) = groups.remove(&segment).unwrap_or_default();
                let percentage = if total > 0 {
                    round_to(count as f64 / total as f64 * 100.0, 1)
                } else {
                    0.0
                };
                SegmentStats {
                    segment,
                    count,
                    percentage,
                    sample_users,
                }
            })
            .collect();

        SegmentReport {
            total_users: total,
            segments,
            rejected: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(clicks: i64, session: f64, tickets: i64, days: i64, usage: f64) -> FeatureVector {
        FeatureVector::new(clicks, session, tickets, days, usage).unwrap()
    }

    #[test]
    fn test_cascade_order() {
        let classifier = SegmentClassifier::new();

        // Power-user activity but signed up ten days ago
        assert_eq!(classifier.segment(&vector(900, 45.0, 0, 10, 90.0)), Segment::NewUsers);
        assert_eq!(classifier.segment(&vector(900, 45.0, 0, 31, 90.0)), Segment::PowerUsers);
        assert_eq!(classifier.segment(&vector(40, 45.0, 0, 200, 90.0)), Segment::Dormant);
        assert_eq!(classifier.segment(&vector(200, 4.9, 9, 200, 10.0)), Segment::Dormant);
        assert_eq!(classifier.segment(&vector(200, 10.0, 4, 200, 80.0)), Segment::AtRisk);
        assert_eq!(classifier.segment(&vector(200, 10.0, 0, 200, 29.9)), Segment::AtRisk);
        assert_eq!(classifier.segment(&vector(200, 10.0, 3, 200, 30.0)), Segment::Engaged);
    }

    #[test]
    fn test_boundaries() {
        let classifier = SegmentClassifier::new();

        assert_eq!(classifier.segment(&vector(200, 10.0, 0, 30, 50.0)), Segment::NewUsers);
        // Exactly 500 clicks is not a power user
        assert_eq!(classifier.segment(&vector(500, 45.0, 0, 100, 90.0)), Segment::Engaged);
        assert_eq!(classifier.segment(&vector(50, 5.0, 0, 100, 50.0)), Segment::Engaged);
    }

    #[test]
    fn test_batch_stats() {
        let classifier = SegmentClassifier::new();
        let mut members = Vec::new();
        for i in 0..7 {
            members.push((format!("new_{}", i), vector(100, 10.0, 0, 5, 50.0)));
        }
        members.push(("engaged_0".to_string(), vector(200, 10.0, 0, 100, 50.0)));

        let report = classifier.segment_batch(&members);

        assert_eq!(report.total_users, 8);
        let order: Vec<Segment> = report.segments.iter().map(|s| s.segment).collect();
        assert_eq!(order, Segment::REPORT_ORDER.to_vec());

        let new_users = report.get(Segment::NewUsers).unwrap();
        assert_eq!(new_users.count, 7);
        assert_eq!(new_users.percentage, 87.5);
        assert_eq!(
            new_users.sample_users,
            vec!["new_0", "new_1", "new_2", "new_3", "new_4"]
        );

        let engaged = report.get(Segment::Engaged).unwrap();
        assert_eq!(engaged.count, 1);
        assert_eq!(engaged.percentage, 12.5);

        let total: usize = report.segments.iter().map(|s| s.count).sum();
        assert_eq!(total, report.total_users);
    }

    #[test]
    fn test_percentage_rounds_half_to_even() {
        let classifier = SegmentClassifier::new();
        let mut members = vec![("power_0".to_string(), vector(800, 45.0, 0, 100, 90.0))];
        for i in 0..399 {
            members.push((format!("engaged_{}", i), vector(200, 10.0, 0, 100, 50.0)));
        }

        let report = classifier.segment_batch(&members);

        // 0.25% and 99.75%
        assert_eq!(report.get(Segment::PowerUsers).unwrap().percentage, 0.2);
        assert_eq!(report.get(Segment::Engaged).unwrap().percentage, 99.8);
    }

    #[test]
    fn test_empty_batch() {
        let classifier = SegmentClassifier::new();
        let report = classifier.segment_batch::<String>(&[]);

        assert_eq!(report.total_users, 0);
        assert_eq!(report.segments.len(), 5);
        assert!(report.segments.iter().all(|s| s.count == 0 && s.percentage == 0.0));
    }
}
