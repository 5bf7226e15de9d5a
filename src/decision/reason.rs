//! Heuristic ranking of the most salient churn cause.
//!
//! Scores are fixed saliency weights, not calibrated feature importances.
//! Rules are grouped: within a group only the first matching rule contributes
//! (an else-if chain), across groups every matching rule contributes.

use crate::types::features::FeatureVector;
use serde::Serialize;

/// Reason returned when no rule fires
pub const HEALTHY_USER: &str = "Healthy User";

/// A matched rule and its saliency score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReasonCandidate {
    pub label: &'static str,
    pub score: i64,
}

struct ReasonRule {
    label: &'static str,
    score: fn(&FeatureVector) -> Option<i64>,
}

/// Rule groups in evaluation order. Ties on score keep this order.
const REASON_RULES: &[&[ReasonRule]] = &[
    &[
        ReasonRule {
            label: "High Friction",
            score: high_friction,
        },
        ReasonRule {
            label: "Support Issues",
            score: support_issues,
        },
    ],
    &[
        ReasonRule {
            label: "Low Engagement",
            score: low_engagement,
        },
        ReasonRule {
            label: "Low Activity",
            score: low_activity,
        },
    ],
    &[ReasonRule {
        label: "Short Sessions",
        score: short_sessions,
    }],
    &[ReasonRule {
        label: "Underutilizing Features",
        score: underutilizing_features,
    }],
    &[ReasonRule {
        label: "Stale Account",
        score: stale_account,
    }],
];

fn high_friction(v: &FeatureVector) -> Option<i64> {
    let tickets = v.support_tickets() as i64;
    (tickets > 5).then_some(tickets * 10)
}

fn support_issues(v: &FeatureVector) -> Option<i64> {
    let tickets = v.support_tickets() as i64;
    (tickets > 3).then_some(tickets * 5)
}

fn low_engagement(v: &FeatureVector) -> Option<i64> {
    let clicks = v.total_clicks() as i64;
    (clicks < 10).then_some((10 - clicks) * 8)
}

fn low_activity(v: &FeatureVector) -> Option<i64> {
    let clicks = v.total_clicks() as i64;
    (clicks < 50).then_some((50 - clicks) * 2)
}

fn short_sessions(v: &FeatureVector) -> Option<i64> {
    let minutes = v.avg_session_time();
    (minutes < 2.0).then(|| ((2.0 - minutes) * 15.0).floor() as i64)
}

fn underutilizing_features(v: &FeatureVector) -> Option<i64> {
    let score = v.feature_usage_score();
    (score < 20.0).then(|| (20.0 - score).floor() as i64)
}

fn stale_account(v: &FeatureVector) -> Option<i64> {
    (v.days_since_signup() > 60 && v.total_clicks() < 30).then_some(25)
}

/// Picks the highest scoring churn cause for a user
#[derive(Debug, Clone, Copy, Default)]
pub struct ReasonExplainer;

impl ReasonExplainer {
    pub fn new() -> Self {
        Self
    }

    /// All matching candidates, highest score first, ties in rule order
    pub fn rank(&self, vector: &FeatureVector) -> Vec<ReasonCandidate> {
        let mut candidates: Vec<ReasonCandidate> = REASON_RULES
            .iter()
            .filter_map(|group| {
                group.iter().find_map(|rule| {
                    (rule.score)(vector).map(|score| ReasonCandidate {
                        label: rule.label,
                        score,
                    })
                })
            })
            .collect();

        // sort_by is stable, so equal scores keep evaluation order
        candidates.sort_by(|a, b| b.score.cmp(&a.score));
        candidates
    }

    /// Label of the most salient cause, or "Healthy User"
    pub fn explain(&self, vector: &FeatureVector) -> &'static str {
        self.rank(vector)
            .first()
            .map(|c| c.label)
            .unwrap_or(HEALTHY_USER)
    }
}
