//! User rows as stored in the `user_segments` table

use crate::error::Result;
use crate::types::features::{whole_number, FeatureVector};
use serde::{Deserialize, Serialize};

/// A user row from the feature store.
///
/// Raw values are kept unvalidated so a single bad row can be reported by id
/// instead of failing the whole fetch. Missing columns read as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Store-assigned row id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// External user identifier
    pub user_id: String,

    #[serde(default, deserialize_with = "whole_number")]
    pub total_clicks: i64,

    /// Average session length in minutes
    #[serde(default)]
    pub avg_session_time: f64,

    #[serde(default, deserialize_with = "whole_number")]
    pub support_tickets: i64,

    #[serde(default, deserialize_with = "whole_number")]
    pub days_since_signup: i64,

    /// Feature usage score (0-100)
    #[serde(default)]
    pub feature_usage_score: f64,

    /// Observed churn outcome, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_churned: Option<bool>,
}

impl UserRecord {
    /// Create a record for a user from validated features
    pub fn new(user_id: impl Into<String>, features: &FeatureVector) -> Self {
        Self {
            id: None,
            user_id: user_id.into(),
            total_clicks: features.total_clicks() as i64,
            avg_session_time: features.avg_session_time(),
            support_tickets: features.support_tickets() as i64,
            days_since_signup: features.days_since_signup() as i64,
            feature_usage_score: features.feature_usage_score(),
            is_churned: None,
        }
    }

    /// Attach the observed churn outcome
    pub fn with_churned(mut self, is_churned: bool) -> Self {
        self.is_churned = Some(is_churned);
        self
    }

    /// Validate the raw columns into a feature vector
    pub fn features(&self) -> Result<FeatureVector> {
        FeatureVector::new(
            self.total_clicks,
            self.avg_session_time,
            self.support_tickets,
            self.days_since_signup,
            self.feature_usage_score,
        )
    }
}
