//! Validated user behavior features

use crate::error::{ChurnError, Result};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Behavioral features, in the order the classifier was calibrated on
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    TotalClicks,
    AvgSessionTime,
    SupportTickets,
    DaysSinceSignup,
    FeatureUsageScore,
}

impl Feature {
    /// All features in model input order
    pub const ALL: [Feature; 5] = [
        Feature::TotalClicks,
        Feature::AvgSessionTime,
        Feature::SupportTickets,
        Feature::DaysSinceSignup,
        Feature::FeatureUsageScore,
    ];

    /// Column name used by the model metadata and the feature store
    pub fn name(self) -> &'static str {
        match self {
            Feature::TotalClicks => "total_clicks",
            Feature::AvgSessionTime => "avg_session_time",
            Feature::SupportTickets => "support_tickets",
            Feature::DaysSinceSignup => "days_since_signup",
            Feature::FeatureUsageScore => "feature_usage_score",
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Maximum value of `feature_usage_score`
pub const MAX_USAGE_SCORE: f64 = 100.0;

/// A validated, immutable feature vector for one user.
///
/// Every decision operation takes this type, so range checks happen once at
/// construction (or deserialization) and never again downstream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFeatures")]
pub struct FeatureVector {
    total_clicks: u32,
    avg_session_time: f64,
    support_tickets: u32,
    days_since_signup: u32,
    feature_usage_score: f64,
}

/// Unvalidated wire form of [`FeatureVector`]
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RawFeatures {
    #[serde(deserialize_with = "whole_number")]
    pub total_clicks: i64,
    pub avg_session_time: f64,
    #[serde(deserialize_with = "whole_number")]
    pub support_tickets: i64,
    #[serde(deserialize_with = "whole_number")]
    pub days_since_signup: i64,
    pub feature_usage_score: f64,
}

impl FeatureVector {
    /// Validate raw values and build a feature vector
    pub fn new(
        total_clicks: i64,
        avg_session_time: f64,
        support_tickets: i64,
        days_since_signup: i64,
        feature_usage_score: f64,
    ) -> Result<Self> {
        let avg_session_time = non_negative_real("avg_session_time", avg_session_time)?;
        let feature_usage_score = non_negative_real("feature_usage_score", feature_usage_score)?;
        if feature_usage_score > MAX_USAGE_SCORE {
            return Err(ChurnError::validation(
                "feature_usage_score",
                format!("must be at most {}, got {}", MAX_USAGE_SCORE, feature_usage_score),
            ));
        }

        Ok(Self {
            total_clicks: count("total_clicks", total_clicks)?,
            avg_session_time,
            support_tickets: count("support_tickets", support_tickets)?,
            days_since_signup: count("days_since_signup", days_since_signup)?,
            feature_usage_score,
        })
    }

    pub fn total_clicks(&self) -> u32 {
        self.total_clicks
    }

    /// Average session length in minutes
    pub fn avg_session_time(&self) -> f64 {
        self.avg_session_time
    }

    pub fn support_tickets(&self) -> u32 {
        self.support_tickets
    }

    pub fn days_since_signup(&self) -> u32 {
        self.days_since_signup
    }

    /// Feature usage score in [0, 100]
    pub fn feature_usage_score(&self) -> f64 {
        self.feature_usage_score
    }

    /// Value of a single feature as a real number
    pub fn value(&self, feature: Feature) -> f64 {
        match feature {
            Feature::TotalClicks => self.total_clicks as f64,
            Feature::AvgSessionTime => self.avg_session_time,
            Feature::SupportTickets => self.support_tickets as f64,
            Feature::DaysSinceSignup => self.days_since_signup as f64,
            Feature::FeatureUsageScore => self.feature_usage_score,
        }
    }
}

impl TryFrom<RawFeatures> for FeatureVector {
    type Error = ChurnError;

    fn try_from(raw: RawFeatures) -> Result<Self> {
        FeatureVector::new(
            raw.total_clicks,
            raw.avg_session_time,
            raw.support_tickets,
            raw.days_since_signup,
            raw.feature_usage_score,
        )
    }
}

struct WholeNumberVisitor;

impl<'de> Visitor<'de> for WholeNumberVisitor {
    type Value = i64;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a whole number")
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> std::result::Result<i64, E> {
        Ok(value)
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> std::result::Result<i64, E> {
        i64::try_from(value).map_err(|_| E::custom(format!("value {} is too large", value)))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> std::result::Result<i64, E> {
        // Accepts `50.0`, rejects `50.5`
        if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
            Ok(value as i64)
        } else {
            Err(E::invalid_value(de::Unexpected::Float(value), &self))
        }
    }
}

/// Integer field that also accepts floats with a zero fraction
pub(crate) fn whole_number<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<i64, D::Error> {
    deserializer.deserialize_any(WholeNumberVisitor)
}

fn count(field: &'static str, value: i64) -> Result<u32> {
    if value < 0 {
        return Err(ChurnError::validation(
            field,
            format!("must be non-negative, got {}", value),
        ));
    }
    u32::try_from(value)
        .map_err(|_| ChurnError::validation(field, format!("value {} is too large", value)))
}

fn non_negative_real(field: &'static str, value: f64) -> Result<f64> {
    if !value.is_finite() {
        return Err(ChurnError::validation(field, "must be a finite number"));
    }
    if value < 0.0 {
        return Err(ChurnError::validation(
            field,
            format!("must be non-negative, got {}", value),
        ));
    }
    Ok(value)
}
