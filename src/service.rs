//! Decision service: composes the predictor, the decision components and the
//! optional feature store behind the operations exposed to the transport.

use crate::config::StoreConfig;
use crate::decision::{Baseline, DriftDetector, ReasonExplainer, RiskClassifier, SegmentClassifier};
use crate::error::{ChurnError, Result};
use crate::models::{ModelHandle, ModelProvider, Predictor};
use crate::store::FeatureStore;
use crate::types::drift::DriftReport;
use crate::types::features::{FeatureVector, RawFeatures};
use crate::types::model::{HealthStatus, ModelInfo, ModelStatus};
use crate::types::prediction::{
    round_to, BatchPolicy, BatchPrediction, PredictionResult, RejectedRecord, UserRisk,
    UsersWithRisk,
};
use crate::types::segment::SegmentReport;
use crate::types::user::UserRecord;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// Probability at or above which a stored user counts toward the
/// `high_risk_count` of the risk listing
pub const WATCHLIST_PROBABILITY: f64 = 0.8;

/// Default row limits for store-backed operations
#[derive(Debug, Clone, Copy)]
pub struct StoreLimits {
    pub risk: usize,
    pub segments: usize,
    pub drift: usize,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self::from(&StoreConfig::default())
    }
}

impl From<&StoreConfig> for StoreLimits {
    fn from(config: &StoreConfig) -> Self {
        Self {
            risk: config.risk_limit,
            segments: config.segment_limit,
            drift: config.drift_limit,
        }
    }
}

/// Composition root of the decision layer
pub struct DecisionService {
    predictor: Predictor,
    risk: RiskClassifier,
    reasons: ReasonExplainer,
    segments: SegmentClassifier,
    drift: DriftDetector,
    store: Option<Arc<dyn FeatureStore>>,
    provider: Option<Arc<dyn ModelProvider>>,
    batch_policy: BatchPolicy,
    limits: StoreLimits,
}

impl DecisionService {
    pub fn new(handle: Arc<ModelHandle>) -> Self {
        Self {
            predictor: Predictor::new(handle),
            risk: RiskClassifier::new(),
            reasons: ReasonExplainer::new(),
            segments: SegmentClassifier::new(),
            drift: DriftDetector::default(),
            store: None,
            provider: None,
            batch_policy: BatchPolicy::default(),
            limits: StoreLimits::default(),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn FeatureStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_model_provider(mut self, provider: Arc<dyn ModelProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Policy applied to store-backed batches
    pub fn with_batch_policy(mut self, policy: BatchPolicy) -> Self {
        self.batch_policy = policy;
        self
    }

    pub fn with_limits(mut self, limits: StoreLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_baseline(mut self, baseline: Baseline) -> Self {
        self.drift = DriftDetector::new(baseline);
        self
    }

    pub fn limits(&self) -> StoreLimits {
        self.limits
    }

    // ------------------------------------------------------------------
    // Scoring
    // ------------------------------------------------------------------

    /// Full churn assessment for one user
    pub fn score(&self, vector: &FeatureVector) -> Result<PredictionResult> {
        let score = self.predictor.score(vector)?;
        let (risk_level, recommendation) = self.risk.classify(score.probability);

        Ok(PredictionResult {
            is_churned: score.is_churned,
            churn_probability: round_to(score.probability, 4),
            risk_level,
            recommendation: recommendation.to_string(),
            primary_reason: self.reasons.explain(vector).to_string(),
        })
    }

    /// Score validated vectors and aggregate tier counts
    pub fn score_batch(&self, vectors: &[FeatureVector], policy: BatchPolicy) -> Result<BatchPrediction> {
        self.predictor.handle().current()?;

        let (predictions, rejected) = apply_policy(
            vectors,
            policy,
            |index, _| format!("user #{}", index),
            |vector| self.score(vector),
        )?;

        Ok(BatchPrediction::from_predictions(predictions, rejected))
    }

    /// Validate and score wire-form feature sets
    pub fn score_raw_batch(&self, raws: &[RawFeatures], policy: BatchPolicy) -> Result<BatchPrediction> {
        self.predictor.handle().current()?;

        let (predictions, rejected) = apply_policy(
            raws,
            policy,
            |index, _| format!("user #{}", index),
            |raw| self.score(&FeatureVector::try_from(*raw)?),
        )?;

        Ok(BatchPrediction::from_predictions(predictions, rejected))
    }

    // ------------------------------------------------------------------
    // Segmentation and drift
    // ------------------------------------------------------------------

    /// Segment `(user_id, features)` pairs
    pub fn segment_batch<S: AsRef<str>>(&self, members: &[(S, FeatureVector)]) -> SegmentReport {
        self.segments.segment_batch(members)
    }

    /// Compare a sample against the calibration baseline
    pub fn check_drift(&self, sample: &[FeatureVector]) -> DriftReport {
        self.drift.report(sample)
    }

    // ------------------------------------------------------------------
    // Model lifecycle
    // ------------------------------------------------------------------

    pub fn model_info(&self) -> Result<ModelInfo> {
        let model = self.predictor.handle().current()?;
        Ok(ModelInfo::from(&model.metadata))
    }

    pub fn model_status(&self) -> Result<ModelStatus> {
        let model = self.predictor.handle().current()?;
        Ok(ModelStatus {
            model_version: model.metadata.model_version.clone(),
            trained_at: model.metadata.trained_at.clone(),
            loaded_at: model.loaded_at,
            status: "idle".to_string(),
        })
    }

    /// Load the model artifact again and swap it in atomically
    pub fn reload_model(&self) -> Result<ModelStatus> {
        let provider = self
            .provider
            .as_ref()
            .ok_or_else(|| ChurnError::Configuration("no model provider configured".to_string()))?;

        let model = provider.load()?;
        info!(
            model_version = %model.metadata.model_version,
            trained_at = %model.metadata.trained_at,
            "Reloading churn model"
        );
        self.predictor.handle().swap(model)?;

        self.model_status()
    }

    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            status: "healthy".to_string(),
            model_loaded: self.predictor.handle().is_loaded(),
            store_configured: self.store.is_some(),
            timestamp: Utc::now(),
        }
    }

    // ------------------------------------------------------------------
    // Store-backed operations
    // ------------------------------------------------------------------

    fn store(&self) -> Result<&Arc<dyn FeatureStore>> {
        self.store
            .as_ref()
            .ok_or_else(|| ChurnError::DataSourceUnavailable("feature store not configured".to_string()))
    }

    /// Validate stored rows under the configured batch policy
    fn validate_records(
        &self,
        records: &[UserRecord],
    ) -> Result<(Vec<(String, FeatureVector)>, Vec<RejectedRecord>)> {
        apply_policy(
            records,
            self.batch_policy,
            |_, record| record.user_id.clone(),
            |record| Ok((record.user_id.clone(), record.features()?)),
        )
    }

    /// Score stored users, keep those at or above `min_risk`, highest first
    pub async fn users_with_risk(&self, limit: Option<usize>, min_risk: f64) -> Result<UsersWithRisk> {
        self.predictor.handle().current()?;

        let records = self
            .store()?
            .fetch_users(Some(limit.unwrap_or(self.limits.risk)))
            .await?;

        let (mut users, rejected) = apply_policy(
            &records,
            self.batch_policy,
            |_, record| record.user_id.clone(),
            |record| {
                let prediction = self.score(&record.features()?)?;
                Ok(UserRisk {
                    user: record.clone(),
                    churn_probability: prediction.churn_probability,
                    risk_level: prediction.risk_level,
                    primary_reason: prediction.primary_reason,
                    recommendation: prediction.recommendation,
                })
            },
        )?;

        users.retain(|u| u.churn_probability >= min_risk);
        users.sort_by(|a, b| b.churn_probability.total_cmp(&a.churn_probability));

        let high_risk_count = users
            .iter()
            .filter(|u| u.churn_probability >= WATCHLIST_PROBABILITY)
            .count();

        Ok(UsersWithRisk {
            total_count: users.len(),
            users,
            high_risk_count,
            rejected,
        })
    }

    /// Segment stored users
    pub async fn segment_users(&self, limit: Option<usize>) -> Result<SegmentReport> {
        let records = self
            .store()?
            .fetch_users(Some(limit.unwrap_or(self.limits.segments)))
            .await?;

        let (members, rejected) = self.validate_records(&records)?;
        let mut report = self.segment_batch(&members);
        report.rejected = rejected;
        Ok(report)
    }

    /// Drift check over the most recent stored users
    pub async fn drift_from_store(&self, limit: Option<usize>) -> Result<DriftReport> {
        let records = self
            .store()?
            .fetch_users(Some(limit.unwrap_or(self.limits.drift)))
            .await?;

        let (members, rejected) = self.validate_records(&records)?;
        let sample: Vec<FeatureVector> = members.into_iter().map(|(_, v)| v).collect();

        let mut report = self.check_drift(&sample);
        report.rejected = rejected;
        Ok(report)
    }
}

/// Run `op` over every item under a batch policy.
///
/// Fail-fast wraps the first error with the item's position and id.
/// Skip-and-report collects failures and keeps going.
fn apply_policy<T, R>(
    items: &[T],
    policy: BatchPolicy,
    record_id: impl Fn(usize, &T) -> String,
    mut op: impl FnMut(&T) -> Result<R>,
) -> Result<(Vec<R>, Vec<RejectedRecord>)> {
    let mut succeeded = Vec::with_capacity(items.len());
    let mut rejected = Vec::new();

    for (index, item) in items.iter().enumerate() {
        match op(item) {
            Ok(result) => succeeded.push(result),
            Err(e) => match policy {
                BatchPolicy::FailFast => return Err(e.in_batch(index, record_id(index, item))),
                BatchPolicy::SkipAndReport => {
                    let record = record_id(index, item);
                    warn!(index = index, record = %record, error = %e, "Skipping batch record");
                    rejected.push(RejectedRecord {
                        index,
                        record: Some(record),
                        code: e.error_code().to_string(),
                        error: e.to_string(),
                    });
                }
            },
        }
    }

    Ok((succeeded, rejected))
}
