//! Request routing from subject suffixes to decision service operations

use crate::error::ChurnError;
use crate::metrics::ServiceMetrics;
use crate::service::DecisionService;
use crate::types::features::{FeatureVector, RawFeatures};
use crate::types::prediction::{BatchPolicy, PredictionResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Operations reachable over the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Health,
    Predict,
    PredictBatch,
    ModelInfo,
    ModelStatus,
    ModelReload,
    UsersRisk,
    Segments,
    Drift,
}

impl Route {
    pub const ALL: [Route; 9] = [
        Route::Health,
        Route::Predict,
        Route::PredictBatch,
        Route::ModelInfo,
        Route::ModelStatus,
        Route::ModelReload,
        Route::UsersRisk,
        Route::Segments,
        Route::Drift,
    ];

    /// Subject suffix after the configured prefix
    pub fn suffix(&self) -> &'static str {
        match self {
            Route::Health => "health",
            Route::Predict => "predict",
            Route::PredictBatch => "predict.batch",
            Route::ModelInfo => "model.info",
            Route::ModelStatus => "model.status",
            Route::ModelReload => "model.reload",
            Route::UsersRisk => "users.risk",
            Route::Segments => "segments",
            Route::Drift => "model.drift",
        }
    }

    /// Resolve a full subject such as `churn.predict.batch`
    pub fn from_subject(prefix: &str, subject: &str) -> Option<Route> {
        let suffix = subject.strip_prefix(prefix)?.strip_prefix('.')?;
        Route::ALL.into_iter().find(|route| route.suffix() == suffix)
    }
}

/// Error body sent back to requesters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ErrorBody {
    pub fn unknown_subject(subject: &str) -> Self {
        Self {
            code: "UNKNOWN_SUBJECT".to_string(),
            message: format!("no handler for subject {}", subject),
        }
    }
}

impl From<ChurnError> for ErrorBody {
    fn from(e: ChurnError) -> Self {
        Self {
            code: e.error_code().to_string(),
            message: e.to_string(),
        }
    }
}

/// Envelope for failed requests: `{"error": {"code", "message"}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct BatchRequest {
    users: Vec<RawFeatures>,
    #[serde(default)]
    policy: BatchPolicy,
}

#[derive(Debug, Default, Deserialize)]
struct RiskQuery {
    limit: Option<usize>,
    #[serde(default)]
    min_risk: f64,
}

#[derive(Debug, Default, Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

/// Decode a payload, treating an empty body as the default query
fn query_or_default<T: DeserializeOwned + Default>(payload: &[u8]) -> Result<T, ChurnError> {
    if payload.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(T::default());
    }
    Ok(serde_json::from_slice(payload)?)
}

fn to_json<T: Serialize>(value: T) -> Result<Value, ChurnError> {
    Ok(serde_json::to_value(value)?)
}

/// Dispatches decoded requests to the decision service
#[derive(Clone)]
pub struct RequestHandler {
    service: Arc<DecisionService>,
    metrics: Arc<ServiceMetrics>,
}

impl RequestHandler {
    pub fn new(service: Arc<DecisionService>, metrics: Arc<ServiceMetrics>) -> Self {
        Self { service, metrics }
    }

    pub fn service(&self) -> &Arc<DecisionService> {
        &self.service
    }

    /// Run one request and produce its JSON response body
    pub async fn handle(&self, route: Route, payload: &[u8]) -> Result<Value, ErrorBody> {
        let start = Instant::now();
        let result = self.dispatch(route, payload).await;
        let elapsed = start.elapsed();

        self.metrics.record_request(route.suffix(), elapsed);
        match result {
            Ok(body) => {
                debug!(
                    route = route.suffix(),
                    latency_us = elapsed.as_micros() as u64,
                    "Request handled"
                );
                Ok(body)
            }
            Err(e) => {
                warn!(route = route.suffix(), code = e.error_code(), error = %e, "Request failed");
                self.metrics.record_error(e.error_code());
                Err(ErrorBody::from(e))
            }
        }
    }

    /// Resolve `subject` under `prefix` and handle it; unknown subjects
    /// count as failed requests
    pub async fn handle_subject(&self, prefix: &str, subject: &str, payload: &[u8]) -> Result<Value, ErrorBody> {
        match Route::from_subject(prefix, subject) {
            Some(route) => self.handle(route, payload).await,
            None => {
                let error = ErrorBody::unknown_subject(subject);
                warn!(subject = %subject, "Request for unknown subject");
                self.metrics.record_error(&error.code);
                Err(error)
            }
        }
    }

    fn observe<'a>(&self, predictions: impl IntoIterator<Item = &'a PredictionResult>) {
        for prediction in predictions {
            self.metrics.record_prediction(prediction);
        }
    }

    async fn dispatch(&self, route: Route, payload: &[u8]) -> Result<Value, ChurnError> {
        let service = &self.service;

        match route {
            Route::Health => to_json(service.health()),
            Route::Predict => {
                let raw: RawFeatures = serde_json::from_slice(payload)?;
                let prediction = service.score(&FeatureVector::try_from(raw)?)?;
                self.observe([&prediction]);
                to_json(prediction)
            }
            Route::PredictBatch => {
                let request: BatchRequest = serde_json::from_slice(payload)?;
                let batch = service.score_raw_batch(&request.users, request.policy)?;
                self.observe(&batch.predictions);
                to_json(batch)
            }
            Route::ModelInfo => to_json(service.model_info()?),
            Route::ModelStatus => to_json(service.model_status()?),
            Route::ModelReload => {
                let service = service.clone();
                let status = tokio::task::spawn_blocking(move || service.reload_model())
                    .await
                    .map_err(|e| ChurnError::Configuration(format!("reload task failed: {}", e)))??;
                to_json(status)
            }
            Route::UsersRisk => {
                let query: RiskQuery = query_or_default(payload)?;
                to_json(service.users_with_risk(query.limit, query.min_risk).await?)
            }
            Route::Segments => {
                let query: LimitQuery = query_or_default(payload)?;
                to_json(service.segment_users(query.limit).await?)
            }
            Route::Drift => {
                let query: LimitQuery = query_or_default(payload)?;
                to_json(service.drift_from_store(query.limit).await?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::inference::tests::stub_model;
    use crate::models::ModelHandle;
    use crate::store::InMemoryStore;
    use crate::types::prediction::RiskLevel;
    use crate::types::user::UserRecord;

    fn handler() -> RequestHandler {
        let users = (0..4)
            .map(|i| {
                let v = FeatureVector::new(100 * i, 12.0, i, 10 + 40 * i, 55.0).unwrap();
                UserRecord::new(format!("user_{}", i), &v)
            })
            .collect();
        let service = DecisionService::new(Arc::new(ModelHandle::with_model(stub_model(None))))
            .with_store(Arc::new(InMemoryStore::with_users(users)));
        RequestHandler::new(Arc::new(service), Arc::new(ServiceMetrics::new()))
    }

    #[test]
    fn test_route_from_subject() {
        assert_eq!(Route::from_subject("churn", "churn.predict"), Some(Route::Predict));
        assert_eq!(
            Route::from_subject("churn", "churn.predict.batch"),
            Some(Route::PredictBatch)
        );
        assert_eq!(Route::from_subject("churn", "churn.model.drift"), Some(Route::Drift));
        assert_eq!(Route::from_subject("churn", "churnpredict"), None);
        assert_eq!(Route::from_subject("churn", "other.predict"), None);
        assert_eq!(Route::from_subject("churn", "churn.unknown"), None);
    }

    #[tokio::test]
    async fn test_predict() {
        let payload = br#"{"total_clicks": 5, "avg_session_time": 1.0, "support_tickets": 7,
            "days_since_signup": 100, "feature_usage_score": 10.0}"#;

        let body = handler().handle(Route::Predict, payload).await.unwrap();

        assert_eq!(body["risk_level"], "HIGH");
        assert_eq!(body["primary_reason"], "High Friction");
        assert_eq!(body["is_churned"], true);
    }

    #[tokio::test]
    async fn test_requests_are_counted() {
        let handler = handler();
        let payload = br#"{"total_clicks": 5, "avg_session_time": 1.0, "support_tickets": 7,
            "days_since_signup": 100, "feature_usage_score": 10.0}"#;

        handler.handle(Route::Predict, payload).await.unwrap();
        handler.handle(Route::Predict, b"{}").await.unwrap_err();

        let metrics = &handler.metrics;
        assert_eq!(metrics.get_requests_by_route()["predict"], 2);
        assert_eq!(metrics.get_errors_by_code()["SERIALIZATION_ERROR"], 1);
        assert_eq!(metrics.get_predictions_by_tier()[&RiskLevel::High], 1);
    }

    #[tokio::test]
    async fn test_predict_rejects_invalid_features() {
        let payload = br#"{"total_clicks": 5, "avg_session_time": 1.0, "support_tickets": 7,
            "days_since_signup": 100, "feature_usage_score": 140.0}"#;

        let err = handler().handle(Route::Predict, payload).await.unwrap_err();
        assert_eq!(err.code, "VALIDATION_ERROR");

        let err = handler().handle(Route::Predict, b"not json").await.unwrap_err();
        assert_eq!(err.code, "SERIALIZATION_ERROR");
    }

    #[tokio::test]
    async fn test_predict_batch_reports_failing_index() {
        let payload = br#"{"users": [
            {"total_clicks": 5, "avg_session_time": 1.0, "support_tickets": 7, "days_since_signup": 100, "feature_usage_score": 10.0},
            {"total_clicks": -1, "avg_session_time": 1.0, "support_tickets": 0, "days_since_signup": 100, "feature_usage_score": 10.0}
        ]}"#;

        let err = handler().handle(Route::PredictBatch, payload).await.unwrap_err();
        assert_eq!(err.code, "VALIDATION_ERROR");
        assert!(err.message.contains("Batch record 1"));
    }

    #[tokio::test]
    async fn test_store_routes_accept_empty_payload() {
        let handler = handler();

        let risk = handler.handle(Route::UsersRisk, b"").await.unwrap();
        assert_eq!(risk["total_count"], 4);

        let segments = handler.handle(Route::Segments, b"").await.unwrap();
        assert_eq!(segments["total_users"], 4);

        let drift = handler.handle(Route::Drift, br#"{"limit": 2}"#).await.unwrap();
        assert_eq!(drift["sample_size"], 2);
    }

    #[tokio::test]
    async fn test_model_routes() {
        let handler = handler();

        let info = handler.handle(Route::ModelInfo, b"").await.unwrap();
        assert_eq!(info["features"][0], "total_clicks");

        let status = handler.handle(Route::ModelStatus, b"").await.unwrap();
        assert_eq!(status["status"], "idle");

        let err = handler.handle(Route::ModelReload, b"").await.unwrap_err();
        assert_eq!(err.code, "CONFIGURATION_ERROR");
    }

    #[tokio::test]
    async fn test_unknown_subject_is_counted() {
        let handler = handler();

        let err = handler.handle_subject("churn", "churn.nope", b"").await.unwrap_err();
        assert_eq!(err.code, "UNKNOWN_SUBJECT");
        assert_eq!(handler.metrics.get_errors_by_code()["UNKNOWN_SUBJECT"], 1);

        let body = handler.handle_subject("churn", "churn.health", b"").await.unwrap();
        assert_eq!(body["status"], "healthy");
    }

    #[test]
    fn test_error_envelope_shape() {
        let envelope = ErrorEnvelope {
            error: ErrorBody::unknown_subject("churn.nope"),
        };
        let json = serde_json::to_value(&envelope).unwrap();

        assert_eq!(json["error"]["code"], "UNKNOWN_SUBJECT");
        assert!(json["error"]["message"].as_str().unwrap().contains("churn.nope"));
    }
}
