//! PostgREST (Supabase) backed feature store

use crate::config::StoreConfig;
use crate::error::{ChurnError, Result};
use crate::store::FeatureStore;
use crate::types::user::UserRecord;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use std::time::Duration;
use tracing::debug;

/// Feature store client for a Supabase `user_segments` table
#[derive(Clone)]
pub struct SupabaseStore {
    client: Client,
    base_url: String,
    api_key: String,
    table: String,
}

impl SupabaseStore {
    /// Create a client from store configuration.
    ///
    /// Fails with `DataSourceUnavailable` when the URL or key is missing.
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let (base_url, api_key) = match (&config.url, &config.api_key) {
            (Some(url), Some(key)) if !url.is_empty() && !key.is_empty() => (url, key),
            _ => {
                return Err(ChurnError::DataSourceUnavailable(
                    "feature store not configured".to_string(),
                ))
            }
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ChurnError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.clone(),
            table: config.table.clone(),
        })
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| ChurnError::DataSourceUnavailable(format!("request to {} failed: {}", self.table, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChurnError::DataSourceUnavailable(format!(
                "{} returned {}: {}",
                self.table, status, body
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl FeatureStore for SupabaseStore {
    async fn fetch_users(&self, limit: Option<usize>) -> Result<Vec<UserRecord>> {
        let mut request = self.client.get(self.table_url()).query(&[("select", "*")]);
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit)]);
        }

        let users: Vec<UserRecord> = self
            .send(request)
            .await?
            .json()
            .await
            .map_err(|e| ChurnError::DataSourceUnavailable(format!("invalid rows from {}: {}", self.table, e)))?;

        debug!(table = %self.table, rows = users.len(), "Fetched user rows");
        Ok(users)
    }

    async fn insert_users(&self, users: &[UserRecord]) -> Result<usize> {
        if users.is_empty() {
            return Ok(0);
        }

        let request = self
            .client
            .post(self.table_url())
            .header("Prefer", "return=representation")
            .json(users);

        let inserted: Vec<UserRecord> = self
            .send(request)
            .await?
            .json()
            .await
            .map_err(|e| ChurnError::DataSourceUnavailable(format!("invalid insert response: {}", e)))?;

        Ok(inserted.len())
    }
}
