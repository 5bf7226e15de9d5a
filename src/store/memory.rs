//! In-process feature store for tests and dry runs

use crate::error::{ChurnError, Result};
use crate::store::FeatureStore;
use crate::types::user::UserRecord;
use async_trait::async_trait;
use std::sync::RwLock;

/// Feature store holding rows in memory
#[derive(Debug)]
pub struct InMemoryStore {
    users: RwLock<Vec<UserRecord>>,
    available: bool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_users(Vec::new())
    }

    pub fn with_users(users: Vec<UserRecord>) -> Self {
        Self {
            users: RwLock::new(users),
            available: true,
        }
    }

    /// A store whose every call fails with `DataSourceUnavailable`
    pub fn unavailable() -> Self {
        Self {
            users: RwLock::new(Vec::new()),
            available: false,
        }
    }

    fn check_available(&self) -> Result<()> {
        if self.available {
            Ok(())
        } else {
            Err(ChurnError::DataSourceUnavailable("in-memory store is offline".to_string()))
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeatureStore for InMemoryStore {
    async fn fetch_users(&self, limit: Option<usize>) -> Result<Vec<UserRecord>> {
        self.check_available()?;
        let users = self
            .users
            .read()
            .map_err(|e| ChurnError::DataSourceUnavailable(format!("Lock error: {}", e)))?;

        let limit = limit.unwrap_or(users.len());
        Ok(users.iter().take(limit).cloned().collect())
    }

    async fn insert_users(&self, users: &[UserRecord]) -> Result<usize> {
        self.check_available()?;
        let mut stored = self
            .users
            .write()
            .map_err(|e| ChurnError::DataSourceUnavailable(format!("Lock error: {}", e)))?;

        let next_id = stored.len() as i64 + 1;
        stored.extend(users.iter().cloned().enumerate().map(|(i, mut user)| {
            user.id.get_or_insert(next_id + i as i64);
            user
        }));
        Ok(users.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::features::FeatureVector;

    #[tokio::test]
    async fn test_fetch_respects_limit() {
        let v = FeatureVector::new(1, 1.0, 1, 1, 1.0).unwrap();
        let store = InMemoryStore::new();
        let rows: Vec<UserRecord> = (0..5).map(|i| UserRecord::new(format!("u{}", i), &v)).collect();
        store.insert_users(&rows).await.unwrap();

        let fetched = store.fetch_users(Some(3)).await.unwrap();
        assert_eq!(fetched.len(), 3);
        assert_eq!(fetched[0].user_id, "u0");
        assert_eq!(fetched[0].id, Some(1));
        assert_eq!(store.fetch_users(None).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_unavailable_store() {
        let store = InMemoryStore::unavailable();
        let err = store.fetch_users(None).await.unwrap_err();
        assert!(matches!(err, ChurnError::DataSourceUnavailable(_)));
    }
}
