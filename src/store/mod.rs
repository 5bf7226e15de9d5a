//! Feature store access

pub mod memory;
pub mod supabase;

use crate::error::Result;
use crate::types::user::UserRecord;
use async_trait::async_trait;
use tracing::{error, info};

pub use memory::InMemoryStore;
pub use supabase::SupabaseStore;

/// Bulk access to stored user feature rows
#[async_trait]
pub trait FeatureStore: Send + Sync {
    /// Read user rows, optionally limited to the first `limit`
    async fn fetch_users(&self, limit: Option<usize>) -> Result<Vec<UserRecord>>;

    /// Insert rows, returning how many the store accepted
    async fn insert_users(&self, users: &[UserRecord]) -> Result<usize>;
}

/// Insert users in bounded batches.
///
/// A failed batch is logged and skipped; the returned count covers the
/// batches that succeeded.
pub async fn insert_in_batches(store: &dyn FeatureStore, users: &[UserRecord], batch_size: usize) -> usize {
    let mut total_inserted = 0;

    for (i, batch) in users.chunks(batch_size.max(1)).enumerate() {
        match store.insert_users(batch).await {
            Ok(inserted) => {
                total_inserted += inserted;
                info!(batch = i + 1, inserted = inserted, "Inserted user batch");
            }
            Err(e) => {
                error!(batch = i + 1, size = batch.len(), error = %e, "Failed to insert user batch");
            }
        }
    }

    total_inserted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::features::FeatureVector;

    fn users(n: usize) -> Vec<UserRecord> {
        let v = FeatureVector::new(100, 10.0, 1, 100, 50.0).unwrap();
        (0..n).map(|i| UserRecord::new(format!("user_{}", i), &v)).collect()
    }

    #[tokio::test]
    async fn test_insert_in_batches() {
        let store = InMemoryStore::new();

        let inserted = insert_in_batches(&store, &users(250), 100).await;

        assert_eq!(inserted, 250);
        assert_eq!(store.fetch_users(None).await.unwrap().len(), 250);
    }

    #[tokio::test]
    async fn test_failed_batches_are_skipped() {
        let store = InMemoryStore::unavailable();

        let inserted = insert_in_batches(&store, &users(30), 10).await;

        assert_eq!(inserted, 0);
    }
}
