//! NATS request consumer for the churn service subjects

use anyhow::Result;
use async_nats::{Client, Subscriber};
use tracing::info;

/// Queue-group subscriber for all request subjects under a prefix
pub struct RequestConsumer {
    client: Client,
    prefix: String,
    queue_group: String,
}

impl RequestConsumer {
    /// Create a new request consumer
    pub fn new(client: Client, prefix: &str, queue_group: &str) -> Self {
        Self {
            client,
            prefix: prefix.to_string(),
            queue_group: queue_group.to_string(),
        }
    }

    /// Wildcard subject covering every route, e.g. `churn.>`
    pub fn subject(&self) -> String {
        format!("{}.>", self.prefix)
    }

    /// Subscribe to the request subjects; replicas share the load
    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subscriber = self
            .client
            .queue_subscribe(self.subject(), self.queue_group.clone())
            .await?;
        info!(
            subject = %self.subject(),
            queue_group = %self.queue_group,
            "Subscribed to request subjects"
        );
        Ok(subscriber)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}
