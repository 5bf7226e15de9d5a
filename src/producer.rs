//! NATS reply producer for request/reply responses

use crate::handler::{ErrorBody, ErrorEnvelope};
use anyhow::Result;
use async_nats::{Client, Subject};
use serde::Serialize;
use tracing::debug;

/// Publishes JSON replies to requesters' inboxes
#[derive(Clone)]
pub struct ReplyProducer {
    client: Client,
}

impl ReplyProducer {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Publish a successful response body
    pub async fn reply<T: Serialize>(&self, reply_to: Subject, body: &T) -> Result<()> {
        let payload = serde_json::to_vec(body)?;
        let size = payload.len();

        self.client.publish(reply_to.clone(), payload.into()).await?;

        debug!(reply_to = %reply_to, bytes = size, "Published reply");
        Ok(())
    }

    /// Publish an error envelope
    pub async fn reply_error(&self, reply_to: Subject, error: ErrorBody) -> Result<()> {
        debug!(reply_to = %reply_to, code = %error.code, "Publishing error reply");
        self.reply(reply_to, &ErrorEnvelope { error }).await
    }
}
