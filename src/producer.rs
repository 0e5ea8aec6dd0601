//! NATS publisher for worker messages

use crate::types::WorkerMessage;
use anyhow::Result;
use async_nats::Client;
use tracing::debug;

/// Publishes worker messages for a remote host
#[derive(Clone)]
pub struct EventPublisher {
    client: Client,
    subject: String,
}

impl EventPublisher {
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Publish one worker message as JSON
    pub async fn publish(&self, message: &WorkerMessage) -> Result<()> {
        let payload = serde_json::to_vec(message)?;

        self.client
            .publish(self.subject.clone(), payload.into())
            .await?;

        debug!(subject = %self.subject, status = message.status(), "Published worker message");
        Ok(())
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}
