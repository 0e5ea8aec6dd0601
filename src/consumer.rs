//! NATS subscription for host messages

use crate::types::HostMessage;
use anyhow::Result;
use async_nats::{Client, Message, Subscriber};
use tracing::info;

/// Receives job channel messages published by a remote host
pub struct JobConsumer {
    client: Client,
    subject: String,
}

impl JobConsumer {
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Subscribe to the job subject
    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subscriber = self.client.subscribe(self.subject.clone()).await?;
        info!(subject = %self.subject, "Subscribed to job subject");
        Ok(subscriber)
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}

/// Decode a NATS payload into a host message
pub fn decode(message: &Message) -> serde_json::Result<HostMessage> {
    decode_payload(&message.payload)
}

pub(crate) fn decode_payload(payload: &[u8]) -> serde_json::Result<HostMessage> {
    serde_json::from_slice(payload)
}
