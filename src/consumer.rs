//! NATS JetStream consumer for incoming payment events

use crate::config::NatsConfig;
use crate::types::payment::PaymentEvent;
use crate::producer::MESSAGE_KEY_HEADER;
use anyhow::{Context, Result};
use async_nats::jetstream::consumer::{pull, PullConsumer};
use async_nats::jetstream::{self, stream, AckKind};
use async_nats::Client;
use tracing::{info, warn};

/// Durable pull consumer shared by every screening worker.
///
/// Messages are acknowledged only after a verdict has been routed, so an
/// event aborted by an outage is redelivered by the broker.
pub struct PaymentConsumer {
    jetstream: jetstream::Context,
    stream: String,
    subject: String,
    durable_name: String,
}

impl PaymentConsumer {
    /// Create a new payment consumer
    pub fn new(client: Client, config: &NatsConfig) -> Self {
        Self {
            jetstream: jetstream::new(client),
            stream: config.stream.clone(),
            subject: config.payment_subject.clone(),
            durable_name: config.durable_name.clone(),
        }
    }

    /// Bind to the payment stream and start pulling messages
    pub async fn subscribe(&self) -> Result<pull::Stream> {
        let stream = self
            .jetstream
            .get_or_create_stream(stream::Config {
                name: self.stream.clone(),
                subjects: vec![self.subject.clone()],
                ..Default::default()
            })
            .await
            .with_context(|| format!("Failed to bind stream {}", self.stream))?;

        let consumer: PullConsumer = stream
            .get_or_create_consumer(
                &self.durable_name,
                pull::Config {
                    durable_name: Some(self.durable_name.clone()),
                    filter_subject: self.subject.clone(),
                    ..Default::default()
                },
            )
            .await
            .with_context(|| format!("Failed to create consumer {}", self.durable_name))?;

        let messages = consumer
            .messages()
            .await
            .context("Failed to start pulling payment messages")?;

        info!(
            stream = %self.stream,
            subject = %self.subject,
            durable = %self.durable_name,
            "Subscribed to payment subject"
        );
        Ok(messages)
    }

    /// Get the subject name
    pub fn subject(&self) -> &str {
        &self.subject
    }
}

/// Decode a payment event from a message payload
pub fn decode_payment(payload: &[u8]) -> Result<PaymentEvent, serde_json::Error> {
    serde_json::from_slice(payload)
}

/// Inbound message key (payer card or payment id), if the producer set one
pub fn message_key(message: &jetstream::Message) -> Option<String> {
    message
        .headers
        .as_ref()
        .and_then(|headers| headers.get(MESSAGE_KEY_HEADER))
        .map(|value| value.as_str().to_string())
}

/// How a finished message is settled with the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// A verdict was routed
    Ack,
    /// Processing failed; ask for redelivery
    Retry,
    /// The payload can never be processed
    Discard,
}

pub async fn settle(message: &jetstream::Message, settlement: Settlement) {
    let result = match settlement {
        Settlement::Ack => message.ack().await,
        Settlement::Retry => message.ack_with(AckKind::Nak(None)).await,
        Settlement::Discard => message.ack_with(AckKind::Term).await,
    };

    if let Err(e) = result {
        warn!(settlement = ?settlement, error = %e, "Failed to settle payment message");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_payment() {
        let payload = br#"{
            "id": 1,
            "payerCardNumber": "123456",
            "receiverCardNumber": "654321",
            "coordinates": { "latitude": 0.0, "longitude": 0.0 },
            "date": "2024-01-01T00:00:00Z"
        }"#;

        let event = decode_payment(payload).unwrap();
        assert_eq!(event.id, 1);
        assert_eq!(event.payer_card, "123456");
    }

    #[test]
    fn test_decode_rejects_missing_fields() {
        assert!(decode_payment(br#"{"id": 1}"#).is_err());
        assert!(decode_payment(b"not json").is_err());
    }

    // Subscription tests would require a running NATS server
}
