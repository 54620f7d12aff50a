//! NATS message producer for screening outcomes

use crate::config::NatsConfig;
use crate::metrics::PipelineMetrics;
use crate::types::outcome::{OutcomeChannel, PaymentOutcome, ScreeningResult};
use async_nats::{Client, HeaderMap};
use std::sync::Arc;
use tracing::{error, info};

/// Header carrying the message key on both input and output subjects
pub const MESSAGE_KEY_HEADER: &str = "Message-Key";

/// Destination for routed screening results.
///
/// `emit` must not wait for the broker: delivery is best-effort and a failed
/// send is only logged.
pub trait OutcomeSink: Send + Sync {
    fn emit(&self, channel: OutcomeChannel, result: ScreeningResult);
}

/// Publishes screening results to the checked / suspicious subjects
#[derive(Clone)]
pub struct OutcomePublisher {
    client: Client,
    checked_subject: String,
    suspicious_subject: String,
    metrics: Arc<PipelineMetrics>,
}

impl OutcomePublisher {
    /// Create a new outcome publisher
    pub fn new(client: Client, config: &NatsConfig, metrics: Arc<PipelineMetrics>) -> Self {
        Self {
            client,
            checked_subject: config.checked_subject.clone(),
            suspicious_subject: config.suspicious_subject.clone(),
            metrics,
        }
    }

    /// Subject name for a channel
    pub fn subject(&self, channel: OutcomeChannel) -> &str {
        match channel {
            OutcomeChannel::Checked => &self.checked_subject,
            OutcomeChannel::Suspicious => &self.suspicious_subject,
        }
    }

    /// Publish a result and wait for the client to accept it
    pub async fn publish(&self, channel: OutcomeChannel, result: &ScreeningResult) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(&PaymentOutcome::from(result))?;
        let key = result.key();

        let mut headers = HeaderMap::new();
        headers.insert(MESSAGE_KEY_HEADER, key.as_str());

        self.client
            .publish_with_headers(self.subject(channel).to_string(), headers, payload.into())
            .await?;

        Ok(())
    }
}

impl OutcomeSink for OutcomePublisher {
    fn emit(&self, channel: OutcomeChannel, result: ScreeningResult) {
        let publisher = self.clone();
        tokio::spawn(async move {
            let subject = publisher.subject(channel).to_string();
            match publisher.publish(channel, &result).await {
                Ok(()) => {
                    info!(
                        payment_id = result.event.id,
                        subject = %subject,
                        trusted = result.verdict.is_trusted(),
                        "Sent screening result"
                    );
                }
                Err(e) => {
                    publisher.metrics.record_publish_failure();
                    error!(
                        payment_id = result.event.id,
                        subject = %subject,
                        error = %e,
                        "Unable to send screening result"
                    );
                }
            }
        });
    }
}
