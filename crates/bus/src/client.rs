use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::*;

use crate::subjects::Subjects;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("failed to connect to bus at {url}: {source}")]
    Connect {
        url: String,
        source: async_nats::ConnectError,
    },
    #[error("failed to publish on {subject}: {source}")]
    Publish {
        subject: String,
        source: async_nats::PublishError,
    },
    #[error("failed to flush publishes: {0}")]
    Flush(#[from] async_nats::client::FlushError),
    #[error("failed to subscribe to {subject}: {source}")]
    Subscribe {
        subject: String,
        source: async_nats::SubscribeError,
    },
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Thin wrapper around the NATS client carrying the subject builder.
#[derive(Clone)]
pub struct BusClient {
    client: async_nats::Client,
    subjects: Subjects,
}

impl BusClient {
    pub async fn connect(url: &str, prefix: &str) -> Result<Self, BusError> {
        let client = async_nats::connect(url)
            .await
            .map_err(|source| BusError::Connect {
                url: url.to_string(),
                source,
            })?;
        info!(%url, "connected to bus");
        Ok(Self {
            client,
            subjects: Subjects::new(prefix),
        })
    }

    pub fn subjects(&self) -> &Subjects {
        &self.subjects
    }

    /// Publishes one JSON message and flushes it out.
    pub async fn publish_json<T: Serialize>(
        &self,
        subject: &str,
        message: &T,
    ) -> Result<(), BusError> {
        let payload = serde_json::to_vec(message)?;
        self.client
            .publish(subject.to_string(), payload.into())
            .await
            .map_err(|source| BusError::Publish {
                subject: subject.to_string(),
                source,
            })?;
        self.client.flush().await?;
        Ok(())
    }

    /// Publishes with exponential backoff, up to `max_attempts` tries.
    pub async fn publish_json_with_retry<T: Serialize>(
        &self,
        subject: &str,
        message: &T,
        max_attempts: u32,
    ) -> Result<(), BusError> {
        let mut attempt = 1;
        loop {
            match self.publish_json(subject, message).await {
                Ok(()) => return Ok(()),
                // Encoding failures are not transient; retrying cannot help.
                Err(e @ BusError::Encode(_)) => return Err(e),
                Err(e) if attempt >= max_attempts => return Err(e),
                Err(e) => {
                    let delay = backoff_delay(attempt);
                    warn!(%subject, %attempt, err = %e, "publish failed, backing off");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    pub async fn subscribe(&self, subject: &str) -> Result<async_nats::Subscriber, BusError> {
        self.client
            .subscribe(subject.to_string())
            .await
            .map_err(|source| BusError::Subscribe {
                subject: subject.to_string(),
                source,
            })
    }

    /// Queue-group subscription: each message goes to exactly one member of
    /// the group.
    pub async fn queue_subscribe(
        &self,
        subject: &str,
        group: &str,
    ) -> Result<async_nats::Subscriber, BusError> {
        self.client
            .queue_subscribe(subject.to_string(), group.to_string())
            .await
            .map_err(|source| BusError::Subscribe {
                subject: subject.to_string(),
                source,
            })
    }
}

/// Delay before retry `attempt` (1-based): 500 ms doubling, capped at 8 s.
pub fn backoff_delay(attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(4);
    Duration::from_millis(500 << exp)
}
