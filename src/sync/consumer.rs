//! Broker consumer loop
//!
//! Polls the change topics with a bounded wait and hands every message to
//! the dispatcher, one at a time and in delivery order: the store's per-id
//! upserts and deletes need a total order per key, so dispatch is never
//! parallel. Idle polls back off so an empty broker is not hot-looped.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::SyncConfig;
use crate::model::EntityKind;
use crate::upstream::Fetch;

use super::dispatcher::Dispatcher;

/// A raw broker message, as handed to the decoder.
#[derive(Debug, Clone)]
pub struct BrokerMessage {
    pub topic: String,
    pub key: String,
    pub payload: Vec<u8>,
}

/// Errors from the broker client.
#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),
}

/// Broker consumer handle owned by the loop.
///
/// An explicit resource rather than process-wide state: the loop controls
/// its lifecycle, and tests can script one.
#[async_trait]
pub trait MessageConsumer: Send + Sync {
    fn subscribe(&self, topics: &[&str]) -> Result<(), ConsumerError>;

    /// Wait up to `timeout` for one message. `Ok(None)` means the broker
    /// had nothing for us within the window.
    async fn poll(&self, timeout: Duration) -> Result<Option<BrokerMessage>, ConsumerError>;
}

/// The change-event consumer loop
pub struct ConsumerLoop<C, F> {
    consumer: C,
    dispatcher: Dispatcher<F>,
    poll_timeout: Duration,
    idle_backoff: Duration,
}

impl<C: MessageConsumer, F: Fetch> ConsumerLoop<C, F> {
    pub fn new(consumer: C, dispatcher: Dispatcher<F>, config: &SyncConfig) -> Self {
        Self {
            consumer,
            dispatcher,
            poll_timeout: Duration::from_secs(config.poll_timeout_secs),
            idle_backoff: Duration::from_secs(config.idle_backoff_secs),
        }
    }

    /// Run until the cancellation token fires.
    ///
    /// Cancellation is checked before each poll and again before each
    /// dispatch: an in-flight dispatch finishes, no new one starts. Poll
    /// errors and failed reconciliation steps are logged and the loop
    /// carries on; only cancellation ends it.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), ConsumerError> {
        self.consumer.subscribe(&EntityKind::topics())?;
        tracing::info!("Starting consumer loop");

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let polled = tokio::select! {
                _ = cancel.cancelled() => break,
                polled = self.consumer.poll(self.poll_timeout) => polled,
            };

            match polled {
                Ok(Some(message)) => {
                    if cancel.is_cancelled() {
                        break;
                    }

                    let outcome = self
                        .dispatcher
                        .dispatch_message(&message.topic, &message.key, &message.payload)
                        .await;
                    tracing::debug!(
                        topic = %message.topic,
                        key = %message.key,
                        ?outcome,
                        "Processed message"
                    );
                }
                Ok(None) => {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.idle_backoff) => {}
                    }
                }
                Err(e) => {
                    tracing::error!("Broker poll failed: {}", e);
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.idle_backoff) => {}
                    }
                }
            }
        }

        tracing::info!("Consumer loop stopped");
        Ok(())
    }
}
