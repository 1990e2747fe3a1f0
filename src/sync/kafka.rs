//! Kafka-backed broker consumer

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;

use crate::config::KafkaConfig;

use super::consumer::{BrokerMessage, ConsumerError, MessageConsumer};

/// `MessageConsumer` over an rdkafka stream consumer
pub struct KafkaConsumer {
    inner: StreamConsumer,
}

impl KafkaConsumer {
    pub fn new(config: &KafkaConfig) -> Result<Self, ConsumerError> {
        let inner: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.group_id)
            .set("enable.partition.eof", "false")
            .set("auto.offset.reset", "earliest")
            .create()?;

        Ok(Self { inner })
    }
}

#[async_trait]
impl MessageConsumer for KafkaConsumer {
    fn subscribe(&self, topics: &[&str]) -> Result<(), ConsumerError> {
        self.inner.subscribe(topics)?;
        Ok(())
    }

    async fn poll(&self, timeout: Duration) -> Result<Option<BrokerMessage>, ConsumerError> {
        match tokio::time::timeout(timeout, self.inner.recv()).await {
            // Window elapsed with nothing delivered.
            Err(_) => Ok(None),
            Ok(Err(e)) => Err(e.into()),
            Ok(Ok(message)) => {
                let key = message
                    .key()
                    .map(|k| String::from_utf8_lossy(k).into_owned())
                    .unwrap_or_default();
                let payload = message.payload().map(<[u8]>::to_vec).unwrap_or_default();

                Ok(Some(BrokerMessage {
                    topic: message.topic().to_string(),
                    key,
                    payload,
                }))
            }
        }
    }
}
