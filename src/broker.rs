use std::collections::HashMap;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::config::KafkaConfig;
use crate::consumer::{BrokerConsumer, BrokerMessage};
use crate::forwarder::Producer;

/// Thin binding against the broker's REST proxy. The wire protocol itself
/// (consumer-instance lifecycle, long-poll records endpoint, produce
/// endpoint) is an external collaborator's contract, not core logic; this
/// module only adapts it to the `BrokerConsumer`/`Producer` traits the core
/// depends on.
#[derive(Deserialize)]
struct ProxyRecord {
    key: Option<String>,
    value: String,
    #[serde(default)]
    headers: HashMap<String, String>,
}

#[derive(Serialize)]
struct ProduceRequest<'a> {
    records: [ProduceRecord<'a>; 1],
}

#[derive(Serialize)]
struct ProduceRecord<'a> {
    key: &'a str,
    value: String,
    headers: &'a HashMap<String, String>,
}

pub struct RestProxyConsumer {
    client: reqwest::Client,
    records_url: String,
    host_header: String,
}

impl RestProxyConsumer {
    pub fn new(client: reqwest::Client, kafka: &KafkaConfig, consumer_group: &str, topic: &str) -> Self {
        let records_url = format!(
            "{}/consumers/{consumer_group}/instances/{consumer_group}/topics/{topic}/records",
            kafka.kafka_proxy_address
        );
        Self {
            client,
            records_url,
            host_header: kafka.kafka_proxy_header.clone(),
        }
    }
}

#[async_trait]
impl BrokerConsumer for RestProxyConsumer {
    async fn poll(&mut self) -> Result<Vec<BrokerMessage>, anyhow::Error> {
        let response = self
            .client
            .get(&self.records_url)
            .header("Host", &self.host_header)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "kafka-rest-proxy poll returned {}",
                response.status()
            ));
        }

        let records: Vec<ProxyRecord> = response.json().await?;
        let engine = base64::engine::general_purpose::STANDARD;

        records
            .into_iter()
            .map(|record| {
                let body = engine.decode(record.value).map_err(|err| anyhow::anyhow!(err))?;
                Ok(BrokerMessage {
                    headers: record.headers,
                    body,
                })
            })
            .collect()
    }
}

pub struct RestProxyProducer {
    client: reqwest::Client,
    topic_url: String,
    host_header: String,
}

impl RestProxyProducer {
    pub fn new(client: reqwest::Client, kafka: &KafkaConfig, topic: &str) -> Self {
        Self {
            client,
            topic_url: format!("{}/topics/{topic}", kafka.kafka_proxy_address),
            host_header: kafka.kafka_proxy_header.clone(),
        }
    }
}

#[async_trait]
impl Producer for RestProxyProducer {
    async fn send(
        &self,
        key: String,
        headers: HashMap<String, String>,
        body: String,
    ) -> Result<(), anyhow::Error> {
        let engine = base64::engine::general_purpose::STANDARD;
        let request = ProduceRequest {
            records: [ProduceRecord {
                key: &key,
                value: engine.encode(body.as_bytes()),
                headers: &headers,
            }],
        };

        let response = self
            .client
            .post(&self.topic_url)
            .header("Host", &self.host_header)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "kafka-rest-proxy produce to {} returned {}",
                self.topic_url,
                response.status()
            ));
        }

        Ok(())
    }
}
