use std::collections::HashMap;

use async_trait::async_trait;
use mockall::automock;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

/// Capacity of the shared channel the two consumer adapters fan into.
/// A full channel blocks the upstream consumer tasks, applying flow
/// control back to the broker.
pub const CHANNEL_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicTag {
    Content,
    Metadata,
}

#[derive(Debug, Clone)]
pub struct BrokerMessage {
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ChannelMessage {
    pub tag: TopicTag,
    pub message: BrokerMessage,
}

/// The broker consumer binding: out of scope for the core (§1), stated
/// here only as the contract the adapter depends on. A concrete
/// implementation long-polls the broker's REST proxy; tests substitute
/// `MockBrokerConsumer`.
#[automock]
#[async_trait]
pub trait BrokerConsumer: Send {
    /// Blocks until a batch of messages is available, or returns an empty
    /// batch on a harmless timeout. Ordering within the batch, and across
    /// calls, is preserved.
    async fn poll(&mut self) -> Result<Vec<BrokerMessage>, anyhow::Error>;
}

/// Wraps one upstream topic's broker consumer as a producer of tagged
/// messages into the shared channel, preserving topic-of-origin tag and
/// per-topic FIFO ordering.
pub struct ConsumerAdapter {
    tag: TopicTag,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ConsumerAdapter {
    pub fn new(tag: TopicTag) -> Self {
        Self {
            tag,
            token: CancellationToken::new(),
            handle: None,
        }
    }

    /// Spawns the long-running consumer task, forwarding every message
    /// `consumer` yields into `sink` tagged with this adapter's topic.
    pub fn start(&mut self, mut consumer: Box<dyn BrokerConsumer>, sink: Sender<ChannelMessage>) {
        let tag = self.tag;
        let token = self.token.clone();

        let handle = tokio::spawn(async move {
            loop {
                if token.is_cancelled() {
                    break;
                }

                let batch = tokio::select! {
                    _ = token.cancelled() => break,
                    result = consumer.poll() => result,
                };

                let messages = match batch {
                    Ok(messages) => messages,
                    Err(err) => {
                        error!(topic = ?tag, error = %err, "broker consumer poll failed");
                        continue;
                    }
                };

                for message in messages {
                    let send = sink
                        .send(ChannelMessage {
                            tag,
                            message,
                        })
                        .await;
                    if send.is_err() {
                        warn!(topic = ?tag, "shared channel closed, stopping consumer");
                        return;
                    }
                }
            }
        });

        self.handle = Some(handle);
    }

    /// Halts consumption and waits for the in-flight delivery to drain.
    pub async fn stop(&mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}
