use std::collections::HashMap;

use async_trait::async_trait;
use mockall::automock;

use crate::errors::ForwardError;
use crate::model::Combined;

pub const MESSAGE_TYPE_HEADER: &str = "Message-Type";
pub const COMBINED_MESSAGE_TYPE: &str = "cms-combined-content-published";

/// The broker producer binding. The concrete implementation (REST-proxy
/// publish) is out of scope for the core; this trait states its contract.
#[automock]
#[async_trait]
pub trait Producer: Send + Sync {
    async fn send(
        &self,
        key: String,
        headers: HashMap<String, String>,
        body: String,
    ) -> Result<(), anyhow::Error>;
}

/// Serializes a `Combined` record, tags headers, and hands off to the
/// broker producer keyed by `combined.uuid`.
pub struct Forwarder {
    producer: Box<dyn Producer>,
    whitelisted_content_types: Vec<String>,
}

impl Forwarder {
    pub fn new(producer: Box<dyn Producer>, whitelisted_content_types: Vec<String>) -> Self {
        Self {
            producer,
            whitelisted_content_types,
        }
    }

    pub async fn forward(
        &self,
        mut headers: HashMap<String, String>,
        combined: &Combined,
    ) -> Result<(), ForwardError> {
        use crate::model::MarkedDeleted;

        let is_delete = combined.marked_deleted == MarkedDeleted::True;

        if !is_delete {
            if let Some(content) = &combined.content {
                if !self
                    .whitelisted_content_types
                    .iter()
                    .any(|allowed| allowed == content.content_type())
                {
                    return Err(ForwardError::InvalidContentType);
                }
            }
        }

        let body = serde_json::to_string(combined)?;

        headers.insert(MESSAGE_TYPE_HEADER.to_string(), COMBINED_MESSAGE_TYPE.to_string());

        self.producer
            .send(combined.uuid.clone(), headers, body)
            .await
            .map_err(ForwardError::Produce)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MarkedDeleted;

    fn combined(content_type: &str, marked_deleted: MarkedDeleted) -> Combined {
        use serde_json::{json, Map};
        let mut map = Map::new();
        map.insert("type".to_string(), json!(content_type));
        Combined {
            uuid: "0cef259d-030d-497d-b4ef-e8fa0ee6db6b".to_string(),
            content: if marked_deleted == MarkedDeleted::True {
                None
            } else {
                Some(crate::model::Content(map))
            },
            metadata: Some(vec![]),
            content_uri: "http://example/content".to_string(),
            last_modified: "2017-01-01T00:00:00Z".to_string(),
            marked_deleted,
        }
    }

    #[tokio::test]
    async fn forward_rejects_unsupported_content_type() {
        let forwarder = Forwarder::new(Box::new(MockProducer::new()), vec!["Article".to_string()]);
        let err = forwarder
            .forward(HashMap::new(), &combined("Content", MarkedDeleted::False))
            .await
            .unwrap_err();
        assert!(matches!(err, ForwardError::InvalidContentType));
    }

    #[tokio::test]
    async fn forward_allows_delete_events_regardless_of_content_type() {
        let mut producer = MockProducer::new();
        producer
            .expect_send()
            .times(1)
            .returning(|_, _, _| Ok(()));

        let forwarder = Forwarder::new(Box::new(producer), vec!["Article".to_string()]);
        forwarder
            .forward(HashMap::new(), &combined("", MarkedDeleted::True))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn forward_sets_message_type_header_and_uses_uuid_as_key() {
        let mut producer = MockProducer::new();
        producer
            .expect_send()
            .withf(|key, headers, _body| {
                key == "0cef259d-030d-497d-b4ef-e8fa0ee6db6b"
                    && headers.get(MESSAGE_TYPE_HEADER).map(String::as_str)
                        == Some(COMBINED_MESSAGE_TYPE)
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let forwarder = Forwarder::new(Box::new(producer), vec!["Article".to_string()]);
        forwarder
            .forward(HashMap::new(), &combined("Article", MarkedDeleted::False))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn forward_surfaces_producer_errors() {
        let mut producer = MockProducer::new();
        producer
            .expect_send()
            .times(1)
            .returning(|_, _, _| Err(anyhow::anyhow!("broker unreachable")));

        let forwarder = Forwarder::new(Box::new(producer), vec!["Article".to_string()]);
        let err = forwarder
            .forward(HashMap::new(), &combined("Article", MarkedDeleted::False))
            .await
            .unwrap_err();
        assert!(matches!(err, ForwardError::Produce(_)));
    }
}
