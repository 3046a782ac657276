use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::combiner::Combiner;
use crate::errors::{ForwardError, RequestError};
use crate::forwarder::Forwarder;
use crate::model::TransactionId;

pub const FORCED_PUBLISH_ORIGIN: &str = "forced-combined-msg";

/// Handles `POST /{uuid}`, the synchronous back-fill/reindex ingress. Shares
/// the combiner and forwarder with the streaming path, writing to a
/// distinct forced-combined topic (selected by which `Forwarder`/producer
/// this is constructed with).
pub struct RequestProcessor {
    combiner: Combiner,
    forwarder: Forwarder,
}

impl RequestProcessor {
    pub fn new(combiner: Combiner, forwarder: Forwarder) -> Self {
        Self { combiner, forwarder }
    }

    pub async fn force_publish(&self, uuid: &str, tid: Option<String>) -> Result<(), RequestError> {
        let tid = match tid {
            Some(tid) if !tid.is_empty() => TransactionId(tid),
            _ => TransactionId::synthesize_forced(),
        };

        let combined = self.combiner.join_by_uuid(uuid).await?;

        let no_metadata = combined.metadata.as_ref().map_or(true, |m| m.is_empty());
        if combined.content.is_none() && no_metadata {
            return Err(RequestError::NotFound);
        }

        let mut headers = HashMap::new();
        headers.insert("X-Request-Id".to_string(), tid.to_string());
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert("Origin-System-Id".to_string(), FORCED_PUBLISH_ORIGIN.to_string());

        self.forwarder.forward(headers, &combined).await.map_err(|err| match err {
            ForwardError::InvalidContentType => RequestError::InvalidContentType,
            other => RequestError::Forward(other),
        })
    }
}

pub async fn post_force_publish(
    State(processor): State<Arc<RequestProcessor>>,
    Path(uuid): Path<String>,
) -> impl IntoResponse {
    if Uuid::parse_str(&uuid).is_err() {
        return StatusCode::BAD_REQUEST;
    }

    match processor.force_publish(&uuid, None).await {
        Ok(()) => StatusCode::OK,
        Err(err) => err.status_code(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FetchOutcome;
    use crate::forwarder::MockProducer;
    use crate::http_fetch::MockFetch;
    use serde_json::json;

    fn processor(content_fetch: MockFetch, annotations_fetch: MockFetch, producer: MockProducer) -> RequestProcessor {
        let combiner = Combiner::new(Arc::new(content_fetch), Arc::new(annotations_fetch));
        let forwarder = Forwarder::new(Box::new(producer), vec!["Article".to_string(), "Content".to_string()]);
        RequestProcessor::new(combiner, forwarder)
    }

    #[tokio::test]
    async fn both_missing_surfaces_not_found() {
        let mut content_fetch = MockFetch::new();
        content_fetch.expect_fetch().times(1).returning(|_| Ok(FetchOutcome::NotFound));
        let mut annotations_fetch = MockFetch::new();
        annotations_fetch.expect_fetch().times(1).returning(|_| Ok(FetchOutcome::NotFound));

        let p = processor(content_fetch, annotations_fetch, MockProducer::new());
        let err = p
            .force_publish("a78cf3ea-b221-46f8-8cbc-a61e5e454e88", None)
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::NotFound));
    }

    #[tokio::test]
    async fn unsupported_type_surfaces_invalid_content_type() {
        let mut content_fetch = MockFetch::new();
        content_fetch.expect_fetch().times(1).returning(|_| {
            Ok(FetchOutcome::Ok(
                json!({"uuid": "u1", "type": "Content"}).to_string().into_bytes(),
            ))
        });
        let mut annotations_fetch = MockFetch::new();
        annotations_fetch.expect_fetch().times(1).returning(|_| Ok(FetchOutcome::Ok(b"[]".to_vec())));

        let p = processor(content_fetch, annotations_fetch, MockProducer::new());
        let err = p.force_publish("u1", None).await.unwrap_err();
        assert!(matches!(err, RequestError::InvalidContentType));
    }

    #[tokio::test]
    async fn success_forwards_with_forced_publish_headers() {
        let mut content_fetch = MockFetch::new();
        content_fetch.expect_fetch().times(1).returning(|_| {
            Ok(FetchOutcome::Ok(json!({"uuid": "u1", "type": "Article"}).to_string().into_bytes()))
        });
        let mut annotations_fetch = MockFetch::new();
        annotations_fetch.expect_fetch().times(1).returning(|_| Ok(FetchOutcome::Ok(b"[]".to_vec())));

        let mut producer = MockProducer::new();
        producer
            .expect_send()
            .withf(|key, headers, _body| {
                key == "u1"
                    && headers.get("Origin-System-Id").map(String::as_str) == Some(FORCED_PUBLISH_ORIGIN)
                    && headers.get("Content-Type").map(String::as_str) == Some("application/json")
                    && headers.get("X-Request-Id").is_some()
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let p = processor(content_fetch, annotations_fetch, producer);
        p.force_publish("u1", None).await.unwrap();
    }

    #[tokio::test]
    async fn generates_forced_prefix_tid_when_absent() {
        let mut content_fetch = MockFetch::new();
        content_fetch.expect_fetch().times(1).returning(|_| {
            Ok(FetchOutcome::Ok(json!({"uuid": "u1", "type": "Article"}).to_string().into_bytes()))
        });
        let mut annotations_fetch = MockFetch::new();
        annotations_fetch.expect_fetch().times(1).returning(|_| Ok(FetchOutcome::Ok(b"[]".to_vec())));

        let mut producer = MockProducer::new();
        producer
            .expect_send()
            .withf(|_key, headers, _body| {
                headers
                    .get("X-Request-Id")
                    .map(|tid| tid.starts_with("tid_force_publish"))
                    .unwrap_or(false)
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let p = processor(content_fetch, annotations_fetch, producer);
        p.force_publish("u1", None).await.unwrap();
    }
}
