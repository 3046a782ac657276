use std::sync::Arc;

use crate::errors::{CombinerError, FetchOutcome};
use crate::http_fetch::Fetch;
use crate::model::{Annotation, AnnotationsPayload, Combined, Content, MarkedDeleted, Thing};

/// Joins content and annotations data into a `Combined` record, fetching
/// whichever side is not already in hand over HTTP.
pub struct Combiner {
    content_fetcher: Arc<dyn Fetch>,
    annotations_fetcher: Arc<dyn Fetch>,
}

impl Combiner {
    pub fn new(content_fetcher: Arc<dyn Fetch>, annotations_fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            content_fetcher,
            annotations_fetcher,
        }
    }

    /// For inbound content events: content is already in hand, only
    /// annotations need fetching.
    pub async fn join_from_content(&self, content: Content) -> Result<Combined, CombinerError> {
        if content.uuid().is_empty() {
            return Err(CombinerError::EmptyUuid(
                "content has no uuid provided, can't deduce annotations for it",
            ));
        }

        let metadata = fetch_annotations(self.annotations_fetcher.as_ref(), content.uuid()).await?;

        Ok(Combined {
            uuid: content.uuid().to_string(),
            last_modified: content.last_modified().to_string(),
            content: Some(content),
            metadata: Some(metadata),
            content_uri: String::new(),
            marked_deleted: MarkedDeleted::False,
        })
    }

    /// For inbound annotation events: the inbound payload is discarded, the
    /// authoritative annotations are re-fetched from the annotations
    /// service (which may return more identifier fields than upstream).
    pub async fn join_from_annotations(
        &self,
        payload: &AnnotationsPayload,
    ) -> Result<Combined, CombinerError> {
        if payload.uuid.is_empty() {
            return Err(CombinerError::EmptyUuid(
                "annotations have no uuid referenced, can't deduce content for it",
            ));
        }

        self.join_by_uuid(&payload.uuid).await
    }

    /// For forced-publish: fetches content and annotations concurrently,
    /// each on an independent scheduled task, and awaits both.
    pub async fn join_by_uuid(&self, uuid: &str) -> Result<Combined, CombinerError> {
        let content_fetcher = Arc::clone(&self.content_fetcher);
        let annotations_fetcher = Arc::clone(&self.annotations_fetcher);
        let content_uuid = uuid.to_string();
        let annotations_uuid = uuid.to_string();

        let content_task = tokio::spawn(async move { fetch_content(content_fetcher.as_ref(), &content_uuid).await });
        let annotations_task =
            tokio::spawn(async move { fetch_annotations(annotations_fetcher.as_ref(), &annotations_uuid).await });

        let content = content_task
            .await
            .expect("content fetch task panicked")?;
        let metadata = annotations_task
            .await
            .expect("annotations fetch task panicked")?;

        let last_modified = content
            .as_ref()
            .map(|c| c.last_modified().to_string())
            .unwrap_or_default();

        Ok(Combined {
            uuid: uuid.to_string(),
            content,
            metadata: Some(metadata),
            content_uri: String::new(),
            last_modified,
            marked_deleted: MarkedDeleted::False,
        })
    }
}

async fn fetch_content(fetcher: &dyn Fetch, uuid: &str) -> Result<Option<Content>, CombinerError> {
    match fetcher.fetch(uuid).await? {
        FetchOutcome::NotFound => Ok(None),
        FetchOutcome::Ok(bytes) => {
            let content: Content =
                serde_json::from_slice(&bytes).map_err(|source| CombinerError::Deserialize {
                    what: "content",
                    uuid: uuid.to_string(),
                    source,
                })?;
            Ok(Some(content))
        }
    }
}

async fn fetch_annotations(fetcher: &dyn Fetch, uuid: &str) -> Result<Vec<Annotation>, CombinerError> {
    match fetcher.fetch(uuid).await? {
        FetchOutcome::NotFound => Ok(Vec::new()),
        FetchOutcome::Ok(bytes) => {
            let things: Vec<Thing> =
                serde_json::from_slice(&bytes).map_err(|source| CombinerError::Deserialize {
                    what: "annotations",
                    uuid: uuid.to_string(),
                    source,
                })?;
            Ok(things.into_iter().map(|thing| Annotation { thing }).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FetchError;
    use crate::http_fetch::MockFetch;
    use serde_json::json;

    fn content_bytes() -> Vec<u8> {
        json!({
            "uuid": "0cef259d-030d-497d-b4ef-e8fa0ee6db6b",
            "type": "Article",
            "lastModified": "2017-03-30T13:09:06.48Z"
        })
        .to_string()
        .into_bytes()
    }

    fn annotations_bytes() -> Vec<u8> {
        json!([{"id": "http://api.ft.com/things/1", "prefLabel": "Thing 1"}])
            .to_string()
            .into_bytes()
    }

    #[tokio::test]
    async fn join_from_content_rejects_empty_uuid() {
        let combiner = Combiner::new(Arc::new(MockFetch::new()), Arc::new(MockFetch::new()));
        let err = combiner
            .join_from_content(Content(serde_json::Map::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, CombinerError::EmptyUuid(_)));
    }

    #[tokio::test]
    async fn join_from_content_fetches_only_annotations() {
        let mut annotations_fetcher = MockFetch::new();
        annotations_fetcher
            .expect_fetch()
            .times(1)
            .returning(|_| Ok(FetchOutcome::Ok(annotations_bytes())));

        let combiner = Combiner::new(Arc::new(MockFetch::new()), Arc::new(annotations_fetcher));

        let content: Content = serde_json::from_slice(&content_bytes()).unwrap();
        let combined = combiner.join_from_content(content).await.unwrap();

        assert_eq!(combined.uuid, "0cef259d-030d-497d-b4ef-e8fa0ee6db6b");
        let metadata = combined.metadata.unwrap();
        assert_eq!(metadata.len(), 1);
        assert!(combined.content.is_some());

        // the wire contract wraps each fetched Thing in a "thing" envelope,
        // not the bare Thing fields.
        let serialized = serde_json::to_value(&metadata).unwrap();
        assert_eq!(
            serialized,
            json!([{"thing": {"id": "http://api.ft.com/things/1", "prefLabel": "Thing 1"}}])
        );
    }

    #[tokio::test]
    async fn join_from_annotations_rejects_empty_uuid() {
        let combiner = Combiner::new(Arc::new(MockFetch::new()), Arc::new(MockFetch::new()));
        let payload = AnnotationsPayload {
            uuid: String::new(),
            annotations: Vec::new(),
        };
        let err = combiner.join_from_annotations(&payload).await.unwrap_err();
        assert!(matches!(err, CombinerError::EmptyUuid(_)));
    }

    #[tokio::test]
    async fn join_by_uuid_tolerates_content_not_found() {
        let mut content_fetcher = MockFetch::new();
        content_fetcher
            .expect_fetch()
            .times(1)
            .returning(|_| Ok(FetchOutcome::NotFound));

        let mut annotations_fetcher = MockFetch::new();
        annotations_fetcher
            .expect_fetch()
            .times(1)
            .returning(|_| Ok(FetchOutcome::Ok(annotations_bytes())));

        let combiner = Combiner::new(Arc::new(content_fetcher), Arc::new(annotations_fetcher));
        let combined = combiner
            .join_by_uuid("a78cf3ea-b221-46f8-8cbc-a61e5e454e88")
            .await
            .unwrap();

        assert!(combined.content.is_none());
        assert_eq!(combined.metadata.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn join_by_uuid_tolerates_annotations_not_found() {
        let mut content_fetcher = MockFetch::new();
        content_fetcher
            .expect_fetch()
            .times(1)
            .returning(|_| Ok(FetchOutcome::Ok(content_bytes())));

        let mut annotations_fetcher = MockFetch::new();
        annotations_fetcher
            .expect_fetch()
            .times(1)
            .returning(|_| Ok(FetchOutcome::NotFound));

        let combiner = Combiner::new(Arc::new(content_fetcher), Arc::new(annotations_fetcher));
        let combined = combiner
            .join_by_uuid("0cef259d-030d-497d-b4ef-e8fa0ee6db6b")
            .await
            .unwrap();

        assert!(combined.content.is_some());
        assert!(combined.metadata.unwrap().is_empty());
    }

    #[tokio::test]
    async fn join_by_uuid_surfaces_first_transport_error() {
        let mut content_fetcher = MockFetch::new();
        content_fetcher.expect_fetch().times(1).returning(|_| {
            Err(FetchError::UnexpectedStatus {
                url: "http://doc-store/content/x".into(),
                status: 500,
            })
        });

        let mut annotations_fetcher = MockFetch::new();
        annotations_fetcher
            .expect_fetch()
            .times(1)
            .returning(|_| Ok(FetchOutcome::Ok(annotations_bytes())));

        let combiner = Combiner::new(Arc::new(content_fetcher), Arc::new(annotations_fetcher));
        let err = combiner.join_by_uuid("x").await.unwrap_err();
        assert!(matches!(err, CombinerError::Transport(_)));
    }

    #[tokio::test]
    async fn join_by_uuid_both_missing_yields_empty_combined() {
        let mut content_fetcher = MockFetch::new();
        content_fetcher
            .expect_fetch()
            .times(1)
            .returning(|_| Ok(FetchOutcome::NotFound));

        let mut annotations_fetcher = MockFetch::new();
        annotations_fetcher
            .expect_fetch()
            .times(1)
            .returning(|_| Ok(FetchOutcome::NotFound));

        let combiner = Combiner::new(Arc::new(content_fetcher), Arc::new(annotations_fetcher));
        let combined = combiner
            .join_by_uuid("a78cf3ea-b221-46f8-8cbc-a61e5e454e88")
            .await
            .unwrap();

        assert!(combined.content.is_none());
        assert!(combined.metadata.unwrap().is_empty());
    }
}
