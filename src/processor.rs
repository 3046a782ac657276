use std::collections::HashMap;

use tokio::sync::mpsc::Receiver;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

use crate::combiner::Combiner;
use crate::consumer::{ChannelMessage, TopicTag};
use crate::errors::ProcessError;
use crate::forwarder::Forwarder;
use crate::model::{AnnotationsEvent, Combined, ContentEvent, MarkedDeleted, TransactionId};

const REQUEST_ID_HEADER: &str = "X-Request-Id";
const ORIGIN_SYSTEM_ID_HEADER: &str = "Origin-System-Id";

/// Consumes `ChannelMessage`s from the shared channel in a loop, processing
/// each one synchronously before reading the next. This serializes HTTP
/// fan-out and broker publishing on the processing side; broker consumption
/// continues concurrently in the consumer adapters.
pub struct StreamProcessor {
    combiner: Combiner,
    forwarder: Forwarder,
    whitelisted_content_uris: Vec<String>,
    whitelisted_metadata_origin_system_headers: Vec<String>,
}

impl StreamProcessor {
    pub fn new(
        combiner: Combiner,
        forwarder: Forwarder,
        whitelisted_content_uris: Vec<String>,
        whitelisted_metadata_origin_system_headers: Vec<String>,
    ) -> Self {
        Self {
            combiner,
            forwarder,
            whitelisted_content_uris,
            whitelisted_metadata_origin_system_headers,
        }
    }

    /// Runs until the shared channel is closed and drained, or `token` is
    /// cancelled.
    pub async fn run(&self, mut rx: Receiver<ChannelMessage>, token: CancellationToken) {
        loop {
            let next = tokio::select! {
                _ = token.cancelled() => break,
                next = rx.recv() => next,
            };

            match next {
                Some(message) => self.process_one(message).await,
                None => break,
            }
        }
    }

    async fn process_one(&self, channel_message: ChannelMessage) {
        let ChannelMessage { tag, mut message } = channel_message;

        let tid = resolve_transaction_id(&message.headers);
        message
            .headers
            .insert(REQUEST_ID_HEADER.to_string(), tid.to_string());

        let result = match tag {
            TopicTag::Content => self.process_content(&message.headers, &message.body).await,
            TopicTag::Metadata => self.process_metadata(&message.headers, &message.body).await,
        };

        if let Err(err) = result {
            log_process_error(&tid, tag, &err);
        }
    }

    async fn process_content(
        &self,
        headers: &HashMap<String, String>,
        body: &[u8],
    ) -> Result<(), ProcessError> {
        let event: ContentEvent = serde_json::from_slice(body)?;

        if !matches_whitelist(&event.content_uri, &self.whitelisted_content_uris) {
            info!(content_uri = %event.content_uri, "skipped unsupported contentUri");
            return Err(ProcessError::FilteredUri);
        }

        let combined = match event.payload {
            None => build_delete_combined(&event.content_uri, &event.last_modified)?,
            Some(content) => {
                if content.uuid().is_empty() {
                    return Err(ProcessError::EmptyUuid);
                }

                let mut combined = self.combiner.join_from_content(content).await?;
                combined.content_uri = event.content_uri.clone();
                combined.marked_deleted = MarkedDeleted::False;
                combined
            }
        };

        self.forwarder.forward(headers.clone(), &combined).await?;
        Ok(())
    }

    async fn process_metadata(
        &self,
        headers: &HashMap<String, String>,
        body: &[u8],
    ) -> Result<(), ProcessError> {
        let origin = headers.get(ORIGIN_SYSTEM_ID_HEADER).map(String::as_str).unwrap_or("");
        if !matches_whitelist(origin, &self.whitelisted_metadata_origin_system_headers) {
            info!(origin_system_id = %origin, "skipped unsupported Origin-System-Id");
            return Err(ProcessError::FilteredOrigin);
        }

        let event: AnnotationsEvent = serde_json::from_slice(body)?;

        let combined = self.combiner.join_from_annotations(&event.payload).await?;
        self.forwarder.forward(headers.clone(), &combined).await?;
        Ok(())
    }
}

fn matches_whitelist(value: &str, whitelist: &[String]) -> bool {
    whitelist.iter().any(|candidate| value.contains(candidate.as_str()))
}

fn resolve_transaction_id(headers: &HashMap<String, String>) -> TransactionId {
    match headers.get(REQUEST_ID_HEADER) {
        Some(tid) if !tid.is_empty() => TransactionId(tid.clone()),
        _ => TransactionId::synthesize(),
    }
}

fn build_delete_combined(content_uri: &str, last_modified: &str) -> Result<Combined, ProcessError> {
    let uuid = content_uri
        .rsplit('/')
        .next()
        .unwrap_or("")
        .to_string();

    if Uuid::parse_str(&uuid).is_err() {
        return Err(ProcessError::InvalidUuidInDelete);
    }

    Ok(Combined {
        uuid,
        content: None,
        metadata: None,
        content_uri: content_uri.to_string(),
        last_modified: last_modified.to_string(),
        marked_deleted: MarkedDeleted::True,
    })
}

fn log_process_error(tid: &TransactionId, tag: TopicTag, err: &ProcessError) {
    match err {
        ProcessError::FilteredUri | ProcessError::FilteredOrigin => {
            // Already logged at info level at the point of decision.
        }
        ProcessError::Parse(_) | ProcessError::EmptyUuid | ProcessError::InvalidUuidInDelete => {
            error!(tid = %tid, topic = ?tag, error = %err, "dropping message");
        }
        ProcessError::Combiner(_) | ProcessError::Forward(_) => {
            error!(tid = %tid, topic = ?tag, error = %err, "dropping message after join/forward failure");
        }
    }
}
