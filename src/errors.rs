use thiserror::Error;

/// Outcome of substituting `{uuid}` into a template URL and issuing a GET.
/// Not-found is a value, not an error: callers treat it as "counterpart
/// missing, proceed with what we have".
#[derive(Debug)]
pub enum FetchOutcome {
    Ok(Vec<u8>),
    NotFound,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("error building request for url={url}: {source}")]
    Build {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("error executing request for url={url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("connecting to {url} was not successful, status={status}")]
    UnexpectedStatus { url: String, status: u16 },
    #[error("could not read response body for url={url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Debug, Error)]
pub enum CombinerError {
    #[error("empty uuid: {0}")]
    EmptyUuid(&'static str),
    #[error(transparent)]
    Transport(#[from] FetchError),
    #[error("could not deserialize {what} for uuid={uuid}: {source}")]
    Deserialize {
        what: &'static str,
        uuid: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("unsupported content type")]
    InvalidContentType,
    #[error("could not serialize combined message: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("producer error: {0}")]
    Produce(#[source] anyhow::Error),
}

/// Error taxonomy for the stream-processing path. Every variant here is
/// handled by logging and dropping the message; none is retried and none
/// is fatal (a single poison message consumes one upstream offset and the
/// loop moves on).
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("could not parse message body: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("empty uuid")]
    EmptyUuid,
    #[error("contentUri did not match the whitelist")]
    FilteredUri,
    #[error("Origin-System-Id did not match the whitelist")]
    FilteredOrigin,
    #[error("unsupported content type")]
    InvalidContentType,
    #[error("could not extract a valid uuid from the delete event's contentUri")]
    InvalidUuidInDelete,
    #[error(transparent)]
    Combiner(#[from] CombinerError),
    #[error(transparent)]
    Forward(#[from] ForwardError),
}

/// Error taxonomy surfaced by the synchronous force-publish path, mapped
/// directly onto HTTP status codes by the handler.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("invalid uuid")]
    InvalidUuid,
    #[error("no content and no metadata found for this uuid")]
    NotFound,
    #[error("unsupported content type")]
    InvalidContentType,
    #[error(transparent)]
    Combiner(#[from] CombinerError),
    #[error(transparent)]
    Forward(#[from] ForwardError),
}

impl RequestError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            RequestError::InvalidUuid => StatusCode::BAD_REQUEST,
            RequestError::NotFound => StatusCode::NOT_FOUND,
            RequestError::InvalidContentType => StatusCode::UNPROCESSABLE_ENTITY,
            RequestError::Combiner(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RequestError::Forward(ForwardError::InvalidContentType) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            RequestError::Forward(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
