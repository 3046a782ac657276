use async_trait::async_trait;
use mockall::automock;

use crate::errors::{FetchError, FetchOutcome};

/// Fetches the byte body for a single uuid from a templated HTTP endpoint,
/// classifying the result into {ok, not-found, transport/http error}.
/// Not-found is a value, not an error.
#[automock]
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, uuid: &str) -> Result<FetchOutcome, FetchError>;
}

/// Substitutes `{uuid}` into `template` and issues a GET with the shared
/// client. The response body is always drained to completion before this
/// function returns, on every exit path.
pub struct HttpFetcher {
    client: reqwest::Client,
    template: String,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client, template: impl Into<String>) -> Self {
        Self {
            client,
            template: template.into(),
        }
    }

    fn url_for(&self, uuid: &str) -> String {
        if uuid.is_empty() {
            self.template.clone()
        } else {
            self.template.replace("{uuid}", uuid)
        }
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, uuid: &str) -> Result<FetchOutcome, FetchError> {
        let url = self.url_for(uuid);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            // Drain and drop the body even on the not-found path so the
            // connection can be reused.
            let _ = response.bytes().await;
            return Ok(FetchOutcome::NotFound);
        }

        if status != reqwest::StatusCode::OK {
            let _ = response.bytes().await;
            return Err(FetchError::UnexpectedStatus {
                url,
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| FetchError::Body {
                url: url.clone(),
                source,
            })?;

        Ok(FetchOutcome::Ok(body.to_vec()))
    }
}
