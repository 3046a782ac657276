use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::config::SERVICE_NAME;

pub const HEALTH_PATH: &str = "/__health";
pub const GTG_PATH: &str = "/__gtg";
pub const BUILD_INFO_PATH: &str = "/__build-info";
const KAFKA_REST_PROXY_TOPICS_PATH: &str = "/__kafka-rest-proxy/topics";

/// Read-only probes against the broker proxy and the two reference HTTP
/// services. An external collaborator: neither on the data path nor
/// gating emission, sharing only the HTTP client with the core.
pub struct AdminState {
    client: reqwest::Client,
    kafka_proxy_address: String,
    doc_store_base_url: String,
    public_annotations_base_url: String,
}

impl AdminState {
    pub fn new(
        client: reqwest::Client,
        kafka_proxy_address: String,
        doc_store_base_url: String,
        public_annotations_base_url: String,
    ) -> Self {
        Self {
            client,
            kafka_proxy_address,
            doc_store_base_url,
            public_annotations_base_url,
        }
    }

    async fn check_kafka_proxy(&self) -> Result<(), anyhow::Error> {
        let url = format!("{}{}", self.kafka_proxy_address, KAFKA_REST_PROXY_TOPICS_PATH);
        probe(&self.client, &url).await
    }

    async fn check_document_store(&self) -> Result<(), anyhow::Error> {
        probe(&self.client, &self.doc_store_base_url).await
    }

    async fn check_public_annotations(&self) -> Result<(), anyhow::Error> {
        probe(&self.client, &self.public_annotations_base_url).await
    }
}

async fn probe(client: &reqwest::Client, url: &str) -> Result<(), anyhow::Error> {
    client
        .get(url)
        .send()
        .await
        .map_err(|err| anyhow::anyhow!("{url} unreachable: {err}"))?;
    Ok(())
}

#[derive(Serialize)]
struct CheckResult {
    name: &'static str,
    ok: bool,
    message: Option<String>,
}

#[derive(Serialize)]
struct HealthReport {
    system_code: &'static str,
    name: &'static str,
    checks: Vec<CheckResult>,
}

async fn run_checks(state: &AdminState) -> Vec<CheckResult> {
    let checks: Vec<(&'static str, Result<(), anyhow::Error>)> = vec![
        ("kafka-proxy-connectivity", state.check_kafka_proxy().await),
        ("document-store-api-connectivity", state.check_document_store().await),
        (
            "public-annotations-api-connectivity",
            state.check_public_annotations().await,
        ),
    ];

    checks
        .into_iter()
        .map(|(name, result)| match result {
            Ok(()) => CheckResult {
                name,
                ok: true,
                message: None,
            },
            Err(err) => CheckResult {
                name,
                ok: false,
                message: Some(err.to_string()),
            },
        })
        .collect()
}

async fn health_handler(State(state): State<Arc<AdminState>>) -> impl IntoResponse {
    let checks = run_checks(&state).await;
    Json(HealthReport {
        system_code: "upp-post-publication-combiner",
        name: SERVICE_NAME,
        checks,
    })
}

async fn gtg_handler(State(state): State<Arc<AdminState>>) -> impl IntoResponse {
    let checks = run_checks(&state).await;
    if checks.iter().all(|c| c.ok) {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not good to go")
    }
}

#[derive(Serialize)]
struct BuildInfo {
    name: &'static str,
    version: &'static str,
}

async fn build_info_handler() -> impl IntoResponse {
    Json(BuildInfo {
        name: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router(state: Arc<AdminState>) -> Router {
    Router::new()
        .route(HEALTH_PATH, get(health_handler))
        .route(GTG_PATH, get(gtg_handler))
        .route(BUILD_INFO_PATH, get(build_info_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::{matchers::*, responders::*, Expectation, Server};

    #[tokio::test]
    async fn gtg_is_ok_when_all_dependencies_respond() {
        let kafka = Server::run();
        kafka.expect(Expectation::matching(request::method_path("GET", "/__kafka-rest-proxy/topics")).respond_with(status_code(200).body("[]")));
        let docs = Server::run();
        docs.expect(Expectation::matching(request::method_path("GET", "/")).respond_with(status_code(200)));
        let anns = Server::run();
        anns.expect(Expectation::matching(request::method_path("GET", "/")).respond_with(status_code(200)));

        let state = Arc::new(AdminState::new(
            reqwest::Client::new(),
            kafka.url_str("").trim_end_matches('/').to_string(),
            docs.url_str("/"),
            anns.url_str("/"),
        ));

        let checks = run_checks(&state).await;
        assert!(checks.iter().all(|c| c.ok));
    }

    #[tokio::test]
    async fn gtg_reports_failure_when_a_dependency_is_unreachable() {
        let state = Arc::new(AdminState::new(
            reqwest::Client::new(),
            "http://127.0.0.1:1".to_string(),
            "http://127.0.0.1:1".to_string(),
            "http://127.0.0.1:1".to_string(),
        ));

        let checks = run_checks(&state).await;
        assert!(checks.iter().all(|c| !c.ok));
    }
}
