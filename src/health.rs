//! Health reporting: the latest cycle's outcome, served over HTTP.

use anyhow::{bail, Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Timeout of the `healthcheck` client
const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Receives the outcome of every cycle.
pub trait HealthSink: Send + Sync {
    /// `None` marks the process healthy
    fn set_health_err(&self, err: Option<String>);
}

/// Latest cycle error, shared between the runner and the HTTP handler.
#[derive(Debug, Default)]
pub struct HealthState {
    err: RwLock<Option<String>>,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn health_err(&self) -> Option<String> {
        self.err.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl HealthSink for HealthState {
    fn set_health_err(&self, err: Option<String>) {
        *self.err.write().unwrap_or_else(|e| e.into_inner()) = err;
    }
}

/// Router answering `GET /` with 200, or 500 and the error text.
pub fn router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/", get(health_handler).fallback(not_found))
        .fallback(not_found)
        .with_state(state)
}

async fn health_handler(State(state): State<Arc<HealthState>>) -> Response {
    match state.health_err() {
        None => StatusCode::OK.into_response(),
        Some(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not Found")
}

/// Serve the health endpoint on `listener` until `cancel` fires.
pub async fn serve_listener(
    listener: TcpListener,
    state: Arc<HealthState>,
    cancel: CancellationToken,
) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Health server listening on http://{}", addr);
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .context("Health server failed")
}

/// Ask a running instance whether it is healthy.
pub async fn query(url: &str) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(QUERY_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")?;
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to query {}", url))?;

    let status = response.status();
    if status == reqwest::StatusCode::OK {
        return Ok(());
    }
    let body = response
        .text()
        .await
        .context("cannot read healthcheck response body")?;
    bail!("bad HTTP status code: {}: {}", status, body.trim());
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn start(state: Arc<HealthState>) -> (String, CancellationToken) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let cancel = CancellationToken::new();
        tokio::spawn(serve_listener(listener, state, cancel.clone()));
        (url, cancel)
    }

    #[test]
    fn test_state_roundtrip() {
        let state = HealthState::new();
        assert!(state.health_err().is_none());
        state.set_health_err(Some("boom".to_string()));
        assert_eq!(state.health_err().as_deref(), Some("boom"));
        state.set_health_err(None);
        assert!(state.health_err().is_none());
    }

    #[tokio::test]
    async fn test_server_reports_health() {
        let state = Arc::new(HealthState::new());
        let (url, cancel) = start(Arc::clone(&state)).await;

        query(&url).await.unwrap();

        state.set_health_err(Some("at least one error encountered: x".to_string()));
        let err = query(&url).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("500"), "{msg}");
        assert!(msg.contains("at least one error encountered: x"), "{msg}");

        cancel.cancel();
    }

    #[tokio::test]
    async fn test_server_other_paths_not_found() {
        let (url, cancel) = start(Arc::new(HealthState::new())).await;
        let client = reqwest::Client::new();

        let resp = client.get(format!("{url}/metrics")).send().await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

        let resp = client.post(&url).send().await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

        cancel.cancel();
    }

    #[tokio::test]
    async fn test_query_unreachable() {
        assert!(query("http://127.0.0.1:1").await.is_err());
    }
}
