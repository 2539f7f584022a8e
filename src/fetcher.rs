//! HTTP fetcher shared by the list builders and the trust anchor downloader.

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::FetchError;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for fetching source documents.
///
/// One GET per call, no retries: a failed source is retried on the next cycle.
pub struct Fetcher {
    client: Client,
    /// Cumulative download size (shared by concurrent builds)
    total_downloaded: AtomicUsize,
}

impl Fetcher {
    /// Create a new fetcher whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("updated/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            total_downloaded: AtomicUsize::new(0),
        })
    }

    /// Get the total bytes downloaded so far
    pub fn total_downloaded(&self) -> usize {
        self.total_downloaded.load(Ordering::Relaxed)
    }

    /// Reset the download counter
    pub fn reset_counter(&self) {
        self.total_downloaded.store(0, Ordering::Relaxed);
    }

    /// Fetch `url` and return the fully buffered body.
    ///
    /// Fails with [`FetchError::BadStatusCode`] on anything but `200 OK`,
    /// and with [`FetchError::Cancelled`] if `cancel` fires first.
    pub async fn fetch(&self, cancel: &CancellationToken, url: &str) -> Result<Vec<u8>, FetchError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            result = self.get(url) => result,
        }
    }

    /// Fetch `url` and decode the body as UTF-8 (invalid sequences replaced)
    pub async fn fetch_text(&self, cancel: &CancellationToken, url: &str) -> Result<String, FetchError> {
        let body = self.fetch(cancel, url).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::BadStatusCode {
                code: status.as_u16(),
                status: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let body = response.bytes().await?;
        self.total_downloaded.fetch_add(body.len(), Ordering::Relaxed);
        Ok(body.to_vec())
    }
}

// Note: Default is intentionally not implemented for Fetcher
// because new() can fail and we want explicit error handling.
