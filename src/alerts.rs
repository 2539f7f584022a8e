//! Alert system for updated (Gotify, webhook).

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error};

use crate::config::AlertsConfig;

/// Timeout for alert HTTP requests
const TIMEOUT_SECS: u64 = 30;

/// Alert severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Info,
    Error,
}

impl AlertLevel {
    fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Info => "INFO",
            AlertLevel::Error => "ERROR",
        }
    }

    fn gotify_priority(&self) -> u8 {
        match self {
            AlertLevel::Info => 2,
            AlertLevel::Error => 8,
        }
    }
}

/// One notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub level: AlertLevel,
    pub title: String,
    pub message: String,
}

impl Alert {
    pub fn program_started() -> Self {
        Self {
            level: AlertLevel::Info,
            title: "updated".to_string(),
            message: "Program started".to_string(),
        }
    }

    /// A failed cycle; `error` is the aggregate error text
    pub fn cycle_failed(error: &str) -> Self {
        Self {
            level: AlertLevel::Error,
            title: "Update failed".to_string(),
            message: error.to_string(),
        }
    }
}

/// Outbound notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `alert` everywhere configured; one error per failed destination.
    async fn send(&self, alert: &Alert) -> Vec<anyhow::Error>;
}

/// Notifier that drops everything, for when no destination is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, _alert: &Alert) -> Vec<anyhow::Error> {
        Vec::new()
    }
}

/// Alert manager
pub struct AlertManager {
    config: AlertsConfig,
    client: Client,
}

impl AlertManager {
    /// Create a new alert manager
    pub fn new(config: AlertsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client for alerts")?;

        Ok(Self { config, client })
    }

    /// Send alert via Gotify
    async fn send_gotify(&self, alert: &Alert) -> Result<()> {
        let url = format!("{}/message", self.config.gotify.url.trim_end_matches('/'));

        #[derive(Serialize)]
        struct GotifyMessage<'a> {
            title: &'a str,
            message: &'a str,
            priority: u8,
        }

        let payload = GotifyMessage {
            title: &alert.title,
            message: &alert.message,
            priority: alert.level.gotify_priority(),
        };

        // SecureString is zeroed on drop
        let token = self.config.gotify.get_token();

        let response = self
            .client
            .post(&url)
            .header("X-Gotify-Key", token.as_str())
            .json(&payload)
            .send()
            .await
            .context("Failed to send Gotify alert")?;

        if !response.status().is_success() {
            // Don't log response body as it may contain sensitive info
            bail!("Gotify returned {}", response.status());
        }

        debug!("Gotify alert sent successfully");
        Ok(())
    }

    /// Send alert via webhook
    async fn send_webhook(&self, alert: &Alert) -> Result<()> {
        #[derive(Serialize)]
        struct WebhookPayload<'a> {
            level: &'a str,
            title: &'a str,
            message: &'a str,
            timestamp: String,
            source: &'a str,
        }

        let payload = WebhookPayload {
            level: alert.level.as_str(),
            title: &alert.title,
            message: &alert.message,
            timestamp: chrono::Utc::now().to_rfc3339(),
            source: "updated",
        };

        let mut request = self.client.post(&self.config.webhook.url).json(&payload);

        // Headers were validated during config deserialization
        for (key, value) in &self.config.webhook.headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let response = request.send().await.context("Failed to send webhook")?;

        if !response.status().is_success() {
            bail!("Webhook returned {}", response.status());
        }

        debug!("Webhook alert sent successfully");
        Ok(())
    }
}

#[async_trait]
impl Notifier for AlertManager {
    async fn send(&self, alert: &Alert) -> Vec<anyhow::Error> {
        let mut errors = Vec::new();
        let mut destinations = 0;

        if self.config.gotify.enabled {
            destinations += 1;
            if let Err(e) = self.send_gotify(alert).await {
                error!("Gotify alert failed: {:#}", e);
                errors.push(e);
            }
        }

        if self.config.webhook.enabled {
            destinations += 1;
            if let Err(e) = self.send_webhook(alert).await {
                error!("Webhook alert failed: {:#}", e);
                errors.push(e);
            }
        }

        if destinations > 0 {
            debug!(
                "Alert sent to {}/{} destinations",
                destinations - errors.len(),
                destinations
            );
        }
        errors
    }
}
