//! Configuration management for updated.
//!
//! Settings come from an optional YAML file, then environment variables
//! override individual keys, then [`Config::validate`] checks the result.

use anyhow::{bail, Context, Result};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::fs_abstraction::FileSystem;
use crate::trust_anchor::DEFAULT_ROOT_ANCHORS_SHA256;
use crate::validation::{parse_interval, validate_md5_hex, validate_sha256_hex};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/updated/config.yaml";

const MIN_PERIOD: Duration = Duration::from_secs(5 * 60);
const MIN_HTTP_TIMEOUT: Duration = Duration::from_secs(1);
const VALID_LOG_LEVELS: &[&str] = &["debug", "info", "warn", "error"];

static GIT_URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"((git|ssh|https?)|(git@[\w.]+))(:(//)?)([\w.@:/\-~]+)(\.git)(/)?")
        .expect("valid git URL pattern")
});

/// Secure string type that zeroizes memory on drop
/// Used for sensitive data like tokens and passwords
#[derive(Clone, Default, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct SecureString(String);

impl SecureString {
    pub fn new(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for SecureString {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SecureString {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory receiving the generated files
    pub output_dir: PathBuf,

    /// Time between two update cycles (e.g. "600m")
    pub period: String,

    /// Also block the addresses the blocked hostnames resolve to
    pub resolve_hostnames: bool,

    /// Per-request HTTP timeout (e.g. "10s")
    pub http_timeout: String,

    /// Expected MD5 of named.root, empty to skip verification
    pub named_root_md5: String,

    /// Expected SHA-256 of root-anchors.xml
    pub root_anchors_sha256: String,

    /// debug, info, warn or error
    pub log_level: String,

    pub git: GitConfig,

    pub health: HealthConfig,

    pub alerts: AlertsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./files"),
            period: "600m".to_string(),
            resolve_hostnames: false,
            http_timeout: "10s".to_string(),
            named_root_md5: String::new(),
            root_anchors_sha256: DEFAULT_ROOT_ANCHORS_SHA256.to_string(),
            log_level: "info".to_string(),
            git: GitConfig::default(),
            health: HealthConfig::default(),
            alerts: AlertsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from YAML file
    pub fn load<P: AsRef<Path>>(fs: &dyn FileSystem, path: P) -> Result<Self> {
        let content = fs
            .read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    pub fn load_or_default<P: AsRef<Path>>(fs: &dyn FileSystem, path: P) -> Result<Self> {
        if !fs.exists(path.as_ref()) {
            return Ok(Self::default());
        }
        Self::load(fs, path)
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|key| env::var(key).ok())
    }

    /// Apply overrides from `lookup`, keyed by environment variable name.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("OUTPUT_DIR") {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("PERIOD") {
            self.period = v;
        }
        if let Some(v) = lookup("RESOLVE_HOSTNAMES") {
            self.resolve_hostnames = parse_bool("RESOLVE_HOSTNAMES", &v)?;
        }
        if let Some(v) = lookup("HTTP_TIMEOUT") {
            self.http_timeout = v;
        }
        if let Some(v) = lookup("NAMED_ROOT_MD5") {
            self.named_root_md5 = v;
        }
        if let Some(v) = lookup("ROOT_ANCHORS_SHA256") {
            self.root_anchors_sha256 = v;
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            self.log_level = v.to_lowercase();
        }
        if let Some(v) = lookup("GIT") {
            self.git.enabled = parse_bool("GIT", &v)?;
        }
        if let Some(v) = lookup("GIT_URL") {
            self.git.url = v;
        }
        if let Some(v) = lookup("SSH_KEY") {
            self.git.ssh_key = PathBuf::from(v);
        }
        if let Some(v) = lookup("SSH_KNOWN_HOSTS") {
            self.git.ssh_known_hosts = PathBuf::from(v);
        }
        if let Some(v) = lookup("HEALTH_LISTEN") {
            self.health.listen = v;
        }
        if let Some(v) = lookup("UPDATED_GOTIFY_TOKEN") {
            self.alerts.gotify.token = SecureString::new(v);
        }
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.output_dir.as_os_str().is_empty() {
            bail!("Output directory cannot be empty");
        }

        let period = parse_interval(&self.period).context("Invalid period")?;
        if period < MIN_PERIOD {
            bail!("Period '{}' is too small, minimum is 5m", self.period);
        }

        let timeout = parse_interval(&self.http_timeout).context("Invalid http_timeout")?;
        if timeout < MIN_HTTP_TIMEOUT {
            bail!("HTTP timeout '{}' is too small, minimum is 1s", self.http_timeout);
        }

        validate_md5_hex(&self.named_root_md5).context("Invalid named_root_md5")?;
        validate_sha256_hex(&self.root_anchors_sha256).context("Invalid root_anchors_sha256")?;

        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            bail!(
                "Invalid log_level '{}'. Valid values: {}",
                self.log_level,
                VALID_LOG_LEVELS.join(", ")
            );
        }

        self.git.validate()?;

        self.health
            .listen
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid health listen address: {}", self.health.listen))?;

        // Validate webhook URL uses HTTPS if enabled
        if self.alerts.webhook.enabled && !self.alerts.webhook.url.starts_with("https://") {
            bail!("Webhook URL must use HTTPS: {}", self.alerts.webhook.url);
        }

        // Validate Gotify URL uses HTTPS if enabled
        if self.alerts.gotify.enabled && !self.alerts.gotify.url.starts_with("https://") {
            bail!("Gotify URL must use HTTPS: {}", self.alerts.gotify.url);
        }

        Ok(())
    }

    /// Check that the Git SSH files exist, when Git is enabled.
    pub fn check_files(&self, fs: &dyn FileSystem) -> Result<()> {
        if !self.git.enabled {
            return Ok(());
        }
        for (what, path) in [
            ("SSH key", &self.git.ssh_key),
            ("SSH known hosts", &self.git.ssh_known_hosts),
        ] {
            if !fs.exists(path) {
                bail!("{} file not found: {:?}", what, path);
            }
        }
        Ok(())
    }

    /// Validated period; falls back to the default if unparsable
    pub fn period(&self) -> Duration {
        parse_interval(&self.period).unwrap_or(Duration::from_secs(600 * 60))
    }

    /// Validated HTTP timeout; falls back to the default if unparsable
    pub fn http_timeout(&self) -> Duration {
        parse_interval(&self.http_timeout).unwrap_or(crate::fetcher::DEFAULT_TIMEOUT)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "yes" | "true" | "on" | "1" => Ok(true),
        "no" | "false" | "off" | "0" => Ok(false),
        _ => bail!("Invalid boolean for {}: {:?}", key, value),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    pub enabled: bool,
    /// Remote the output directory is pushed to
    pub url: String,
    pub ssh_key: PathBuf,
    pub ssh_known_hosts: PathBuf,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            ssh_key: PathBuf::from("./key"),
            ssh_known_hosts: PathBuf::from("./known_hosts"),
        }
    }
}

impl GitConfig {
    fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if self.url.is_empty() {
            bail!("Git URL is required when Git is enabled");
        }
        if !GIT_URL_PATTERN.is_match(&self.url) {
            bail!("Git URL is not valid: {}", self.url);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Address of the health endpoint
    pub listen: String,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:9999".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AlertsConfig {
    pub gotify: GotifyConfig,
    pub webhook: WebhookConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GotifyConfig {
    pub enabled: bool,
    pub url: String,
    /// Token can be set directly or via UPDATED_GOTIFY_TOKEN env var
    /// Memory is securely zeroed when dropped
    pub token: SecureString,
    /// Environment variable name to read token from (optional)
    #[serde(default)]
    pub token_env: Option<String>,
}

impl GotifyConfig {
    /// Get the effective token, checking the custom env var first if configured
    pub fn get_token(&self) -> SecureString {
        if let Some(ref env_name) = self.token_env {
            if let Ok(val) = env::var(env_name) {
                return SecureString::new(val);
            }
        }
        self.token.clone()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WebhookConfig {
    pub enabled: bool,
    pub url: String,
    #[serde(deserialize_with = "deserialize_headers")]
    pub headers: HashMap<String, String>,
}

/// Deserialize and validate HTTP headers (reject injection attempts)
fn deserialize_headers<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let headers: HashMap<String, String> = HashMap::deserialize(deserializer)?;

    for (key, value) in &headers {
        if key.contains('\r') || key.contains('\n') {
            return Err(serde::de::Error::custom(format!(
                "Invalid header name '{}': contains newline characters",
                key
            )));
        }
        if value.contains('\r') || value.contains('\n') {
            return Err(serde::de::Error::custom(format!(
                "Invalid header value for '{}': contains newline characters",
                key
            )));
        }
        // RFC 7230 token characters, restricted
        if !key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_".contains(c))
        {
            return Err(serde::de::Error::custom(format!(
                "Invalid header name '{}': contains invalid characters",
                key
            )));
        }
    }

    Ok(headers)
}
