// =============================================================================
// Service Configuration — file-backed settings plus env-supplied credentials
// =============================================================================
//
// Tunables live in an optional JSON file.  Every field carries a serde default
// so a partial (or empty) file still loads, and a missing file falls back to
// `ServiceConfig::default()` at startup.
//
// Upstream credentials are never read from the file: they come from the
// environment (optionally via `.env`) and are only checked for presence.  An
// empty value is accepted here and simply fails at the upstream.
// =============================================================================

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_upstream_base_url() -> String {
    "http://20.244.56.144/evaluation-service".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_token_refresh_margin_secs() -> i64 {
    300
}

fn default_listing_ttl_secs() -> u64 {
    600
}

fn default_window_ttl_secs() -> u64 {
    60
}

fn default_latest_ttl_secs() -> u64 {
    20
}

// =============================================================================
// ServiceConfig
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Address the HTTP API listens on.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Base URL of the upstream evaluation service (no trailing slash).
    #[serde(default = "default_upstream_base_url")]
    pub upstream_base_url: String,

    /// Transport timeout applied to every upstream call.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// A token with this many seconds or fewer left is refreshed.
    #[serde(default = "default_token_refresh_margin_secs")]
    pub token_refresh_margin_secs: i64,

    /// TTL of the cached stock listing.
    #[serde(default = "default_listing_ttl_secs")]
    pub listing_ttl_secs: u64,

    /// TTL of a cached price history fetched with a `minutes` window.
    #[serde(default = "default_window_ttl_secs")]
    pub window_ttl_secs: u64,

    /// TTL of a cached latest-price lookup.
    #[serde(default = "default_latest_ttl_secs")]
    pub latest_ttl_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            upstream_base_url: default_upstream_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            token_refresh_margin_secs: default_token_refresh_margin_secs(),
            listing_ttl_secs: default_listing_ttl_secs(),
            window_ttl_secs: default_window_ttl_secs(),
            latest_ttl_secs: default_latest_ttl_secs(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// A missing or unreadable file is an error so the caller can fall back to
    /// defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read service config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse service config from {}", path.display()))?;

        info!(
            path = %path.display(),
            upstream = %config.upstream_base_url,
            bind_addr = %config.bind_addr,
            "service config loaded"
        );

        Ok(config)
    }

    /// Apply `STOCKS_BIND_ADDR` / `STOCKS_UPSTREAM_URL` overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = lookup("STOCKS_BIND_ADDR").filter(|s| !s.trim().is_empty()) {
            self.bind_addr = addr.trim().to_string();
        }
        if let Some(url) = lookup("STOCKS_UPSTREAM_URL").filter(|s| !s.trim().is_empty()) {
            self.upstream_base_url = url.trim().trim_end_matches('/').to_string();
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// =============================================================================
// Credentials
// =============================================================================

/// Credential bundle exchanged at the upstream `/auth` endpoint.
///
/// Serialises with the upstream's field names. `Debug` redacts the secrets.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub name: String,
    #[serde(rename = "rollNo")]
    pub roll_no: String,
    #[serde(rename = "accessCode")]
    pub access_code: String,
    #[serde(rename = "clientID")]
    pub client_id: String,
    #[serde(rename = "clientSecret")]
    pub client_secret: String,
}

impl Credentials {
    /// Read the credential bundle from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the bundle from an arbitrary key lookup. Every variable must be
    /// present; its value may be empty.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| {
            lookup(key).with_context(|| format!("environment variable {key} is not set"))
        };

        Ok(Self {
            email: get("API_EMAIL")?,
            name: get("API_NAME")?,
            roll_no: get("API_ROLL_NO")?,
            access_code: get("API_ACCESS_CODE")?,
            client_id: get("API_CLIENT_ID")?,
            client_secret: get("API_CLIENT_SECRET")?,
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("name", &self.name)
            .field("roll_no", &self.roll_no)
            .field("access_code", &"<redacted>")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}
