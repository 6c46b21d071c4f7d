//! Configuration module for the Roost client.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::time::Duration;

/// Default per-request timeout in seconds.
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the Roost REST API
    pub api_url: String,
    /// Public web-app URL (used when sharing listings)
    pub web_url: String,
    /// Fixed upper bound applied to every HTTP request
    pub http_timeout: Duration,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let api_url =
            env::var("ROOST_API_URL").unwrap_or_else(|_| "http://127.0.0.1:8080/api".to_string());

        let web_url =
            env::var("ROOST_WEB_URL").unwrap_or_else(|_| "https://roost.example".to_string());

        let http_timeout = env::var("ROOST_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS));

        let log_level = env::var("ROOST_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Self {
            api_url,
            web_url,
            http_timeout,
            log_level,
        }
    }

    /// Build a configuration pointing at an explicit API base URL, keeping
    /// defaults for everything else. Used by tests and embedding hosts.
    pub fn with_api_url(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            web_url: "https://roost.example".to_string(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            log_level: "info".to_string(),
        }
    }

    /// URL a listing can be shared under on the public web app.
    pub fn listing_share_url(&self, listing_id: &str) -> String {
        format!(
            "{}/listings/{}",
            self.web_url.trim_end_matches('/'),
            listing_id
        )
    }
}
