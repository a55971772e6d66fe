use crate::{env_or_default, env_required, ConfigError, FromEnv};
use std::time::Duration;

/// Connection settings for the hosted data backend (relational REST API and
/// object storage share one base URL and key).
#[derive(Clone, Debug)]
pub struct BackendConfig {
    /// Base URL without a trailing slash, e.g. `https://abc.example.co`
    pub url: String,
    /// API key sent as both `apikey` and bearer token
    pub api_key: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl BackendConfig {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: normalize_url(url.into()),
            api_key: api_key.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Endpoint of the relational REST API
    pub fn rest_url(&self) -> String {
        format!("{}/rest/v1", self.url)
    }

    /// Endpoint of the object storage API
    pub fn storage_url(&self) -> String {
        format!("{}/storage/v1", self.url)
    }
}

const DEFAULT_TIMEOUT_SECS: u64 = 10;

fn normalize_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

impl FromEnv for BackendConfig {
    /// Requires STOREFRONT_BACKEND_URL and STOREFRONT_BACKEND_KEY.
    /// STOREFRONT_BACKEND_TIMEOUT_SECS defaults to 10.
    fn from_env() -> Result<Self, ConfigError> {
        let url = env_required("STOREFRONT_BACKEND_URL")?;
        let api_key = env_required("STOREFRONT_BACKEND_KEY")?;
        let timeout_secs: u64 = env_or_default(
            "STOREFRONT_BACKEND_TIMEOUT_SECS",
            &DEFAULT_TIMEOUT_SECS.to_string(),
        )
        .parse()
        .map_err(|e| ConfigError::ParseError {
            key: "STOREFRONT_BACKEND_TIMEOUT_SECS".to_string(),
            details: format!("{}", e),
        })?;

        Ok(Self::new(url, api_key).with_timeout(Duration::from_secs(timeout_secs)))
    }
}
