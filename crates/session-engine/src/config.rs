//! Configuration for the session core.

use crate::error::{AuthError, AuthResult};
use serde::{Deserialize, Serialize};
use url::Url;

/// Default identity provider URL (can be overridden at compile time via PROVIDER_URL env var).
pub const DEFAULT_PROVIDER_URL: &str = match option_env!("PROVIDER_URL") {
    Some(url) => url,
    None => "https://id.example.com",
};

/// Session core configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Identity provider base URL.
    #[serde(default = "default_provider_url")]
    pub provider_url: String,
}

fn default_provider_url() -> String {
    DEFAULT_PROVIDER_URL.to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            provider_url: DEFAULT_PROVIDER_URL.to_string(),
        }
    }
}

impl AuthConfig {
    /// Create a config with compile-time defaults, then apply environment overrides.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Create a config pointing at a specific provider.
    pub fn with_provider_url(provider_url: impl Into<String>) -> Self {
        Self {
            provider_url: provider_url.into(),
        }
    }

    /// Apply environment variable overrides.
    fn load_from_env(&mut self) {
        if let Ok(url) = std::env::var("AUTH_PROVIDER_URL") {
            if !url.is_empty() {
                self.provider_url = url;
            }
        }
    }

    /// Get the provider base URL as a parsed URL.
    pub fn provider_url(&self) -> AuthResult<Url> {
        Url::parse(&self.provider_url)
            .map_err(|e| AuthError::Config(format!("invalid provider URL: {}", e)))
    }
}
