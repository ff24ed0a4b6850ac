//! HTTP client for the identity provider.
//!
//! This module provides the four account operations the session core needs:
//! - Register a new account
//! - Confirm the account email with an emailed code
//! - Sign in with email and password
//! - Exchange a refresh token for a new token pair
//!
//! Every call is exactly one round trip; retry policy lives in the session
//! manager, never here.

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A matched access/refresh token pair from a single provider response.
///
/// Expirations are provider-reported and informational; the session manager
/// discovers staleness through 401s rather than clock checks, and some
/// providers omit or free-format these fields.
#[derive(Debug, Clone)]
pub struct TokenPair {
    /// Short-lived token authorizing API calls
    pub access_token: String,
    /// When the access token expires, if the provider said
    pub access_expires_at: Option<DateTime<Utc>>,
    /// Long-lived token used to mint the next pair
    pub refresh_token: String,
    /// When the refresh token expires, if the provider said
    pub refresh_expires_at: Option<DateTime<Utc>>,
}

/// The identity provider operations the session core depends on.
///
/// `AuthClient` is the HTTP implementation; tests substitute scripted fakes.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create an account. The provider emails a confirmation code.
    async fn register(&self, email: &str, name: &str, password: &str) -> AuthResult<()>;

    /// Confirm the account email with the emailed code.
    async fn confirm_email(&self, email: &str, code: &str) -> AuthResult<()>;

    /// Sign in, returning a fresh token pair.
    async fn login(&self, email: &str, password: &str) -> AuthResult<TokenPair>;

    /// Exchange a refresh token for a fresh token pair.
    async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenPair>;
}

/// Request body for account registration.
#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    email: &'a str,
    name: &'a str,
    password: &'a str,
}

/// Request body for email confirmation.
#[derive(Debug, Serialize)]
struct ConfirmEmailRequest<'a> {
    email: &'a str,
    code: &'a str,
}

/// Request body for sign-in.
#[derive(Debug, Serialize)]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Request body for token refresh.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Success body for sign-in and refresh.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    access_token: String,
    access_token_expiration: String,
    refresh_token: String,
    refresh_token_expiration: String,
}

impl TokenResponse {
    fn into_token_pair(self) -> TokenPair {
        TokenPair {
            access_expires_at: parse_expiration(&self.access_token_expiration),
            refresh_expires_at: parse_expiration(&self.refresh_token_expiration),
            access_token: self.access_token,
            refresh_token: self.refresh_token,
        }
    }
}

/// Error body the provider attaches to rejections, when it does.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    message: String,
    code: i32,
}

/// Parse a provider expiration timestamp, tolerating absent or free-form values.
fn parse_expiration(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Map a non-2xx response to the typed taxonomy: a decodable `ErrorEnvelope`
/// becomes a provider error, anything else stays a transport error. Bodies
/// are never logged, only their size.
async fn error_from_response(operation: &'static str, response: reqwest::Response) -> AuthError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(envelope) => {
            tracing::warn!(
                operation = operation,
                status = %status,
                code = envelope.code,
                "Provider rejected the request"
            );
            AuthError::Provider {
                code: envelope.code,
                message: envelope.message,
            }
        }
        Err(_) => {
            tracing::warn!(
                operation = operation,
                status = %status,
                body_len = body.len(),
                "Request failed without an error envelope"
            );
            AuthError::Transport(format!("{} failed with status {}", operation, status))
        }
    }
}

/// HTTP implementation of [`IdentityProvider`].
#[derive(Clone)]
pub struct AuthClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl AuthClient {
    /// Create a client for the configured provider.
    pub fn new(config: &AuthConfig) -> AuthResult<Self> {
        Self::with_http_client(reqwest::Client::new(), config)
    }

    /// Create a client with a caller-configured `reqwest::Client`.
    ///
    /// The core sets no request timeout of its own; embedders that want one
    /// build it into the client they pass here.
    pub fn with_http_client(http_client: reqwest::Client, config: &AuthConfig) -> AuthResult<Self> {
        let base = config.provider_url()?;
        Ok(Self {
            http_client,
            base_url: base.as_str().trim_end_matches('/').to_string(),
        })
    }

    /// Build the full URL for a provider path.
    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Register a new account.
    pub async fn register(&self, email: &str, name: &str, password: &str) -> AuthResult<()> {
        let url = self.endpoint("/account/sign-up");
        tracing::debug!(url = %url, email = %email, "Registering account");

        let response = self
            .http_client
            .post(&url)
            .json(&RegisterRequest {
                email,
                name,
                password,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response("sign-up", response).await);
        }

        tracing::info!(email = %email, "Registration submitted");
        Ok(())
    }

    /// Confirm the account email with the emailed code.
    pub async fn confirm_email(&self, email: &str, code: &str) -> AuthResult<()> {
        let url = self.endpoint("/account/email/confirmation");
        tracing::debug!(url = %url, email = %email, "Confirming email");

        let response = self
            .http_client
            .post(&url)
            .json(&ConfirmEmailRequest { email, code })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response("email confirmation", response).await);
        }

        tracing::info!(email = %email, "Email confirmed");
        Ok(())
    }

    /// Sign in with email and password.
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<TokenPair> {
        let url = self.endpoint("/Auth/sign-in");
        tracing::debug!(url = %url, email = %email, "Signing in");

        let response = self
            .http_client
            .post(&url)
            .json(&SignInRequest { email, password })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response("sign-in", response).await);
        }

        let tokens: TokenResponse = response.json().await?;
        tracing::info!(email = %email, "Signed in");
        Ok(tokens.into_token_pair())
    }

    /// Exchange a refresh token for a new token pair.
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        let url = self.endpoint("/Auth/tokens");
        tracing::debug!(url = %url, "Refreshing tokens");

        let response = self
            .http_client
            .post(&url)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response("token refresh", response).await);
        }

        let tokens: TokenResponse = response.json().await?;
        tracing::debug!("Token pair refreshed");
        Ok(tokens.into_token_pair())
    }
}

#[async_trait]
impl IdentityProvider for AuthClient {
    async fn register(&self, email: &str, name: &str, password: &str) -> AuthResult<()> {
        AuthClient::register(self, email, name, password).await
    }

    async fn confirm_email(&self, email: &str, code: &str) -> AuthResult<()> {
        AuthClient::confirm_email(self, email, code).await
    }

    async fn login(&self, email: &str, password: &str) -> AuthResult<TokenPair> {
        AuthClient::login(self, email, password).await
    }

    async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        AuthClient::refresh(self, refresh_token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> AuthClient {
        AuthClient::new(&AuthConfig::with_provider_url("https://id.internal.test")).unwrap()
    }

    #[test]
    fn test_client_creation_trims_trailing_slash() {
        let config = AuthConfig::with_provider_url("https://id.internal.test/");
        let client = AuthClient::new(&config).unwrap();
        assert_eq!(client.base_url, "https://id.internal.test");
    }

    #[test]
    fn test_client_creation_rejects_bad_url() {
        let config = AuthConfig::with_provider_url("not a url");
        assert!(matches!(AuthClient::new(&config), Err(AuthError::Config(_))));
    }

    #[test]
    fn test_endpoint_paths() {
        let client = test_client();
        assert_eq!(
            client.endpoint("/account/sign-up"),
            "https://id.internal.test/account/sign-up"
        );
        assert_eq!(
            client.endpoint("/account/email/confirmation"),
            "https://id.internal.test/account/email/confirmation"
        );
        assert_eq!(
            client.endpoint("/Auth/sign-in"),
            "https://id.internal.test/Auth/sign-in"
        );
        assert_eq!(
            client.endpoint("/Auth/tokens"),
            "https://id.internal.test/Auth/tokens"
        );
    }

    #[test]
    fn test_refresh_request_field_is_camel_case() {
        let body = serde_json::to_string(&RefreshRequest {
            refresh_token: "rt-1",
        })
        .unwrap();
        assert_eq!(body, "{\"refreshToken\":\"rt-1\"}");
    }

    #[test]
    fn test_token_response_decodes_and_parses_expirations() {
        let json = r#"{
            "accessToken": "at-1",
            "accessTokenExpiration": "2026-01-01T00:00:00Z",
            "refreshToken": "rt-1",
            "refreshTokenExpiration": "2026-02-01T00:00:00Z"
        }"#;

        let pair = serde_json::from_str::<TokenResponse>(json)
            .unwrap()
            .into_token_pair();
        assert_eq!(pair.access_token, "at-1");
        assert_eq!(pair.refresh_token, "rt-1");
        assert!(pair.access_expires_at.is_some());
        assert!(pair.refresh_expires_at.is_some());
        assert!(pair.refresh_expires_at.unwrap() > pair.access_expires_at.unwrap());
    }

    #[test]
    fn test_token_response_tolerates_freeform_expirations() {
        let json = r#"{
            "accessToken": "at-1",
            "accessTokenExpiration": "whenever",
            "refreshToken": "rt-1",
            "refreshTokenExpiration": ""
        }"#;

        let pair = serde_json::from_str::<TokenResponse>(json)
            .unwrap()
            .into_token_pair();
        assert_eq!(pair.access_token, "at-1");
        assert_eq!(pair.access_expires_at, None);
        assert_eq!(pair.refresh_expires_at, None);
    }

    #[test]
    fn test_token_response_missing_field_is_an_error() {
        let json = r#"{"accessToken": "at-1"}"#;
        assert!(serde_json::from_str::<TokenResponse>(json).is_err());
    }

    #[test]
    fn test_error_envelope_decodes() {
        let envelope: ErrorEnvelope =
            serde_json::from_str(r#"{"message": "email already registered", "code": 409}"#)
                .unwrap();
        assert_eq!(envelope.code, 409);
        assert_eq!(envelope.message, "email already registered");
    }
}
