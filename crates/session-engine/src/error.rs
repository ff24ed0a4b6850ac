//! Session and authentication error types.

use thiserror::Error;

/// Error type shared by the auth client and the session manager.
///
/// The enum is `Clone` because a single refresh outcome is delivered to
/// every request waiting on it, so variants carry rendered causes rather
/// than source errors.
#[derive(Error, Debug, Clone)]
pub enum AuthError {
    /// Network-level failure, or a rejection with no decodable error body
    #[error("Transport error: {0}")]
    Transport(String),

    /// Error envelope decoded from a provider response
    #[error("Provider error {code}: {message}")]
    Provider { code: i32, message: String },

    /// Success response whose body could not be decoded
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// No refresh token available when a refresh was attempted
    #[error("No refresh token stored")]
    MissingToken,

    /// Email, password, or confirmation code rejected before any network call
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The caller cancelled the operation
    #[error("Operation cancelled")]
    Cancelled,

    /// Still unauthorized after a successful refresh and retry
    #[error("Request unauthorized after token refresh")]
    Unauthorized,

    /// Credential store failure
    #[error("Storage error: {0}")]
    Store(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuthError {
    /// Returns true if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::Transport(_))
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            AuthError::MalformedResponse(e.to_string())
        } else {
            AuthError::Transport(e.to_string())
        }
    }
}

impl From<credential_store::StoreError> for AuthError {
    fn from(e: credential_store::StoreError) -> Self {
        AuthError::Store(e.to_string())
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
