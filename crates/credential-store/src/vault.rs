//! High-level API for managing stored credentials.

use crate::{CredentialStore, StoreKeys, StoreResult};

/// Typed access to the credential store.
///
/// Token writes always go through [`store_tokens`](Self::store_tokens) so the
/// access and refresh tokens can never get out of step with each other; there
/// is deliberately no way to write just one of them.
pub struct CredentialVault {
    store: Box<dyn CredentialStore>,
}

impl CredentialVault {
    /// Create a new vault over the given storage backend
    pub fn new(store: Box<dyn CredentialStore>) -> Self {
        Self { store }
    }

    // ==========================================
    // Token pair
    // ==========================================

    /// Store both tokens from a single provider response
    pub fn store_tokens(&self, access_token: &str, refresh_token: &str) -> StoreResult<()> {
        self.store.set(StoreKeys::ACCESS_TOKEN, access_token)?;
        self.store.set(StoreKeys::REFRESH_TOKEN, refresh_token)?;
        Ok(())
    }

    /// Retrieve the access token
    pub fn access_token(&self) -> StoreResult<Option<String>> {
        self.store.get(StoreKeys::ACCESS_TOKEN)
    }

    /// Retrieve the refresh token
    pub fn refresh_token(&self) -> StoreResult<Option<String>> {
        self.store.get(StoreKeys::REFRESH_TOKEN)
    }

    /// Whether an access token is present
    pub fn has_access_token(&self) -> StoreResult<bool> {
        self.store.has(StoreKeys::ACCESS_TOKEN)
    }

    /// Remove both tokens, tolerating ones that are already absent
    pub fn clear_tokens(&self) -> StoreResult<()> {
        let _ = self.store.delete(StoreKeys::ACCESS_TOKEN);
        let _ = self.store.delete(StoreKeys::REFRESH_TOKEN);
        Ok(())
    }

    // ==========================================
    // Registration-time credentials
    // ==========================================

    /// Store the email/password pair while a registration awaits confirmation
    pub fn store_credentials(&self, email: &str, password: &str) -> StoreResult<()> {
        self.store.set(StoreKeys::EMAIL, email)?;
        self.store.set(StoreKeys::PASSWORD, password)?;
        Ok(())
    }

    /// Retrieve the pending registration email
    pub fn stored_email(&self) -> StoreResult<Option<String>> {
        self.store.get(StoreKeys::EMAIL)
    }

    /// Retrieve the pending registration password
    pub fn stored_password(&self) -> StoreResult<Option<String>> {
        self.store.get(StoreKeys::PASSWORD)
    }

    /// Remove the pending registration credentials
    pub fn clear_credentials(&self) -> StoreResult<()> {
        let _ = self.store.delete(StoreKeys::EMAIL);
        let _ = self.store.delete(StoreKeys::PASSWORD);
        Ok(())
    }

    // ==========================================
    // Forced logout
    // ==========================================

    /// Remove everything the store manages
    pub fn clear_all(&self) -> StoreResult<()> {
        if let Err(e) = self.store.delete_all() {
            tracing::warn!(error = %e, "Failed to clear credential store");
            return Err(e);
        }
        Ok(())
    }
}
