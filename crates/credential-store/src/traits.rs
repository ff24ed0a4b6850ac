//! Storage trait definitions.

use crate::{StoreKeys, StoreResult};

/// Trait for credential storage backends.
///
/// The environment supplies the real implementation (keychain, secret
/// service, encrypted file). The core only requires these operations.
pub trait CredentialStore: Send + Sync {
    /// Store a value under a key
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Retrieve a value
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Delete a value, returning whether one was present
    fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Check if a key exists
    fn has(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Delete every managed key.
    /// Backends with a native wipe can override; the default walks the
    /// managed key set and tolerates keys that are already absent.
    fn delete_all(&self) -> StoreResult<()> {
        for key in StoreKeys::ALL {
            let _ = self.delete(key);
        }
        Ok(())
    }
}
