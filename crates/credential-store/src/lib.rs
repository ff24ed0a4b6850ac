//! Credential storage abstraction for the session core.
//!
//! The core treats secure storage as a capability supplied by the
//! environment: anything that can set/get/delete string values under the
//! four managed keys works. This crate provides:
//! - [`CredentialStore`]: the capability trait backends implement
//! - [`StoreKeys`]: the exact key names shared with existing installs
//! - [`CredentialVault`]: typed accessors enforcing pairwise token writes
//! - [`MemoryStore`]: a process-local backend for tests and bootstrapping

mod keys;
mod memory;
mod traits;
mod vault;

pub use keys::StoreKeys;
pub use memory::MemoryStore;
pub use traits::CredentialStore;
pub use vault::CredentialVault;

use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Backend-specific storage error
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),
}

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;
