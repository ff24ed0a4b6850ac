//! Session and identity lifecycle over a pluggable credential store.
//!
//! This crate provides:
//! - An HTTP client for the identity provider endpoints (`client`)
//! - Session orchestration with single-flight token refresh (`session`)
//! - An explicit FSM for the signup progression (`flow`)
//! - Provider endpoint configuration (`config`)
//!
//! Token persistence lives behind [`credential_store::CredentialStore`];
//! nothing in this crate assumes a particular keychain or backend, and no
//! request transport is baked in beyond the provider calls themselves.

mod client;
mod config;
mod error;
mod flow;
mod session;

#[cfg(test)]
mod tests;

pub use client::{AuthClient, IdentityProvider, TokenPair};
pub use config::{AuthConfig, DEFAULT_PROVIDER_URL};
pub use error::{AuthError, AuthResult};
pub use flow::{FlowInput, FlowState, SignupFlow};
pub use session::{
    RequestOutcome, SessionEvent, SessionEventCallback, SessionManager, SessionState,
};
