//! Integration tests for the session engine.
//!
//! Test organization:
//!
//! - `harness.rs`      - Scripted provider, shared store and event log
//! - `lifecycle.rs`    - Bootstrap, login, logout and signup progression
//! - `refresh.rs`      - Single-flight refresh and forced logout
//! - `requests.rs`     - Authenticated request retry discipline
//! - `cancellation.rs` - Caller cancellation isolation

pub(crate) mod harness;
