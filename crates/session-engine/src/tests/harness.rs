//! Test harness for session engine tests.
//!
//! Provides:
//! - ScriptedProvider: an identity provider that replays queued outcomes
//! - SharedStore: an in-memory credential store the test can inspect
//! - EventLog: records session events as they are emitted
//! - TestSession: wires the three around a `SessionManager`

use crate::client::{IdentityProvider, TokenPair};
use crate::error::{AuthError, AuthResult};
use crate::session::{SessionEvent, SessionManager};
use async_trait::async_trait;
use credential_store::{CredentialStore, CredentialVault, MemoryStore, StoreResult};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A distinct token pair for scripting provider responses.
///
/// `pair("x")` yields access token `at-x` and refresh token `rt-x`, so
/// assertions can tell pairs apart at a glance.
pub fn pair(tag: &str) -> TokenPair {
    TokenPair {
        access_token: format!("at-{}", tag),
        access_expires_at: None,
        refresh_token: format!("rt-{}", tag),
        refresh_expires_at: None,
    }
}

/// Identity provider that replays queued outcomes.
///
/// Outcomes are queued per operation and popped in order; an unscripted call
/// fails loudly so a test that forgot to queue one shows up immediately.
/// Clones share state, which is how the test keeps a handle while the
/// manager owns the provider.
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    register_script: Arc<Mutex<VecDeque<AuthResult<()>>>>,
    confirm_script: Arc<Mutex<VecDeque<AuthResult<()>>>>,
    login_script: Arc<Mutex<VecDeque<AuthResult<TokenPair>>>>,
    refresh_script: Arc<Mutex<VecDeque<AuthResult<TokenPair>>>>,
    refresh_delay: Arc<Mutex<Option<Duration>>>,
    register_calls: Arc<AtomicUsize>,
    confirm_calls: Arc<AtomicUsize>,
    login_calls: Arc<AtomicUsize>,
    refresh_calls: Arc<AtomicUsize>,
}

impl ScriptedProvider {
    pub fn script_register(&self, outcome: AuthResult<()>) {
        self.register_script.lock().unwrap().push_back(outcome);
    }

    pub fn script_confirm(&self, outcome: AuthResult<()>) {
        self.confirm_script.lock().unwrap().push_back(outcome);
    }

    pub fn script_login(&self, outcome: AuthResult<TokenPair>) {
        self.login_script.lock().unwrap().push_back(outcome);
    }

    pub fn script_refresh(&self, outcome: AuthResult<TokenPair>) {
        self.refresh_script.lock().unwrap().push_back(outcome);
    }

    /// Make every refresh call sleep before resolving, giving concurrent
    /// callers time to pile up on it.
    pub fn delay_refreshes(&self, delay: Duration) {
        *self.refresh_delay.lock().unwrap() = Some(delay);
    }

    pub fn register_count(&self) -> usize {
        self.register_calls.load(Ordering::SeqCst)
    }

    pub fn confirm_count(&self) -> usize {
        self.confirm_calls.load(Ordering::SeqCst)
    }

    pub fn login_count(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_count(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    fn pop<T>(&self, script: &Mutex<VecDeque<AuthResult<T>>>, operation: &str) -> AuthResult<T> {
        script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AuthError::Transport(format!("unscripted {} call", operation))))
    }
}

#[async_trait]
impl IdentityProvider for ScriptedProvider {
    async fn register(&self, _email: &str, _name: &str, _password: &str) -> AuthResult<()> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        self.pop(&self.register_script, "register")
    }

    async fn confirm_email(&self, _email: &str, _code: &str) -> AuthResult<()> {
        self.confirm_calls.fetch_add(1, Ordering::SeqCst);
        self.pop(&self.confirm_script, "confirm_email")
    }

    async fn login(&self, _email: &str, _password: &str) -> AuthResult<TokenPair> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        self.pop(&self.login_script, "login")
    }

    async fn refresh(&self, _refresh_token: &str) -> AuthResult<TokenPair> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.refresh_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.pop(&self.refresh_script, "refresh")
    }
}

/// In-memory store the test can keep a handle to while the vault owns a
/// clone of it.
#[derive(Clone, Default)]
pub struct SharedStore {
    inner: Arc<MemoryStore>,
}

impl SharedStore {
    /// Put a value in place before the manager boots.
    pub fn seed(&self, key: &str, value: &str) {
        self.inner.set(key, value).unwrap();
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.inner.get(key).unwrap()
    }

    pub fn is_empty(&self) -> bool {
        credential_store::StoreKeys::ALL
            .iter()
            .all(|key| self.value(key).is_none())
    }
}

impl CredentialStore for SharedStore {
    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.inner.set(key, value)
    }

    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.inner.get(key)
    }

    fn delete(&self, key: &str) -> StoreResult<bool> {
        self.inner.delete(key)
    }

    fn delete_all(&self) -> StoreResult<()> {
        self.inner.delete_all()
    }
}

/// Records session events as the manager emits them.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<SessionEvent>>>,
}

impl EventLog {
    fn record(&self, event: SessionEvent) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn contains(&self, event: &SessionEvent) -> bool {
        self.events.lock().unwrap().contains(event)
    }

    pub fn count_of(&self, event: &SessionEvent) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| *e == event)
            .count()
    }
}

/// Everything a session test needs: the manager under test plus handles to
/// the scripted provider, the backing store and the emitted events.
pub struct TestSession {
    pub manager: SessionManager<ScriptedProvider>,
    pub provider: ScriptedProvider,
    pub store: SharedStore,
    pub events: EventLog,
}

impl TestSession {
    pub fn new() -> Self {
        let provider = ScriptedProvider::default();
        let store = SharedStore::default();
        let vault = CredentialVault::new(Box::new(store.clone()));
        let manager = SessionManager::new(provider.clone(), vault);

        let events = EventLog::default();
        let log = events.clone();
        manager.set_event_callback(Box::new(move |event| log.record(event)));

        Self {
            manager,
            provider,
            store,
            events,
        }
    }

    /// A session already holding `pair(tag)`, as if a login just happened.
    pub async fn logged_in(tag: &str) -> Self {
        let session = Self::new();
        session.provider.script_login(Ok(pair(tag)));
        session
            .manager
            .login("user@example.com", "hunter2")
            .await
            .unwrap();
        session
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_provider_replays_outcomes_in_order() {
        let provider = ScriptedProvider::default();
        provider.script_login(Ok(pair("one")));
        provider.script_login(Err(AuthError::InvalidCredentials));

        let first = provider.login("a@x.com", "pw").await.unwrap();
        assert_eq!(first.access_token, "at-one");

        let second = provider.login("a@x.com", "pw").await;
        assert!(matches!(second, Err(AuthError::InvalidCredentials)));
        assert_eq!(provider.login_count(), 2);
    }

    #[tokio::test]
    async fn test_unscripted_call_fails_loudly() {
        let provider = ScriptedProvider::default();
        let outcome = provider.refresh("rt-1").await;
        assert!(matches!(outcome, Err(AuthError::Transport(_))));
    }

    #[tokio::test]
    async fn test_logged_in_session_starts_authenticated() {
        let session = TestSession::logged_in("seed").await;
        assert!(session.manager.session_state().is_authenticated());
        assert_eq!(
            session
                .store
                .value(credential_store::StoreKeys::ACCESS_TOKEN)
                .as_deref(),
            Some("at-seed")
        );
    }
}
