//! Session lifecycle orchestration.
//!
//! `SessionManager` owns the token pair, decides when to refresh it, and
//! guarantees that however many requests hit a 401 at once, the provider
//! sees at most one refresh call. Requests that lose the race suspend on the
//! in-flight refresh and retry once with whatever it produced.

use crate::client::{IdentityProvider, TokenPair};
use crate::error::{AuthError, AuthResult};
use crate::flow::{FlowInput, FlowState, SignupFlow};
use credential_store::CredentialVault;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::{oneshot, watch};

/// Externally visible session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No usable session.
    Unauthenticated,
    /// A token pair is loaded; validity is discovered on use.
    Authenticated,
    /// A refresh is in flight.
    Refreshing,
}

impl SessionState {
    /// Returns true if requests can currently be issued.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated)
    }
}

/// Session lifecycle notifications for the embedding layer.
///
/// The core reports; whoever embeds it decides what a user sees next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A login produced a fresh session.
    SignedIn,
    /// A refresh replaced the token pair.
    TokenRefreshed,
    /// An explicit logout cleared the session.
    SignedOut,
    /// A failed refresh forced the session closed.
    SessionExpired,
    /// The signup flow reached a new state.
    FlowAdvanced(FlowState),
}

/// Callback type for session event notifications.
pub type SessionEventCallback = Box<dyn Fn(SessionEvent) + Send + Sync>;

/// How a caller-built request reports back to
/// [`SessionManager::authenticated_request`].
///
/// The core stays transport-agnostic: the builder decides what counts as its
/// backend's 401.
#[derive(Debug)]
pub enum RequestOutcome<T> {
    /// The request went through.
    Completed(T),
    /// The backend rejected the access token.
    Unauthorized,
}

/// Broadcast payload for a refresh in flight; `None` until settled.
type RefreshOutcome = Option<AuthResult<TokenPair>>;

enum RefreshSlot {
    Idle,
    InFlight(watch::Receiver<RefreshOutcome>),
}

/// Session state guarded by a single mutex.
///
/// `generation` ticks whenever the session is torn down; a refresh that
/// settles against an older generation is discarded instead of resurrecting
/// a session the user already left.
struct Shared {
    tokens: Option<TokenPair>,
    slot: RefreshSlot,
    generation: u64,
}

struct SessionInner<P> {
    provider: P,
    vault: CredentialVault,
    shared: Mutex<Shared>,
    flow: Mutex<SignupFlow>,
    event_callback: Mutex<Option<SessionEventCallback>>,
}

/// Orchestrates the token lifecycle over an [`IdentityProvider`] and a
/// [`CredentialVault`].
///
/// Cheap to clone; clones share one session.
pub struct SessionManager<P> {
    inner: Arc<SessionInner<P>>,
}

impl<P> Clone for SessionManager<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Reject obviously unusable credentials before any network call.
fn validate_credentials(email: &str, password: &str) -> AuthResult<()> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(AuthError::InvalidCredentials);
    }
    Ok(())
}

/// Reject an unusable confirmation request before any network call.
fn validate_confirmation(email: &str, code: &str) -> AuthResult<()> {
    if email.trim().is_empty() || code.trim().is_empty() {
        return Err(AuthError::InvalidCredentials);
    }
    Ok(())
}

impl<P: IdentityProvider + 'static> SessionManager<P> {
    /// Create a session manager over the given provider and vault.
    pub fn new(provider: P, vault: CredentialVault) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                provider,
                vault,
                shared: Mutex::new(Shared {
                    tokens: None,
                    slot: RefreshSlot::Idle,
                    generation: 0,
                }),
                flow: Mutex::new(SignupFlow::new()),
                event_callback: Mutex::new(None),
            }),
        }
    }

    /// Set a callback to be notified of session events.
    pub fn set_event_callback(&self, callback: SessionEventCallback) {
        let mut cb = self.inner.event_callback.lock().unwrap();
        *cb = Some(callback);
    }

    /// Probe the credential store and derive the starting session state.
    ///
    /// Never talks to the provider: a stale stored token is discovered on
    /// first use, not at startup.
    pub fn bootstrap(&self) -> AuthResult<SessionState> {
        let access_token = match self.inner.vault.access_token()? {
            Some(token) => token,
            None => {
                tracing::info!("No stored session");
                return Ok(SessionState::Unauthenticated);
            }
        };
        let refresh_token = self.inner.vault.refresh_token()?.unwrap_or_default();

        let mut shared = self.inner.shared.lock().unwrap();
        shared.tokens = Some(TokenPair {
            access_token,
            access_expires_at: None,
            refresh_token,
            refresh_expires_at: None,
        });
        shared.generation += 1;
        drop(shared);

        tracing::info!("Resumed stored session");
        Ok(SessionState::Authenticated)
    }

    /// Current session state.
    pub fn session_state(&self) -> SessionState {
        let shared = self.inner.shared.lock().unwrap();
        match (&shared.slot, &shared.tokens) {
            (RefreshSlot::InFlight(_), _) => SessionState::Refreshing,
            (RefreshSlot::Idle, Some(_)) => SessionState::Authenticated,
            (RefreshSlot::Idle, None) => SessionState::Unauthenticated,
        }
    }

    /// Current signup flow state.
    pub fn flow_state(&self) -> FlowState {
        self.inner.flow.lock().unwrap().state()
    }

    /// Register a new account and begin a fresh signup attempt.
    ///
    /// On success the provider emails a confirmation code and the
    /// email/password pair is parked in the vault until the confirmation
    /// step claims it.
    pub async fn register(&self, email: &str, name: &str, password: &str) -> AuthResult<()> {
        validate_credentials(email, password)?;
        self.inner.reset_flow();

        match self.inner.provider.register(email, name, password).await {
            Ok(()) => {
                self.inner.vault.store_credentials(email, password)?;
                self.inner.advance_flow(&FlowInput::RegisterSucceeded);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(email = %email, error = %e, "Registration failed");
                self.inner.fail_flow_at(FlowState::Start, &e.to_string());
                Err(e)
            }
        }
    }

    /// Confirm the account email with the emailed code.
    pub async fn confirm_email(&self, email: &str, code: &str) -> AuthResult<()> {
        validate_confirmation(email, code)?;

        match self.inner.provider.confirm_email(email, code).await {
            Ok(()) => {
                // The parked registration credentials have served their purpose
                self.inner.vault.clear_credentials()?;
                self.inner.advance_flow(&FlowInput::ConfirmSucceeded);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(email = %email, error = %e, "Email confirmation failed");
                self.inner.fail_flow_at(FlowState::Registered, &e.to_string());
                Err(e)
            }
        }
    }

    /// Sign in. On success both tokens are written to the vault and the
    /// in-memory session becomes authenticated; on failure nothing changes.
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<()> {
        validate_credentials(email, password)?;

        match self.inner.provider.login(email, password).await {
            Ok(pair) => {
                self.inner.adopt_pair(&pair)?;
                self.inner.advance_flow(&FlowInput::LoginSucceeded);
                self.inner.emit(SessionEvent::SignedIn);
                tracing::info!(email = %email, "Session established");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(email = %email, error = %e, "Login failed");
                self.inner.fail_flow_at(FlowState::EmailConfirmed, &e.to_string());
                Err(e)
            }
        }
    }

    /// Clear the session everywhere. Safe to call repeatedly.
    pub fn logout(&self) {
        let had_session = {
            let mut shared = self.inner.shared.lock().unwrap();
            shared.generation += 1;
            shared.tokens.take().is_some()
        };

        if let Err(e) = self.inner.vault.clear_all() {
            tracing::warn!(error = %e, "Credential store clear failed during logout");
        }
        self.inner.reset_flow();

        if had_session {
            self.inner.emit(SessionEvent::SignedOut);
        }
        tracing::info!("Logged out");
    }

    /// Force a token refresh now, joining one already in flight.
    pub async fn refresh(&self) -> AuthResult<TokenPair> {
        self.refreshed_pair().await
    }

    /// Execute a request with the current access token, refreshing and
    /// retrying exactly once if the backend rejects it.
    ///
    /// The builder receives the access token to use and reports whether the
    /// backend accepted it via [`RequestOutcome`]. Builder errors propagate
    /// untouched with no retry. A rejection on the retried request surfaces
    /// as [`AuthError::Unauthorized`] rather than looping.
    pub async fn authenticated_request<T, F, Fut>(&self, request: F) -> AuthResult<T>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = AuthResult<RequestOutcome<T>>>,
    {
        let token = match self.inner.access_token() {
            Some(token) => token,
            None => return Err(AuthError::MissingToken),
        };

        match request(token).await? {
            RequestOutcome::Completed(value) => return Ok(value),
            RequestOutcome::Unauthorized => {
                tracing::debug!("Access token rejected, refreshing");
            }
        }

        let pair = self.refreshed_pair().await?;

        match request(pair.access_token).await? {
            RequestOutcome::Completed(value) => Ok(value),
            RequestOutcome::Unauthorized => {
                tracing::warn!("Request still unauthorized after refresh");
                Err(AuthError::Unauthorized)
            }
        }
    }

    /// [`authenticated_request`](Self::authenticated_request) that the
    /// caller can abandon by firing the cancel channel.
    ///
    /// Cancellation resolves this call with [`AuthError::Cancelled`] and
    /// nothing else: a refresh this call started keeps running for the
    /// requests waiting on it. Dropping the sender without firing it never
    /// cancels.
    pub async fn authenticated_request_with_cancel<T, F, Fut>(
        &self,
        mut cancel: oneshot::Receiver<()>,
        request: F,
    ) -> AuthResult<T>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = AuthResult<RequestOutcome<T>>>,
    {
        let work = self.authenticated_request(request);
        tokio::pin!(work);

        // Biased so an already-fired cancellation wins even when the work
        // could complete on its first poll.
        tokio::select! {
            biased;
            signal = &mut cancel => match signal {
                Ok(()) => {
                    tracing::debug!("Authenticated request cancelled by caller");
                    Err(AuthError::Cancelled)
                }
                // Sender dropped without firing; keep working.
                Err(_) => work.await,
            },
            outcome = &mut work => outcome,
        }
    }

    /// Join the refresh in flight, or install one and become its starter.
    ///
    /// The actual refresh runs in a spawned task: a caller that gets
    /// cancelled while waiting must not take the shared refresh down with
    /// it.
    fn join_or_start_refresh(&self) -> watch::Receiver<RefreshOutcome> {
        let mut shared = self.inner.shared.lock().unwrap();
        if let RefreshSlot::InFlight(rx) = &shared.slot {
            tracing::debug!("Joining refresh already in flight");
            return rx.clone();
        }

        let (tx, rx) = watch::channel(None);
        shared.slot = RefreshSlot::InFlight(rx.clone());
        let generation = shared.generation;
        let refresh_token = shared
            .tokens
            .as_ref()
            .map(|p| p.refresh_token.clone())
            .filter(|t| !t.is_empty());
        drop(shared);

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner.run_refresh(tx, generation, refresh_token).await;
        });
        rx
    }

    /// Wait for a settled refresh outcome, starting the refresh if nobody
    /// else has.
    async fn refreshed_pair(&self) -> AuthResult<TokenPair> {
        let mut rx = self.join_or_start_refresh();
        loop {
            let settled = rx.borrow_and_update().clone();
            if let Some(outcome) = settled {
                return outcome;
            }
            if rx.changed().await.is_err() {
                return Err(AuthError::Transport(
                    "refresh task dropped before completing".to_string(),
                ));
            }
        }
    }
}

impl<P> SessionInner<P> {
    fn emit(&self, event: SessionEvent) {
        let cb = self.event_callback.lock().unwrap();
        if let Some(callback) = cb.as_ref() {
            callback(event);
        }
    }

    fn access_token(&self) -> Option<String> {
        let shared = self.shared.lock().unwrap();
        shared.tokens.as_ref().map(|p| p.access_token.clone())
    }

    /// Adopt a fresh pair: vault first, then memory, so a storage failure
    /// leaves the session untouched.
    ///
    /// Bumps the generation: the adopted pair supersedes any refresh still
    /// in flight, whose outcome would be built on the replaced tokens.
    fn adopt_pair(&self, pair: &TokenPair) -> AuthResult<()> {
        let mut shared = self.shared.lock().unwrap();
        self.vault
            .store_tokens(&pair.access_token, &pair.refresh_token)?;
        shared.tokens = Some(pair.clone());
        shared.generation += 1;
        Ok(())
    }

    fn reset_flow(&self) {
        *self.flow.lock().unwrap() = SignupFlow::new();
    }

    /// Apply a success input to the flow; illegal inputs are dropped.
    fn advance_flow(&self, input: &FlowInput) {
        let mut flow = self.flow.lock().unwrap();
        if flow.advance(input) {
            let state = flow.state();
            drop(flow);
            tracing::debug!(state = ?state, "Signup flow advanced");
            self.emit(SessionEvent::FlowAdvanced(state));
        }
    }

    /// Mark the attempt failed, but only when the failing operation is the
    /// step the attempt is waiting on. A stray failure, say a mistyped
    /// re-login long after signup, does not touch the flow.
    fn fail_flow_at(&self, step: FlowState, reason: &str) {
        let mut flow = self.flow.lock().unwrap();
        if flow.state() != step {
            return;
        }
        if flow.fail(reason) {
            let state = flow.state();
            drop(flow);
            self.emit(SessionEvent::FlowAdvanced(state));
        }
    }
}

impl<P: IdentityProvider + 'static> SessionInner<P> {
    async fn run_refresh(
        self: Arc<Self>,
        tx: watch::Sender<RefreshOutcome>,
        generation: u64,
        refresh_token: Option<String>,
    ) {
        let outcome = match refresh_token {
            Some(token) => self.provider.refresh(&token).await,
            // Nothing to refresh with; no provider call is made.
            None => Err(AuthError::MissingToken),
        };

        let outcome = self.settle_refresh(generation, outcome);

        // Publish before releasing the slot so a caller that joined this
        // round always finds a settled value.
        let _ = tx.send(Some(outcome));
        let mut shared = self.shared.lock().unwrap();
        shared.slot = RefreshSlot::Idle;
    }

    /// Fold the provider outcome into session state under the shared lock.
    fn settle_refresh(
        &self,
        generation: u64,
        outcome: AuthResult<TokenPair>,
    ) -> AuthResult<TokenPair> {
        let mut shared = self.shared.lock().unwrap();
        if shared.generation != generation {
            // The session was torn down while the refresh ran; its outcome
            // must not resurrect anything.
            tracing::debug!("Discarding refresh outcome from a closed session");
            return Err(AuthError::Cancelled);
        }

        let failure = match outcome {
            Ok(pair) => match self
                .vault
                .store_tokens(&pair.access_token, &pair.refresh_token)
            {
                Ok(()) => {
                    shared.tokens = Some(pair.clone());
                    drop(shared);
                    tracing::info!("Session tokens refreshed");
                    self.emit(SessionEvent::TokenRefreshed);
                    return Ok(pair);
                }
                Err(e) => AuthError::from(e),
            },
            Err(e) => e,
        };

        // Fail closed: an unrefreshable session never stays half-alive.
        let had_tokens = shared.tokens.take().is_some();
        shared.generation += 1;
        drop(shared);

        if let Err(e) = self.vault.clear_all() {
            tracing::warn!(error = %e, "Credential store clear failed after refresh failure");
        }
        self.reset_flow();
        tracing::warn!(error = %failure, "Refresh failed, session cleared");
        if had_tokens {
            self.emit(SessionEvent::SessionExpired);
        }
        Err(failure)
    }
}
