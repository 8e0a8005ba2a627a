//! Session controller: the single source of truth for "who is signed in".
//!
//! ARCHITECTURE
//! ============
//! The controller owns the [`Session`] snapshot and is the only writer of
//! both the snapshot and the [`TokenStore`]. Dependencies (auth endpoints,
//! token storage, navigation) are injected; there is no global instance.
//! Readers either take a [`SessionController::snapshot`] or hold a `watch`
//! receiver from [`SessionController::subscribe`].
//!
//! State machine: `Bootstrapping -> Authenticated | Anonymous`, after which
//! sign-in/up, sign-out, refresh, and forced invalidation move between the
//! two settled phases for the lifetime of the controller.
//!
//! ORDERING
//! ========
//! Every transition takes a ticket from a monotonic sequence before it
//! awaits anything. When it completes, its effects (token write or clear,
//! snapshot update) are applied only if no newer transition has started, so
//! the most recent user intent decides the final state regardless of the
//! order responses arrive in. Sign-out and invalidation apply
//! unconditionally and also advance the sequence, which keeps a late sign-in
//! response from resurrecting a closed session.
//!
//! A rejected token is tied to the token, not the ticket: a profile fetch
//! remembers the token it was sent with, and if the backend refuses it the
//! store is cleared as long as it still holds that same token. A newer
//! transition that failed and stored nothing cannot keep a dead token alive.
//!
//! TRADE-OFFS
//! ==========
//! A transport failure (backend unreachable) never clears the token: it says
//! nothing about whether the backend still accepts it. Every other failure
//! of a profile fetch is treated as "the backend no longer accepts this
//! token" and goes through the same forced invalidation.
//!
//! Token store calls run while the sequence lock is held, so a store that
//! does blocking I/O (`FileTokenStore`) blocks the calling worker for the
//! length of one small write.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

use super::token::TokenStore;
use crate::net::auth::AuthApi;
use crate::net::error::{ApiError, ErrorKind};
use crate::net::types::{AuthResponse, Credentials, User};

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Client-side belief about authentication. `authenticated` is derived from
/// `user`, so the two can never disagree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    user: Option<User>,
    loading: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    Bootstrapping,
    Authenticated,
    Anonymous,
}

impl Session {
    fn bootstrapping() -> Self {
        Self { user: None, loading: true }
    }

    #[must_use]
    pub fn current_user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// `true` only while the initial bootstrap fetch is outstanding.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        match (&self.user, self.loading) {
            (Some(_), _) => SessionPhase::Authenticated,
            (None, true) => SessionPhase::Bootstrapping,
            (None, false) => SessionPhase::Anonymous,
        }
    }
}

// =============================================================================
// NAVIGATION
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    /// Entry point for anonymous users.
    SignIn,
    /// Authenticated area.
    Dashboard,
}

/// Receives the navigation side effects of session transitions.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

/// Navigator for contexts with nowhere to go.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn navigate(&self, _route: Route) {}
}

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A non-domain failure, reported without internal detail.
    #[error("{operation} failed")]
    Failed { operation: &'static str },

    /// A newer transition started before this one finished; its result was discarded.
    #[error("superseded by a newer session change")]
    Superseded,
}

impl SessionError {
    /// The underlying API error kind, if this came from the backend.
    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Api(e) => Some(e.kind()),
            Self::Failed { .. } | Self::Superseded => None,
        }
    }

    fn wrap(operation: &'static str, err: ApiError) -> Self {
        if err.kind() == ErrorKind::Unexpected {
            tracing::error!(operation, detail = err.detail(), "unexpected failure");
            return Self::Failed { operation };
        }
        Self::Api(err)
    }
}

// =============================================================================
// CONTROLLER
// =============================================================================

pub struct SessionController {
    api: Arc<dyn AuthApi>,
    tokens: Arc<dyn TokenStore>,
    navigator: Arc<dyn Navigator>,
    /// Ticket of the most recently started transition.
    latest: Mutex<u64>,
    bootstrapped: Mutex<bool>,
    state: watch::Sender<Session>,
}

impl SessionController {
    /// Create a controller in the `Bootstrapping` phase. Call
    /// [`SessionController::bootstrap`] (or use [`SessionController::start`]) to settle it.
    #[must_use]
    pub fn new(api: Arc<dyn AuthApi>, tokens: Arc<dyn TokenStore>, navigator: Arc<dyn Navigator>) -> Self {
        let (state, _) = watch::channel(Session::bootstrapping());
        Self { api, tokens, navigator, latest: Mutex::new(0), bootstrapped: Mutex::new(false), state }
    }

    /// Create a controller and run its bootstrap fetch.
    pub async fn start(api: Arc<dyn AuthApi>, tokens: Arc<dyn TokenStore>, navigator: Arc<dyn Navigator>) -> Self {
        let controller = Self::new(api, tokens, navigator);
        controller.bootstrap().await;
        controller
    }

    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// A token is stored but the settled session is anonymous. Only a
    /// transport failure leaves things this way: the backend could not be
    /// asked whether it still accepts the token.
    #[must_use]
    pub fn has_unverified_token(&self) -> bool {
        let session = self.snapshot();
        !session.is_loading() && !session.is_authenticated() && self.tokens.exists()
    }

    /// Derive the initial session from the stored token. Runs once; later
    /// calls return the current snapshot untouched.
    pub async fn bootstrap(&self) -> Session {
        {
            let mut done = self.bootstrapped.lock().unwrap_or_else(PoisonError::into_inner);
            if *done {
                return self.snapshot();
            }
            *done = true;
        }

        let Some(sent) = self.tokens.get() else {
            tracing::debug!("no stored token; starting anonymous");
            self.state.send_modify(|s| s.loading = false);
            return self.snapshot();
        };

        let ticket = self.begin();
        match self.api.fetch_current_user().await {
            Ok(user) => {
                tracing::info!(user_id = %user.id, "session restored");
                self.commit(ticket, |_| Some(user));
            }
            Err(err) if err.is_transport() => {
                tracing::warn!(error = %err, detail = err.detail(), "backend unreachable; token kept");
                self.commit(ticket, |_| None);
            }
            Err(err) => {
                tracing::info!(error = %err, "stored token rejected");
                self.reject_sent(&sent);
            }
        }

        self.state.send_modify(|s| s.loading = false);
        self.snapshot()
    }

    /// Register and sign in. On success the token is stored and the
    /// navigator is sent to the dashboard; on failure the session is untouched.
    ///
    /// # Errors
    ///
    /// Returns the API error for the caller to display, [`SessionError::Failed`]
    /// for non-domain failures, or [`SessionError::Superseded`].
    pub async fn sign_up(&self, credentials: &Credentials) -> Result<User, SessionError> {
        let ticket = self.begin();
        let result = self.api.sign_up(credentials).await;
        self.establish(ticket, "Sign up", result)
    }

    /// Exchange credentials for a session. Same outcomes as [`SessionController::sign_up`].
    ///
    /// # Errors
    ///
    /// See [`SessionController::sign_up`].
    pub async fn sign_in(&self, credentials: &Credentials) -> Result<User, SessionError> {
        let ticket = self.begin();
        let result = self.api.sign_in(credentials).await;
        self.establish(ticket, "Sign in", result)
    }

    /// Clear the token and become anonymous. Cannot fail and is idempotent.
    pub fn sign_out(&self) {
        self.force_anonymous();
        tracing::info!("signed out");
        self.navigator.navigate(Route::SignIn);
    }

    /// Re-fetch the current user. No-op without a stored token.
    ///
    /// # Errors
    ///
    /// A transport failure is returned with the session untouched. Any other
    /// failure forces invalidation (token cleared, navigate to sign-in) and
    /// is then returned. If the token was replaced while the fetch was in
    /// flight, the rejection no longer applies and
    /// [`SessionError::Superseded`] is returned.
    pub async fn refresh_user(&self) -> Result<(), SessionError> {
        let Some(sent) = self.tokens.get() else {
            return Ok(());
        };

        let ticket = self.begin();
        match self.api.fetch_current_user().await {
            Ok(user) => {
                if self.commit(ticket, |_| Some(user)) {
                    Ok(())
                } else {
                    Err(SessionError::Superseded)
                }
            }
            Err(err) if err.is_transport() => Err(SessionError::Api(err)),
            Err(err) => {
                if !self.reject_sent(&sent) {
                    return Err(SessionError::Superseded);
                }
                tracing::info!(error = %err, "session invalidated on refresh");
                self.navigator.navigate(Route::SignIn);
                Err(SessionError::wrap("Refresh", err))
            }
        }
    }

    /// Forced invalidation: called when any authenticated request reports
    /// that the backend rejected the token.
    pub fn invalidate(&self) {
        self.force_anonymous();
        tracing::info!("session invalidated");
        self.navigator.navigate(Route::SignIn);
    }

    // -------------------------------------------------------------------------
    // internals
    // -------------------------------------------------------------------------

    fn begin(&self) -> u64 {
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        *latest += 1;
        *latest
    }

    /// Apply `effect` to the token store and publish the resulting user, but
    /// only if `ticket` is still the latest transition. Returns whether it applied.
    fn commit<F>(&self, ticket: u64, effect: F) -> bool
    where
        F: FnOnce(&dyn TokenStore) -> Option<User>,
    {
        let latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        if *latest != ticket {
            tracing::debug!(ticket, latest = *latest, "discarding superseded transition");
            return false;
        }
        let user = effect(self.tokens.as_ref());
        self.state.send_modify(|s| s.user = user);
        true
    }

    /// Clear the token and demote to anonymous, superseding every in-flight
    /// transition.
    fn force_anonymous(&self) {
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        *latest += 1;
        self.demote();
    }

    /// The backend refused `sent`. Clear it and demote, unless the store has
    /// moved on to another token since. Returns whether it applied.
    fn reject_sent(&self, sent: &str) -> bool {
        let _latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        if self.tokens.get().as_deref() != Some(sent) {
            tracing::debug!("rejected token already replaced; keeping current session");
            return false;
        }
        self.demote();
        true
    }

    /// Shared forced-invalidation effect. Callers hold the sequence lock.
    fn demote(&self) {
        self.tokens.clear();
        self.state.send_modify(|s| s.user = None);
    }

    fn establish(
        &self,
        ticket: u64,
        operation: &'static str,
        result: Result<AuthResponse, ApiError>,
    ) -> Result<User, SessionError> {
        let AuthResponse { user, token } = result.map_err(|err| {
            tracing::info!(operation, error = %err, "authentication rejected");
            SessionError::wrap(operation, err)
        })?;

        let applied = self.commit(ticket, |tokens| {
            tokens.set(&token);
            Some(user.clone())
        });
        if !applied {
            return Err(SessionError::Superseded);
        }

        tracing::info!(operation, user_id = %user.id, "authenticated");
        self.navigator.navigate(Route::Dashboard);
        Ok(user)
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
