//! Process-wide auth session.
//!
//! The session is the only client state besides the query cache that
//! outlives a page. It is held in a [`SessionStore`] and changed only through
//! its transition methods, which enforce the state machine:
//!
//! ```text
//! unauthenticated ──> authenticating ──> authenticated
//!        ^                  │                 │
//!        └──────────────────┴─────────────────┘
//! ```

pub mod otp;
pub mod provider;
pub mod tokens;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use lines_common::{TokenPair, UserProfile};
use tokio::sync::watch;
use tracing::info;

use crate::errors::SessionError;

pub use otp::OtpCountdown;
pub use provider::AuthProvider;
pub use tokens::{FileTokenStore, MemoryTokenStore, TokenStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionStatus {
    #[default]
    Unauthenticated,
    Authenticating,
    Authenticated,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Authenticating => "authenticating",
            Self::Authenticated => "authenticated",
        }
    }

    /// Whether `self -> next` is an edge of the session state machine.
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (Self::Unauthenticated, Self::Authenticating)
                | (Self::Authenticating, Self::Authenticated)
                | (Self::Authenticating, Self::Unauthenticated)
                | (Self::Authenticated, Self::Unauthenticated)
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the current session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub user: Option<UserProfile>,
    pub tokens: Option<TokenPair>,
    pub status: SessionStatus,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }
}

struct SessionInner {
    session: Mutex<Session>,
    status_tx: watch::Sender<SessionStatus>,
}

/// Shared handle to the process-wide session. Cloning shares the session.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionInner>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        let (status_tx, _rx) = watch::channel(SessionStatus::Unauthenticated);
        Self {
            inner: Arc::new(SessionInner {
                session: Mutex::new(Session::default()),
                status_tx,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        // A panic while holding the lock cannot leave a half-written session:
        // every writer replaces whole fields.
        self.inner
            .session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> Session {
        self.lock().clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.lock().status
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.lock().user.clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.lock().tokens.as_ref().map(|t| t.access_token.clone())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.lock().tokens.as_ref().map(|t| t.refresh_token.clone())
    }

    /// Receive every status change.
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.inner.status_tx.subscribe()
    }

    fn transition(
        &self,
        session: &mut Session,
        next: SessionStatus,
    ) -> Result<(), SessionError> {
        if !session.status.can_transition_to(next) {
            return Err(SessionError::InvalidTransition {
                from: session.status.to_string(),
                to: next.to_string(),
            });
        }
        info!(from = %session.status, to = %next, "Session transition");
        session.status = next;
        self.inner.status_tx.send_replace(next);
        Ok(())
    }

    /// `unauthenticated -> authenticating`. Tokens, when given, are attached
    /// so the verifying request carries them.
    pub fn begin_authenticating(&self, tokens: Option<TokenPair>) -> Result<(), SessionError> {
        let mut session = self.lock();
        self.transition(&mut session, SessionStatus::Authenticating)?;
        session.tokens = tokens;
        session.user = None;
        Ok(())
    }

    /// `authenticating -> authenticated`.
    pub fn complete_authentication(
        &self,
        user: UserProfile,
        tokens: TokenPair,
    ) -> Result<(), SessionError> {
        let mut session = self.lock();
        self.transition(&mut session, SessionStatus::Authenticated)?;
        session.user = Some(user);
        session.tokens = Some(tokens);
        Ok(())
    }

    /// Drop back to `unauthenticated` from any state, clearing user and
    /// tokens. A no-op when already signed out.
    pub fn sign_out(&self) {
        let mut session = self.lock();
        if session.status != SessionStatus::Unauthenticated {
            // Every non-unauthenticated state has an edge back.
            let _ = self.transition(&mut session, SessionStatus::Unauthenticated);
        }
        session.user = None;
        session.tokens = None;
    }

    /// Swap in rotated tokens without changing status. Ignored when signed
    /// out, so a refresh racing a logout cannot resurrect the session.
    pub fn rotate_tokens(&self, tokens: TokenPair) -> bool {
        let mut session = self.lock();
        if session.status == SessionStatus::Unauthenticated {
            return false;
        }
        session.tokens = Some(tokens);
        true
    }

    /// Replace the signed-in user's profile (after a profile update).
    pub fn update_user(&self, user: UserProfile) -> bool {
        let mut session = self.lock();
        if session.status != SessionStatus::Authenticated {
            return false;
        }
        session.user = Some(user);
        true
    }
}
