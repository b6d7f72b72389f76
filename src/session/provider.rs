use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use lines_common::{AuthPayload, OtpChallenge, TokenPair, UserProfile, UserRole};
use tracing::{info, warn};

use super::otp::OtpCountdown;
use super::tokens::TokenStore;
use super::{SessionStatus, SessionStore};
use crate::errors::{ApiError, SessionError};
use crate::http::HttpClient;
use crate::query::QueryCache;
use crate::services::auth::RegistrationRequest;
use crate::services::users::ProfileUpdate;
use crate::services::{AuthService, UsersService};

/// Resources whose cached data belongs to the signed-in user.
const USER_RESOURCES: &[&str] = &["user-dashboard"];

/// Login, registration and logout on top of the shared [`SessionStore`].
///
/// Every path that ends a session goes through [`sign_out_locally`], which
/// clears the session, the persisted tokens and the query cache together.
///
/// [`sign_out_locally`]: AuthProvider::sign_out_locally
pub struct AuthProvider {
    auth: AuthService,
    users: UsersService,
    session: SessionStore,
    tokens: Arc<dyn TokenStore>,
    cache: QueryCache,
    otp_validity: Duration,
    countdown: Mutex<Option<OtpCountdown>>,
}

impl AuthProvider {
    pub fn new(http: HttpClient, cache: QueryCache, otp_validity: Duration) -> Self {
        Self {
            session: http.session().clone(),
            tokens: http.token_store().clone(),
            auth: AuthService::new(http.clone()),
            users: UsersService::new(http),
            cache,
            otp_validity,
            countdown: Mutex::new(None),
        }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    fn countdown_slot(&self) -> MutexGuard<'_, Option<OtpCountdown>> {
        self.countdown
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Restore the previous session from persisted tokens, verifying them
    /// against `/auth/me`. Never fails; returns the resulting status.
    pub async fn bootstrap(&self) -> SessionStatus {
        let stored = match self.tokens.load().await {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable token store");
                self.clear_tokens().await;
                None
            }
        };
        let Some(tokens) = stored else {
            return self.session.status();
        };

        if let Err(e) = self.session.begin_authenticating(Some(tokens.clone())) {
            warn!(error = %e, "Session already active, skipping restore");
            return self.session.status();
        }

        match self.auth.me().await {
            Ok(user) => {
                // A refresh during the check may have rotated the pair.
                let current = self.session.snapshot().tokens.unwrap_or(tokens);
                if let Err(e) = self.session.complete_authentication(user, current) {
                    warn!(error = %e, "Session changed while restoring");
                }
            }
            Err(e) => {
                info!(error = %e, "Stored session is no longer valid");
                self.sign_out_locally().await;
            }
        }
        self.session.status()
    }

    /// Sign in with email and password. A rejected login leaves the session
    /// signed out and returns the server's message unchanged.
    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile, SessionError> {
        self.session.begin_authenticating(None)?;
        let result = self.auth.login(email, password).await;
        self.finish_authentication(result).await
    }

    /// Step one of sign-up: email a verification code and start the
    /// countdown.
    pub async fn request_otp(&self, request: &RegistrationRequest) -> Result<OtpChallenge, ApiError> {
        let challenge = self.auth.request_otp(request).await?;
        self.start_countdown(&challenge);
        Ok(challenge)
    }

    /// Step two: verify the code. Account creation and sign-in happen in
    /// the same call.
    pub async fn verify_otp_and_register(
        &self,
        email: &str,
        otp: &str,
        role: UserRole,
    ) -> Result<UserProfile, SessionError> {
        self.session.begin_authenticating(None)?;
        let result = self.auth.verify_otp_and_register(email, otp, role).await;
        let user = self.finish_authentication(result).await?;
        *self.countdown_slot() = None;
        Ok(user)
    }

    /// Send a new code and restart the validity window.
    pub async fn resend_otp(&self, email: &str) -> Result<OtpChallenge, ApiError> {
        let challenge = self.auth.resend_otp(email).await?;
        self.start_countdown(&challenge);
        Ok(challenge)
    }

    pub fn otp_countdown(&self) -> Option<OtpCountdown> {
        self.countdown_slot().clone()
    }

    fn start_countdown(&self, challenge: &OtpChallenge) {
        let validity = if challenge.expires_in_secs > 0 {
            Duration::from_secs(challenge.expires_in_secs)
        } else {
            self.otp_validity
        };
        let mut slot = self.countdown_slot();
        if let Some(countdown) = slot.as_mut().filter(|c| c.email() == challenge.email) {
            countdown.restart(validity);
            return;
        }
        *slot = Some(OtpCountdown::start(challenge.email.clone(), validity));
    }

    async fn finish_authentication(
        &self,
        result: Result<AuthPayload, ApiError>,
    ) -> Result<UserProfile, SessionError> {
        let payload = match result {
            Ok(payload) => payload,
            Err(e) => {
                self.session.sign_out();
                return Err(e.into());
            }
        };
        self.session
            .complete_authentication(payload.user.clone(), payload.tokens.clone())?;
        self.persist(&payload.tokens).await;
        // A sign-out may have landed while the tokens were being written.
        if self.session.status() != SessionStatus::Authenticated {
            self.clear_tokens().await;
            return Err(SessionError::InvalidTransition {
                from: self.session.status().to_string(),
                to: SessionStatus::Authenticated.to_string(),
            });
        }
        Ok(payload.user)
    }

    async fn persist(&self, tokens: &TokenPair) {
        if let Err(e) = self.tokens.save(tokens).await {
            warn!(error = %e, "Failed to persist tokens; session will not survive a restart");
        }
    }

    async fn clear_tokens(&self) {
        if let Err(e) = self.tokens.clear().await {
            warn!(error = %e, "Failed to clear persisted tokens");
        }
    }

    /// Best-effort server logout, then clear all local state. Never fails.
    pub async fn logout(&self) {
        if let Some(refresh_token) = self.session.refresh_token()
            && let Err(e) = self.auth.logout(Some(&refresh_token)).await
        {
            warn!(error = %e, "Server logout failed, clearing local session anyway");
        }
        self.sign_out_locally().await;
    }

    /// Revoke every session of this user. Local state is cleared even when
    /// the server call fails.
    pub async fn logout_all(&self) {
        if self.session.status() == SessionStatus::Authenticated
            && let Err(e) = self.auth.logout_all().await
        {
            warn!(error = %e, "Server logout-all failed, clearing local session anyway");
        }
        self.sign_out_locally().await;
    }

    /// Drop the session, persisted tokens, cached queries and any pending
    /// OTP countdown.
    pub async fn sign_out_locally(&self) {
        self.session.sign_out();
        self.clear_tokens().await;
        self.cache.clear();
        *self.countdown_slot() = None;
    }

    pub async fn change_password(&self, current: &str, new: &str) -> Result<Option<String>, ApiError> {
        self.auth.change_password(current, new).await
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<OtpChallenge, ApiError> {
        let challenge = self.auth.request_password_reset(email).await?;
        self.start_countdown(&challenge);
        Ok(challenge)
    }

    pub async fn verify_password_reset_otp(&self, email: &str, otp: &str) -> Result<Option<String>, ApiError> {
        self.auth.verify_password_reset_otp(email, otp).await
    }

    pub async fn reset_password(&self, email: &str, new_password: &str) -> Result<Option<String>, ApiError> {
        let message = self.auth.reset_password(email, new_password).await?;
        *self.countdown_slot() = None;
        Ok(message)
    }

    /// Save profile changes and merge the server's copy into the session.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile, ApiError> {
        let profile = self.users.update_profile(update).await?;
        self.session.update_user(profile.clone());
        self.cache.invalidate(USER_RESOURCES);
        Ok(profile)
    }

    /// Re-read the signed-in user from `/auth/me`.
    pub async fn refresh_user(&self) -> Result<UserProfile, ApiError> {
        let user = self.auth.me().await?;
        self.session.update_user(user.clone());
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::config::ClientConfig;
    use crate::session::MemoryTokenStore;

    /// Signs the session out while tokens are being written.
    struct SignOutOnSave {
        session: SessionStore,
        inner: MemoryTokenStore,
    }

    #[async_trait]
    impl TokenStore for SignOutOnSave {
        async fn load(&self) -> Result<Option<TokenPair>, SessionError> {
            self.inner.load().await
        }

        async fn save(&self, tokens: &TokenPair) -> Result<(), SessionError> {
            self.inner.save(tokens).await?;
            self.session.sign_out();
            Ok(())
        }

        async fn clear(&self) -> Result<(), SessionError> {
            self.inner.clear().await
        }
    }

    fn payload() -> AuthPayload {
        serde_json::from_value(serde_json::json!({
            "user": { "id": 7, "fullName": "Ada Reader", "email": "ada@example.com" },
            "accessToken": "access-1",
            "refreshToken": "refresh-1"
        }))
        .unwrap()
    }

    fn provider(tokens: Arc<dyn TokenStore>, session: SessionStore) -> AuthProvider {
        let http = HttpClient::new(&ClientConfig::default(), session, tokens).unwrap();
        AuthProvider::new(http, QueryCache::new(Duration::from_secs(60)), Duration::from_secs(600))
    }

    #[tokio::test]
    async fn test_sign_out_during_persist_leaves_no_tokens() {
        let session = SessionStore::new();
        let store = Arc::new(SignOutOnSave {
            session: session.clone(),
            inner: MemoryTokenStore::new(),
        });
        let auth = provider(store.clone(), session.clone());

        session.begin_authenticating(None).unwrap();
        let result = auth.finish_authentication(Ok(payload())).await;

        assert!(matches!(result, Err(SessionError::InvalidTransition { .. })));
        assert_eq!(session.status(), SessionStatus::Unauthenticated);
        assert!(store.inner.current().is_none());
    }

    #[tokio::test]
    async fn test_finish_without_pending_login_persists_nothing() {
        let session = SessionStore::new();
        let store = Arc::new(MemoryTokenStore::new());
        let auth = provider(store.clone(), session.clone());

        assert!(auth.finish_authentication(Ok(payload())).await.is_err());
        assert!(store.current().is_none());
    }
}
