//! Wiring for one client instance: configuration, session, HTTP client,
//! query cache and the page context, built once at startup.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::http::HttpClient;
use crate::pages::PageContext;
use crate::query::QueryCache;
use crate::session::{AuthProvider, FileTokenStore, SessionStatus, SessionStore, TokenStore};
use crate::url_state::History;

pub struct LinesApp {
    config: Arc<ClientConfig>,
    http: HttpClient,
    cache: QueryCache,
    auth: Arc<AuthProvider>,
    history: Arc<dyn History>,
    sign_out_watch: JoinHandle<()>,
}

impl LinesApp {
    /// Load `lines.toml` and the environment for `dir`, then [`init`](Self::init).
    pub fn from_dir(dir: &Path, history: Arc<dyn History>) -> Result<Self> {
        let config = ClientConfig::load(dir)
            .with_context(|| format!("Failed to load configuration from {}", dir.display()))?;
        Self::init(config, history)
    }

    /// Build a client that persists tokens at the configured token path.
    /// Must be called inside a Tokio runtime.
    pub fn init(config: ClientConfig, history: Arc<dyn History>) -> Result<Self> {
        let tokens: Arc<dyn TokenStore> = Arc::new(FileTokenStore::new(config.token_path()));
        Self::with_token_store(config, history, tokens)
    }

    pub fn with_token_store(
        config: ClientConfig,
        history: Arc<dyn History>,
        tokens: Arc<dyn TokenStore>,
    ) -> Result<Self> {
        let session = SessionStore::new();
        let http = HttpClient::new(&config, session.clone(), tokens)
            .with_context(|| format!("Failed to build HTTP client for {}", config.api.base_url))?;
        let cache = QueryCache::new(Duration::from_secs(config.cache.default_stale_secs));
        let auth = Arc::new(AuthProvider::new(
            http.clone(),
            cache.clone(),
            Duration::from_secs(config.auth.otp_validity_secs),
        ));
        let sign_out_watch = spawn_sign_out_watch(&session, cache.clone());

        info!(base_url = %http.base_url(), "Lines client ready");
        Ok(Self {
            config: Arc::new(config),
            http,
            cache,
            auth,
            history,
            sign_out_watch,
        })
    }

    /// Restore a persisted session, if any.
    pub async fn start(&self) -> SessionStatus {
        self.auth.bootstrap().await
    }

    /// End the session locally: session, persisted tokens and cached data.
    pub async fn teardown(&self) {
        self.auth.sign_out_locally().await;
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn auth(&self) -> &Arc<AuthProvider> {
        &self.auth
    }

    pub fn session(&self) -> &SessionStore {
        self.auth.session()
    }

    pub fn pages(&self) -> PageContext {
        PageContext {
            http: self.http.clone(),
            cache: self.cache.clone(),
            config: self.config.clone(),
            history: self.history.clone(),
        }
    }
}

impl Drop for LinesApp {
    fn drop(&mut self) {
        self.sign_out_watch.abort();
    }
}

/// Cached data belongs to whoever was signed in. Leaving `Authenticated`,
/// including an expired refresh inside the HTTP client, empties the cache.
/// A failed login attempt keeps it.
fn spawn_sign_out_watch(session: &SessionStore, cache: QueryCache) -> JoinHandle<()> {
    let mut status = session.subscribe();
    tokio::spawn(async move {
        let mut previous = *status.borrow_and_update();
        while status.changed().await.is_ok() {
            let current = *status.borrow_and_update();
            if previous == SessionStatus::Authenticated && current != SessionStatus::Authenticated {
                debug!(%current, "Session ended, clearing query cache");
                cache.clear();
            }
            previous = current;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryKey;
    use crate::session::MemoryTokenStore;
    use crate::url_state::MemoryHistory;
    use lines_common::{TokenPair, UserProfile};

    fn app() -> LinesApp {
        let config = ClientConfig::default().with_base_url("http://127.0.0.1:9/api");
        LinesApp::with_token_store(
            config,
            Arc::new(MemoryHistory::new()),
            Arc::new(MemoryTokenStore::new()),
        )
        .unwrap()
    }

    fn user() -> UserProfile {
        serde_json::from_value(serde_json::json!({
            "id": 7, "fullName": "Ada Reader", "email": "ada@example.com"
        }))
        .unwrap()
    }

    fn pair() -> TokenPair {
        TokenPair {
            access_token: "a".into(),
            refresh_token: "r".into(),
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn test_failed_login_keeps_public_cache() {
        let app = app();
        app.cache().set_data(&QueryKey::new("articles"), 3u32);

        app.session().begin_authenticating(None).unwrap();
        app.session().sign_out();
        settle().await;

        assert_eq!(app.cache().get_data::<u32>(&QueryKey::new("articles")).as_deref(), Some(&3));
    }

    #[tokio::test]
    async fn test_leaving_authenticated_clears_cache() {
        let app = app();
        app.session().begin_authenticating(None).unwrap();
        app.session().complete_authentication(user(), pair()).unwrap();
        settle().await;
        app.cache().set_data(&QueryKey::new("user-dashboard"), 1u32);

        app.session().sign_out();
        settle().await;

        assert!(app.cache().is_empty());
    }
}
