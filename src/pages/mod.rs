//! Page controllers: each owns one page's filter state (mirrored into the
//! URL) and the cached queries it renders from.

pub mod ai_ml;
pub mod articles;
pub mod favorites;
pub mod home;
pub mod notifications;
pub mod profile;
pub mod reading_history;
pub mod time_saver;

use std::sync::Arc;
use std::time::Duration;

use crate::config::ClientConfig;
use crate::errors::ApiError;
use crate::http::HttpClient;
use crate::query::{CacheEntry, QueryCache};
use crate::url_state::{FilterState, History};

pub use ai_ml::AiMlPage;
pub use articles::ArticlesPage;
pub use favorites::FavoritesPage;
pub use home::{HomePage, HomeSections, HomeView};
pub use notifications::NotificationsPage;
pub use profile::{ProfilePage, ProfileTab};
pub use reading_history::ReadingHistoryPage;
pub use time_saver::TimeSaverPage;

// ── Shared page context ───────────────────────────────────────────────

/// Handles every page controller needs.
#[derive(Clone)]
pub struct PageContext {
    pub http: HttpClient,
    pub cache: QueryCache,
    pub config: Arc<ClientConfig>,
    pub history: Arc<dyn History>,
}

impl PageContext {
    pub fn stale_time(&self, resource: &str) -> Duration {
        self.config.stale_time(resource)
    }
}

// ── Rendering snapshot ────────────────────────────────────────────────

/// What a page renders for one query.
#[derive(Debug, Clone)]
pub struct PageView<T> {
    pub data: Option<Arc<T>>,
    pub is_loading: bool,
    /// `data` belongs to the previous filter set; the current one is still
    /// loading.
    pub is_previous: bool,
    pub error: Option<ApiError>,
}

/// Keeps the last successful list visible while the next filter set loads.
pub(crate) struct KeepPrevious<T> {
    last: Option<Arc<T>>,
}

impl<T> Default for KeepPrevious<T> {
    fn default() -> Self {
        Self { last: None }
    }
}

impl<T> KeepPrevious<T> {
    pub(crate) fn view(&mut self, entry: CacheEntry<T>) -> PageView<T> {
        match entry.data {
            Some(data) => {
                self.last = Some(data.clone());
                PageView {
                    data: Some(data),
                    is_loading: false,
                    is_previous: false,
                    error: entry.error,
                }
            }
            None => PageView {
                data: self.last.clone(),
                is_previous: self.last.is_some(),
                is_loading: entry.is_loading(),
                error: entry.error,
            },
        }
    }
}

// ── Filter state to request filters ───────────────────────────────────

/// Non-empty string filter, or `None`.
pub(crate) fn opt_str(state: &FilterState, name: &str) -> Option<String> {
    let value = state.str(name);
    (!value.is_empty()).then(|| value.to_string())
}

pub(crate) fn opt_u32(state: &FilterState, name: &str) -> Option<u32> {
    state.int(name).and_then(|n| u32::try_from(n).ok()).filter(|n| *n > 0)
}
