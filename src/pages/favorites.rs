use std::collections::BTreeSet;
use std::sync::Arc;

use lines_common::{ExportFormat, Favorite};

use super::{KeepPrevious, PageContext, PageView, opt_u32};
use crate::errors::ApiError;
use crate::query::{CacheEntry, QueryDescriptor, QueryKey};
use crate::services::UsersService;
use crate::services::users::{FavoritesFeed, ListFilters};
use crate::url_state::{FilterSchema, FilterState, UrlSync};

/// Resources whose cached data changes when a favorite is added or removed.
/// Article listings carry the flag too.
pub const FAVORITE_RESOURCES: &[&str] = &[
    "favorites",
    "favorites-stats",
    "articles",
    "trending-articles",
    "home-articles",
];

/// Category filter value that matches everything.
pub const ALL_CATEGORIES: &str = "all";

const UNCATEGORIZED: &str = "Uncategorized";

pub fn favorite_status_key(article_id: &str) -> QueryKey {
    QueryKey::new("favorite-status").with(article_id)
}

pub fn favorite_status_query(
    ctx: &PageContext,
    users: &UsersService,
    article_id: &str,
) -> QueryDescriptor<bool> {
    let users = users.clone();
    let id = article_id.to_string();
    QueryDescriptor::new(
        favorite_status_key(article_id),
        ctx.stale_time("favorite-status"),
        move || {
            let users = users.clone();
            let id = id.clone();
            async move { users.favorite_status(&id).await }
        },
    )
}

/// Flip an article's favorite flag.
///
/// The new value is visible immediately, stays on success and reverts if
/// the server rejects the change. `known` seeds the current value when the
/// status is not cached yet (list payloads carry it); otherwise it is
/// fetched first.
pub async fn toggle_favorite(
    ctx: &PageContext,
    users: &UsersService,
    article_id: &str,
    known: Option<bool>,
) -> Result<bool, ApiError> {
    let next = !current_favorite(ctx, users, article_id, known).await?;
    commit_status(ctx, users, article_id, next).await?;
    Ok(next)
}

/// [`toggle_favorite`], also flipping the flag inside the cached listing at
/// `listing`. Both writes roll back together when the server rejects the
/// change.
pub async fn toggle_favorite_listed<T, F>(
    ctx: &PageContext,
    users: &UsersService,
    article_id: &str,
    known: Option<bool>,
    listing: &QueryKey,
    set_flag: F,
) -> Result<bool, ApiError>
where
    T: Send + Sync + 'static,
    F: FnOnce(&T, bool) -> T,
{
    let next = !current_favorite(ctx, users, article_id, known).await?;
    let status = commit_status(ctx, users, article_id, next);
    ctx.cache
        .mutate_with(listing, |list: &T| set_flag(list, next), status, &[])
        .await?;
    Ok(next)
}

async fn current_favorite(
    ctx: &PageContext,
    users: &UsersService,
    article_id: &str,
    known: Option<bool>,
) -> Result<bool, ApiError> {
    let key = favorite_status_key(article_id);
    Ok(match (ctx.cache.get_data::<bool>(&key), known) {
        (Some(cached), _) => *cached,
        (None, Some(known)) => {
            // Seeded so a rollback restores a concrete value.
            ctx.cache.set_data(&key, known);
            known
        }
        (None, None) => *ctx.cache.fetch(&favorite_status_query(ctx, users, article_id)).await?,
    })
}

async fn commit_status(
    ctx: &PageContext,
    users: &UsersService,
    article_id: &str,
    next: bool,
) -> Result<(), ApiError> {
    let commit = async {
        if next {
            users.add_favorite(article_id).await
        } else {
            users.remove_favorite(article_id).await
        }
    };
    ctx.cache
        .mutate(&favorite_status_key(article_id), next, commit, FAVORITE_RESOURCES)
        .await?;
    Ok(())
}

/// The favorites tab: server-paged list, narrowed locally by search text and
/// category.
pub struct FavoritesPage {
    ctx: PageContext,
    users: UsersService,
    url: UrlSync,
    search: String,
    category: String,
    keep: KeepPrevious<FavoritesFeed>,
}

impl FavoritesPage {
    pub fn schema() -> FilterSchema {
        FilterSchema::new().page("page").field("limit", 12i64)
    }

    pub fn new(ctx: PageContext) -> Self {
        let url = UrlSync::new(Self::schema(), ctx.history.clone());
        Self {
            users: UsersService::new(ctx.http.clone()),
            ctx,
            url,
            search: String::new(),
            category: ALL_CATEGORIES.to_string(),
            keep: KeepPrevious::default(),
        }
    }

    pub fn filters(&self) -> &FilterState {
        self.url.state()
    }

    pub fn set_page(&mut self, page: i64) {
        self.url.set_page(page);
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.search = search.into();
    }

    pub fn set_category(&mut self, category: impl Into<String>) {
        self.category = category.into();
    }

    fn list_key(&self) -> QueryKey {
        QueryKey::from_filters("favorites", self.url.state())
    }

    pub fn list_query(&self) -> QueryDescriptor<FavoritesFeed> {
        let users = self.users.clone();
        let filters = ListFilters {
            page: opt_u32(self.url.state(), "page"),
            limit: opt_u32(self.url.state(), "limit"),
            ..Default::default()
        };
        QueryDescriptor::new(self.list_key(), self.ctx.stale_time("favorites"), move || {
            let users = users.clone();
            let filters = filters.clone();
            async move { users.get_favorites(&filters).await }
        })
    }

    pub async fn load(&self) -> Result<Arc<FavoritesFeed>, ApiError> {
        self.ctx.cache.fetch(&self.list_query()).await
    }

    pub fn view(&mut self) -> PageView<FavoritesFeed> {
        let entry: CacheEntry<FavoritesFeed> = self.ctx.cache.observe(&self.list_query());
        self.keep.view(entry)
    }

    /// Favorites matching the local search text and category.
    pub fn visible(&self, feed: &FavoritesFeed) -> Vec<Favorite> {
        let needle = self.search.trim().to_lowercase();
        feed.favorites
            .items
            .iter()
            .filter(|fav| needle.is_empty() || fav.article.title.to_lowercase().contains(&needle))
            .filter(|fav| self.category == ALL_CATEGORIES || category_of(fav) == self.category)
            .cloned()
            .collect()
    }

    /// `all` followed by the distinct categories present in `feed`.
    pub fn categories(feed: &FavoritesFeed) -> Vec<String> {
        let distinct: BTreeSet<&str> = feed.favorites.items.iter().map(category_of).collect();
        std::iter::once(ALL_CATEGORIES)
            .chain(distinct)
            .map(str::to_string)
            .collect()
    }

    /// Remove one favorite, dropping it from the visible list right away.
    pub async fn remove(&self, article_id: &str) -> Result<(), ApiError> {
        let key = self.list_key();
        let id = article_id.to_string();
        let drop_it = move |feed: &FavoritesFeed| {
            let mut next = feed.clone();
            next.favorites.items.retain(|fav| fav.article.id != id);
            next.stats.total = next.stats.total.saturating_sub(1);
            next
        };
        self.ctx
            .cache
            .mutate_with(&key, drop_it, self.users.remove_favorite(article_id), FAVORITE_RESOURCES)
            .await?;
        self.ctx.cache.set_data(&favorite_status_key(article_id), false);
        Ok(())
    }

    pub async fn toggle(&self, article_id: &str, known: Option<bool>) -> Result<bool, ApiError> {
        toggle_favorite(&self.ctx, &self.users, article_id, known).await
    }

    pub async fn clear_all(&self) -> Result<(), ApiError> {
        self.users.clear_favorites().await?;
        self.ctx.cache.invalidate(FAVORITE_RESOURCES);
        self.ctx.cache.invalidate(&["favorite-status"]);
        Ok(())
    }

    pub async fn export(&self, format: ExportFormat) -> Result<String, ApiError> {
        self.users.export_favorites(format).await
    }
}

fn category_of(fav: &Favorite) -> &str {
    fav.article.category.as_deref().unwrap_or(UNCATEGORIZED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lines_common::{FavoritesStats, Page, Pagination};

    fn feed() -> FavoritesFeed {
        let favorites: Vec<Favorite> = serde_json::from_value(serde_json::json!([
            {"id": 1, "article": {"id": 10, "title": "Rust in production", "category": "tech"}},
            {"id": 2, "article": {"id": 11, "title": "Ocean currents", "category": "science"}},
            {"id": 3, "article": {"id": 12, "title": "Rust belt economics"}}
        ]))
        .unwrap();
        FavoritesFeed {
            favorites: Page::new(favorites, Pagination::default()),
            stats: FavoritesStats::default(),
        }
    }

    #[test]
    fn test_categories_lists_all_first() {
        assert_eq!(
            FavoritesPage::categories(&feed()),
            vec!["all", "Uncategorized", "science", "tech"]
        );
    }

    #[test]
    fn test_category_of_defaults() {
        let feed = feed();
        assert_eq!(category_of(&feed.favorites.items[2]), "Uncategorized");
        assert_eq!(category_of(&feed.favorites.items[0]), "tech");
    }
}
