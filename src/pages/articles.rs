use std::sync::Arc;

use lines_common::{Article, Category, Page};

use super::favorites::toggle_favorite_listed;
use super::{KeepPrevious, PageContext, PageView, opt_str, opt_u32};
use crate::errors::ApiError;
use crate::query::{QueryDescriptor, QueryKey};
use crate::services::articles::{ArticleFilters, ShareResult};
use crate::services::{ArticlesService, UsersService};
use crate::url_state::{FilterSchema, FilterState, UrlSync};

const TRENDING_LIMIT: u32 = 5;

/// The general articles listing with category, sort, search and featured
/// filters, all mirrored into the URL.
pub struct ArticlesPage {
    ctx: PageContext,
    articles: ArticlesService,
    users: UsersService,
    url: UrlSync,
    keep: KeepPrevious<Page<Article>>,
}

impl ArticlesPage {
    pub fn schema() -> FilterSchema {
        FilterSchema::new()
            .page("page")
            .field("limit", 12i64)
            .field("category", "")
            .field("sortBy", "publishedAt")
            .field("order", "desc")
            .field("search", "")
            .field("featured", false)
    }

    pub fn new(ctx: PageContext) -> Self {
        let url = UrlSync::new(Self::schema(), ctx.history.clone());
        Self {
            articles: ArticlesService::new(ctx.http.clone()),
            users: UsersService::new(ctx.http.clone()),
            ctx,
            url,
            keep: KeepPrevious::default(),
        }
    }

    pub fn filters(&self) -> &FilterState {
        self.url.state()
    }

    /// Merge `changes` into the filters. Changing anything but the page
    /// returns to page 1.
    pub fn update_filters(&mut self, changes: FilterState) -> &FilterState {
        self.url.update(changes)
    }

    pub fn set_page(&mut self, page: i64) -> &FilterState {
        self.url.set_page(page)
    }

    pub fn clear_filters(&mut self) -> &FilterState {
        self.url.clear_filters()
    }

    /// Pick up a URL change made outside this page (back/forward).
    pub fn reload(&mut self) -> &FilterState {
        self.url.reload()
    }

    pub fn request_filters(state: &FilterState) -> ArticleFilters {
        ArticleFilters {
            page: opt_u32(state, "page"),
            limit: opt_u32(state, "limit"),
            category: opt_str(state, "category"),
            sort_by: opt_str(state, "sortBy"),
            order: opt_str(state, "order"),
            search: opt_str(state, "search"),
            featured: state.bool("featured"),
        }
    }

    pub fn articles_query(&self) -> QueryDescriptor<Page<Article>> {
        let service = self.articles.clone();
        let filters = Self::request_filters(self.url.state());
        QueryDescriptor::new(
            QueryKey::from_filters("articles", self.url.state()),
            self.ctx.stale_time("articles"),
            move || {
                let service = service.clone();
                let filters = filters.clone();
                async move { service.get_articles(&filters).await }
            },
        )
    }

    pub fn categories_query(&self) -> QueryDescriptor<Vec<Category>> {
        let service = self.articles.clone();
        QueryDescriptor::new(
            QueryKey::new("categories"),
            self.ctx.stale_time("categories"),
            move || {
                let service = service.clone();
                async move { service.get_categories().await }
            },
        )
    }

    pub fn trending_query(&self) -> QueryDescriptor<Vec<Article>> {
        let service = self.articles.clone();
        QueryDescriptor::new(
            QueryKey::new("trending-articles").with(TRENDING_LIMIT),
            self.ctx.stale_time("trending-articles"),
            move || {
                let service = service.clone();
                async move { service.get_trending_articles(TRENDING_LIMIT).await }
            },
        )
    }

    /// One article for the details page. Fetching it counts a view.
    pub fn article_query(&self, id: &str) -> QueryDescriptor<Article> {
        let service = self.articles.clone();
        let id = id.to_string();
        QueryDescriptor::new(
            QueryKey::new("article").with(id.as_str()),
            self.ctx.stale_time("article"),
            move || {
                let service = service.clone();
                let id = id.clone();
                async move { service.get_article_by_id(&id, true).await }
            },
        )
    }

    pub async fn load(&self) -> Result<Arc<Page<Article>>, ApiError> {
        self.ctx.cache.fetch(&self.articles_query()).await
    }

    pub async fn load_categories(&self) -> Result<Arc<Vec<Category>>, ApiError> {
        self.ctx.cache.fetch(&self.categories_query()).await
    }

    pub async fn load_trending(&self) -> Result<Arc<Vec<Article>>, ApiError> {
        self.ctx.cache.fetch(&self.trending_query()).await
    }

    pub async fn open_article(&self, id: &str) -> Result<Arc<Article>, ApiError> {
        self.ctx.cache.fetch(&self.article_query(id)).await
    }

    /// Record a share and fold the new count into the cached article.
    pub async fn share_article(&self, id: &str) -> Result<ShareResult, ApiError> {
        let result = self.articles.share_article(id).await?;
        let key = self.article_query(id).key;
        if let Some(article) = self.ctx.cache.get_data::<Article>(&key)
            && result.share_count > 0
        {
            let mut next = (*article).clone();
            next.share_count = result.share_count;
            self.ctx.cache.set_data(&key, next);
        }
        Ok(result)
    }

    /// Current listing. While a new filter set loads the previous page stays
    /// visible with `is_previous` set.
    pub fn view(&mut self) -> PageView<Page<Article>> {
        let entry = self.ctx.cache.observe(&self.articles_query());
        self.keep.view(entry)
    }

    /// Toggle `article`'s favorite flag, seeded from the listing. The flag
    /// flips in the rendered listing right away and reverts on failure.
    pub async fn toggle_favorite(&self, article: &Article) -> Result<bool, ApiError> {
        let id = article.id.clone();
        toggle_favorite_listed(
            &self.ctx,
            &self.users,
            &article.id,
            Some(article.is_favorite),
            &self.articles_query().key,
            move |page: &Page<Article>, favorite| with_favorite(page, &id, favorite),
        )
        .await
    }

    /// Toggle the favorite flag from the details page.
    pub async fn toggle_article_favorite(&self, article: &Article) -> Result<bool, ApiError> {
        toggle_favorite_listed(
            &self.ctx,
            &self.users,
            &article.id,
            Some(article.is_favorite),
            &self.article_query(&article.id).key,
            |current: &Article, favorite| Article {
                is_favorite: favorite,
                ..current.clone()
            },
        )
        .await
    }
}

fn with_favorite(page: &Page<Article>, article_id: &str, favorite: bool) -> Page<Article> {
    let mut next = page.clone();
    for article in next.items.iter_mut().filter(|a| a.id == article_id) {
        article.is_favorite = favorite;
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::url_state::MemoryHistory;

    #[test]
    fn test_request_filters_skip_defaults_that_are_empty() {
        let history = MemoryHistory::with_query("category=tech&page=2&featured=true");
        let state = crate::url_state::read_from_url(&ArticlesPage::schema(), &history);
        let filters = ArticlesPage::request_filters(&state);
        assert_eq!(filters.page, Some(2));
        assert_eq!(filters.limit, Some(12));
        assert_eq!(filters.category.as_deref(), Some("tech"));
        assert_eq!(filters.search, None);
        assert_eq!(filters.sort_by.as_deref(), Some("publishedAt"));
        assert!(filters.featured);
    }

    #[test]
    fn test_with_favorite_flips_only_the_matching_article() {
        let items: Vec<Article> = serde_json::from_value(serde_json::json!([
            {"id": 42, "title": "Rust at scale"},
            {"id": 43, "title": "Tide tables", "isFavorited": true}
        ]))
        .unwrap();
        let page = Page::new(items, Default::default());

        let next = with_favorite(&page, "42", true);
        assert!(next.items[0].is_favorite);
        assert!(next.items[1].is_favorite);
        assert!(!page.items[0].is_favorite);

        let next = with_favorite(&next, "43", false);
        assert!(!next.items[1].is_favorite);
    }
}
