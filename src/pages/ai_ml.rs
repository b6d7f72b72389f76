use std::sync::Arc;

use lines_common::{AiArticle, Category, InteractionType, Page, TimeSaverItem, Topic};

use super::{KeepPrevious, PageContext, PageView, opt_str, opt_u32};
use crate::errors::ApiError;
use crate::query::{QueryDescriptor, QueryKey};
use crate::services::AiMlService;
use crate::services::ai_ml::AiMlFilters;
use crate::url_state::{FilterSchema, FilterState, UrlSync};

const TRENDING_LIMIT: u32 = 5;
const TOPICS_LIMIT: u32 = 10;

/// AI/ML news. A non-empty `q` switches the listing from the news feed to
/// search results.
pub struct AiMlPage {
    ctx: PageContext,
    service: AiMlService,
    url: UrlSync,
    keep: KeepPrevious<Page<AiArticle>>,
}

impl AiMlPage {
    pub fn schema() -> FilterSchema {
        FilterSchema::new()
            .page("page")
            .field("limit", 12i64)
            .field("category", "")
            .field("sortBy", "publishedAt")
            .field("order", "desc")
            .field("q", "")
    }

    pub fn new(ctx: PageContext) -> Self {
        let url = UrlSync::new(Self::schema(), ctx.history.clone());
        Self {
            service: AiMlService::new(ctx.http.clone()),
            ctx,
            url,
            keep: KeepPrevious::default(),
        }
    }

    pub fn filters(&self) -> &FilterState {
        self.url.state()
    }

    pub fn update_filters(&mut self, changes: FilterState) -> &FilterState {
        self.url.update(changes)
    }

    pub fn set_search(&mut self, q: &str) -> &FilterState {
        self.url.update([("q", q.trim())].into_iter().collect())
    }

    pub fn set_page(&mut self, page: i64) -> &FilterState {
        self.url.set_page(page)
    }

    pub fn clear_filters(&mut self) -> &FilterState {
        self.url.clear_filters()
    }

    fn request_filters(state: &FilterState) -> AiMlFilters {
        AiMlFilters {
            page: opt_u32(state, "page"),
            limit: opt_u32(state, "limit"),
            category: opt_str(state, "category"),
            sort_by: opt_str(state, "sortBy"),
            order: opt_str(state, "order"),
            q: opt_str(state, "q"),
        }
    }

    pub fn news_query(&self) -> QueryDescriptor<Page<AiArticle>> {
        let service = self.service.clone();
        let filters = Self::request_filters(self.url.state());
        QueryDescriptor::new(
            QueryKey::from_filters("aiml-news", self.url.state()),
            self.ctx.stale_time("aiml-news"),
            move || {
                let service = service.clone();
                let filters = filters.clone();
                async move {
                    if filters.q.is_some() {
                        service.search(&filters).await
                    } else {
                        service.get_news(&filters).await
                    }
                }
            },
        )
    }

    pub fn categories_query(&self) -> QueryDescriptor<Vec<Category>> {
        let service = self.service.clone();
        QueryDescriptor::new(
            QueryKey::new("aiml-categories"),
            self.ctx.stale_time("aiml-categories"),
            move || {
                let service = service.clone();
                async move { service.get_categories().await }
            },
        )
    }

    pub fn trending_query(&self) -> QueryDescriptor<Vec<AiArticle>> {
        let service = self.service.clone();
        QueryDescriptor::new(
            QueryKey::new("aiml-trending").with(TRENDING_LIMIT),
            self.ctx.stale_time("aiml-trending"),
            move || {
                let service = service.clone();
                async move { service.get_trending(TRENDING_LIMIT).await }
            },
        )
    }

    pub fn topics_query(&self) -> QueryDescriptor<Vec<Topic>> {
        let service = self.service.clone();
        QueryDescriptor::new(
            QueryKey::new("aiml-topics").with(TOPICS_LIMIT),
            self.ctx.stale_time("aiml-topics"),
            move || {
                let service = service.clone();
                async move { service.get_popular_topics(TOPICS_LIMIT).await }
            },
        )
    }

    pub fn article_query(&self, id: &str) -> QueryDescriptor<AiArticle> {
        let service = self.service.clone();
        let id = id.to_string();
        QueryDescriptor::new(
            QueryKey::new("aiml-article").with(id.as_str()),
            self.ctx.stale_time("aiml-article"),
            move || {
                let service = service.clone();
                let id = id.clone();
                async move { service.get_article_by_id(&id, false).await }
            },
        )
    }

    pub async fn load(&self) -> Result<Arc<Page<AiArticle>>, ApiError> {
        self.ctx.cache.fetch(&self.news_query()).await
    }

    pub fn view(&mut self) -> PageView<Page<AiArticle>> {
        let entry = self.ctx.cache.observe(&self.news_query());
        self.keep.view(entry)
    }

    /// Open one article: load it through the cache and record the view.
    pub async fn open_article(&self, id: &str) -> Result<Arc<AiArticle>, ApiError> {
        let article = self.ctx.cache.fetch(&self.article_query(id)).await?;
        self.service.track_view(id).await;
        Ok(article)
    }

    pub async fn record_interaction(&self, id: &str, kind: InteractionType) {
        self.service.track_interaction(id, kind).await;
    }

    pub async fn linked_time_savers(&self, id: &str) -> Vec<TimeSaverItem> {
        self.service.get_linked_time_savers(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_search_is_not_sent() {
        let state = AiMlPage::schema().defaults();
        assert_eq!(AiMlPage::request_filters(&state).q, None);

        let state: FilterState = [("q", "agents")].into_iter().collect();
        assert_eq!(AiMlPage::request_filters(&state).q.as_deref(), Some("agents"));
    }
}
