use std::sync::Arc;

use lines_common::{AiArticle, Article, TimeSaverStats};
use tracing::warn;

use super::PageContext;
use crate::errors::ApiError;
use crate::query::{CacheEntry, QueryDescriptor, QueryKey};
use crate::services::{AiMlService, ArticlesService, TimeSaverService};

/// Items per home-page strip.
pub const HOME_STRIP_LIMIT: u32 = 6;

/// The landing page: trending articles, trending AI/ML news and the Time
/// Saver stats strip. The three load independently; one failing leaves the
/// others on screen.
pub struct HomePage {
    ctx: PageContext,
    articles: ArticlesService,
    ai_ml: AiMlService,
    time_saver: TimeSaverService,
}

/// One render of the home page.
#[derive(Debug, Clone)]
pub struct HomeView {
    pub trending_articles: CacheEntry<Vec<Article>>,
    pub trending_ai_ml: CacheEntry<Vec<AiArticle>>,
    pub time_saver_stats: CacheEntry<TimeSaverStats>,
}

impl HomeView {
    pub fn is_loading(&self) -> bool {
        self.trending_articles.is_loading()
            || self.trending_ai_ml.is_loading()
            || self.time_saver_stats.is_loading()
    }
}

/// Whatever loaded. Failed strips are `None`.
#[derive(Debug, Clone, Default)]
pub struct HomeSections {
    pub trending_articles: Option<Arc<Vec<Article>>>,
    pub trending_ai_ml: Option<Arc<Vec<AiArticle>>>,
    pub time_saver_stats: Option<Arc<TimeSaverStats>>,
}

impl HomePage {
    pub fn new(ctx: PageContext) -> Self {
        Self {
            articles: ArticlesService::new(ctx.http.clone()),
            ai_ml: AiMlService::new(ctx.http.clone()),
            time_saver: TimeSaverService::new(ctx.http.clone()),
            ctx,
        }
    }

    pub fn trending_articles_query(&self) -> QueryDescriptor<Vec<Article>> {
        let service = self.articles.clone();
        QueryDescriptor::new(
            QueryKey::new("home-articles").with(HOME_STRIP_LIMIT),
            self.ctx.stale_time("home-articles"),
            move || {
                let service = service.clone();
                async move { service.get_trending_articles(HOME_STRIP_LIMIT).await }
            },
        )
    }

    pub fn trending_ai_ml_query(&self) -> QueryDescriptor<Vec<AiArticle>> {
        let service = self.ai_ml.clone();
        QueryDescriptor::new(
            QueryKey::new("home-aiml").with(HOME_STRIP_LIMIT),
            self.ctx.stale_time("home-aiml"),
            move || {
                let service = service.clone();
                async move { service.get_trending(HOME_STRIP_LIMIT).await }
            },
        )
    }

    pub fn stats_query(&self) -> QueryDescriptor<TimeSaverStats> {
        let service = self.time_saver.clone();
        QueryDescriptor::new(
            QueryKey::new("home-timesaver"),
            self.ctx.stale_time("home-timesaver"),
            move || {
                let service = service.clone();
                async move { service.get_stats().await }
            },
        )
    }

    /// Load all three strips concurrently.
    pub async fn load(&self) -> HomeSections {
        let articles_query = self.trending_articles_query();
        let ai_ml_query = self.trending_ai_ml_query();
        let stats_query = self.stats_query();
        let (articles, ai_ml, stats) = tokio::join!(
            self.ctx.cache.fetch(&articles_query),
            self.ctx.cache.fetch(&ai_ml_query),
            self.ctx.cache.fetch(&stats_query),
        );
        HomeSections {
            trending_articles: loaded("trending articles", articles),
            trending_ai_ml: loaded("trending AI/ML", ai_ml),
            time_saver_stats: loaded("time saver stats", stats),
        }
    }

    pub fn view(&self) -> HomeView {
        HomeView {
            trending_articles: self.ctx.cache.observe(&self.trending_articles_query()),
            trending_ai_ml: self.ctx.cache.observe(&self.trending_ai_ml_query()),
            time_saver_stats: self.ctx.cache.observe(&self.stats_query()),
        }
    }
}

fn loaded<T>(section: &str, result: Result<Arc<T>, ApiError>) -> Option<Arc<T>> {
    result
        .inspect_err(|e| warn!(section, error = %e, "Home section failed to load"))
        .ok()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use axum::extract::Query;
    use axum::routing::get;
    use serde_json::json;

    use super::*;
    use crate::config::ClientConfig;
    use crate::query::QueryCache;
    use crate::services::client_for;
    use crate::url_state::MemoryHistory;

    async fn home(router: axum::Router) -> HomePage {
        let http = client_for(router).await;
        HomePage::new(PageContext {
            http,
            cache: QueryCache::new(Duration::from_secs(60)),
            config: Arc::new(ClientConfig::default()),
            history: Arc::new(MemoryHistory::new()),
        })
    }

    #[tokio::test]
    async fn test_failed_strip_leaves_others() {
        let router = axum::Router::new()
            .route(
                "/articles/trending/list",
                get(|Query(params): Query<HashMap<String, String>>| async move {
                    let limit = params.get("limit").cloned().unwrap_or_default();
                    axum::Json(json!({
                        "success": true,
                        "data": { "articles": [{ "id": 1, "title": format!("limit {}", limit) }] }
                    }))
                }),
            )
            .route(
                "/time-saver/stats",
                get(|| async {
                    axum::Json(json!({ "success": true, "data": { "stats": { "todayNewCount": 4 } } }))
                }),
            );
        let page = home(router).await;

        let sections = page.load().await;
        let articles = sections.trending_articles.unwrap();
        assert_eq!(articles[0].title, "limit 6");
        assert!(sections.trending_ai_ml.is_none());
        assert_eq!(sections.time_saver_stats.unwrap().today_new_count, 4);

        let view = page.view();
        assert!(view.trending_ai_ml.error.is_some());
        assert!(view.trending_articles.data.is_some());
    }
}
