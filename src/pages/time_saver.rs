use std::sync::Arc;

use lines_common::{InteractionType, Page, TimeSaverItem, TimeSaverStats};
use tracing::warn;

use super::{KeepPrevious, PageContext, PageView, opt_str, opt_u32};
use crate::errors::ApiError;
use crate::query::{QueryDescriptor, QueryKey};
use crate::services::TimeSaverService;
use crate::services::time_saver::TimeSaverFilters;
use crate::url_state::{FilterSchema, FilterState, UrlSync};

const RELATED_LIMIT: usize = 5;

/// The Time Saver digest: a filtered feed, the stats strip and per-group
/// listings.
pub struct TimeSaverPage {
    ctx: PageContext,
    service: TimeSaverService,
    url: UrlSync,
    keep: KeepPrevious<Page<TimeSaverItem>>,
}

impl TimeSaverPage {
    pub fn schema() -> FilterSchema {
        FilterSchema::new()
            .page("page")
            .field("limit", 12i64)
            .field("category", "")
            .field("contentGroup", "")
            .field("sortBy", "publishedAt")
            .field("order", "desc")
    }

    pub fn new(ctx: PageContext) -> Self {
        let url = UrlSync::new(Self::schema(), ctx.history.clone());
        Self {
            service: TimeSaverService::new(ctx.http.clone()),
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

    pub fn set_page(&mut self, page: i64) -> &FilterState {
        self.url.set_page(page)
    }

    pub fn clear_filters(&mut self) -> &FilterState {
        self.url.clear_filters()
    }

    fn request_filters(state: &FilterState) -> TimeSaverFilters {
        TimeSaverFilters {
            page: opt_u32(state, "page"),
            limit: opt_u32(state, "limit"),
            category: opt_str(state, "category"),
            content_group: opt_str(state, "contentGroup"),
            sort_by: opt_str(state, "sortBy"),
            order: opt_str(state, "order"),
        }
    }

    pub fn content_query(&self) -> QueryDescriptor<Page<TimeSaverItem>> {
        let service = self.service.clone();
        let filters = Self::request_filters(self.url.state());
        QueryDescriptor::new(
            QueryKey::from_filters("timesaver-content", self.url.state()),
            self.ctx.stale_time("timesaver-content"),
            move || {
                let service = service.clone();
                let filters = filters.clone();
                async move { service.get_content(&filters).await }
            },
        )
    }

    pub fn stats_query(&self) -> QueryDescriptor<TimeSaverStats> {
        let service = self.service.clone();
        QueryDescriptor::new(
            QueryKey::new("timesaver-stats"),
            self.ctx.stale_time("timesaver-stats"),
            move || {
                let service = service.clone();
                async move { service.get_stats().await }
            },
        )
    }

    /// First page of one content group (`today`, `breaking`, ...).
    pub fn group_query(&self, group: &str) -> QueryDescriptor<Page<TimeSaverItem>> {
        let service = self.service.clone();
        let group = group.to_string();
        QueryDescriptor::new(
            QueryKey::new("content-group").with(group.as_str()),
            self.ctx.stale_time("content-group"),
            move || {
                let service = service.clone();
                let group = group.clone();
                async move {
                    service
                        .get_category_content(&group, &TimeSaverFilters::default())
                        .await
                }
            },
        )
    }

    pub fn item_query(&self, id: &str) -> QueryDescriptor<TimeSaverItem> {
        let service = self.service.clone();
        let id = id.to_string();
        QueryDescriptor::new(
            QueryKey::new("timesaver-item").with(id.as_str()),
            self.ctx.stale_time("timesaver-item"),
            move || {
                let service = service.clone();
                let id = id.clone();
                async move { service.get_content_by_id(&id).await }
            },
        )
    }

    pub async fn load(&self) -> Result<Arc<Page<TimeSaverItem>>, ApiError> {
        self.ctx.cache.fetch(&self.content_query()).await
    }

    pub async fn load_stats(&self) -> Result<Arc<TimeSaverStats>, ApiError> {
        self.ctx.cache.fetch(&self.stats_query()).await
    }

    pub async fn load_group(&self, group: &str) -> Result<Arc<Page<TimeSaverItem>>, ApiError> {
        self.ctx.cache.fetch(&self.group_query(group)).await
    }

    pub fn view(&mut self) -> PageView<Page<TimeSaverItem>> {
        let entry = self.ctx.cache.observe(&self.content_query());
        self.keep.view(entry)
    }

    pub async fn record_view(&self, id: &str) {
        self.service.track_view(id).await;
    }

    /// Open one digest item and count the view.
    pub async fn open_item(&self, id: &str) -> Result<Arc<TimeSaverItem>, ApiError> {
        let item_query = self.item_query(id);
        let (item, _) = tokio::join!(
            self.ctx.cache.fetch(&item_query),
            self.service.track_view(id),
        );
        item
    }

    pub async fn record_interaction(&self, id: &str, kind: InteractionType) {
        self.service.track_interaction(id, kind).await;
    }

    /// Up to five other items from `item`'s category. Best-effort.
    pub async fn related(&self, item: &TimeSaverItem) -> Vec<TimeSaverItem> {
        let filters = TimeSaverFilters {
            category: item.category.clone(),
            limit: Some(RELATED_LIMIT as u32),
            ..Default::default()
        };
        match self.service.get_content(&filters).await {
            Ok(page) => without_item(page.items, &item.id),
            Err(e) => {
                warn!(id = %item.id, error = %e, "Failed to load related content");
                Vec::new()
            }
        }
    }
}

fn without_item(items: Vec<TimeSaverItem>, id: &str) -> Vec<TimeSaverItem> {
    items
        .into_iter()
        .filter(|other| other.id != id)
        .take(RELATED_LIMIT)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_group_maps_to_wire_name() {
        let state: FilterState = [("contentGroup", "breaking"), ("page", "")]
            .into_iter()
            .collect();
        let filters = TimeSaverPage::request_filters(&state);
        assert_eq!(filters.content_group.as_deref(), Some("breaking"));
        assert_eq!(filters.page, None);
    }

    #[test]
    fn test_related_skips_the_open_item() {
        let items: Vec<TimeSaverItem> = serde_json::from_value(serde_json::json!([
            {"id": 1, "title": "One"}, {"id": 2, "title": "Two"}, {"id": 3, "title": "Three"},
            {"id": 4, "title": "Four"}, {"id": 5, "title": "Five"}, {"id": 6, "title": "Six"}
        ]))
        .unwrap();
        let related = without_item(items, "2");
        let ids: Vec<&str> = related.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3", "4", "5", "6"]);
    }
}
