use std::sync::Arc;

use lines_common::{Page, ReadingHistoryEntry, ReadingProgress};

use super::{KeepPrevious, PageContext, PageView, opt_str, opt_u32};
use crate::errors::ApiError;
use crate::query::{QueryDescriptor, QueryKey};
use crate::services::UsersService;
use crate::services::users::ListFilters;
use crate::url_state::{FilterSchema, FilterState, UrlSync};

pub struct ReadingHistoryPage {
    ctx: PageContext,
    users: UsersService,
    url: UrlSync,
    keep: KeepPrevious<Page<ReadingHistoryEntry>>,
}

impl ReadingHistoryPage {
    pub fn schema() -> FilterSchema {
        FilterSchema::new()
            .page("page")
            .field("limit", 10i64)
            .field("sortBy", "updatedAt")
            .field("order", "desc")
    }

    pub fn new(ctx: PageContext) -> Self {
        let url = UrlSync::new(Self::schema(), ctx.history.clone());
        Self {
            users: UsersService::new(ctx.http.clone()),
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

    pub fn history_query(&self) -> QueryDescriptor<Page<ReadingHistoryEntry>> {
        let users = self.users.clone();
        let state = self.url.state();
        let filters = ListFilters {
            page: opt_u32(state, "page"),
            limit: opt_u32(state, "limit"),
            sort_by: opt_str(state, "sortBy"),
            order: opt_str(state, "order"),
        };
        QueryDescriptor::new(
            QueryKey::from_filters("reading-history", state),
            self.ctx.stale_time("reading-history"),
            move || {
                let users = users.clone();
                let filters = filters.clone();
                async move { users.get_reading_history(&filters).await }
            },
        )
    }

    pub async fn load(&self) -> Result<Arc<Page<ReadingHistoryEntry>>, ApiError> {
        self.ctx.cache.fetch(&self.history_query()).await
    }

    pub fn view(&mut self) -> PageView<Page<ReadingHistoryEntry>> {
        let entry = self.ctx.cache.observe(&self.history_query());
        self.keep.view(entry)
    }

    /// Report progress on an article; the history and dashboard refetch on
    /// next use.
    pub async fn record_progress(
        &self,
        article_id: &str,
        progress: &ReadingProgress,
    ) -> Result<(), ApiError> {
        self.users.update_reading_progress(article_id, progress).await?;
        self.ctx.cache.invalidate(&["reading-history", "user-dashboard"]);
        Ok(())
    }
}
