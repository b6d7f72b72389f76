use std::sync::Arc;

use lines_common::Notification;

use super::{KeepPrevious, PageContext, PageView, opt_u32};
use crate::errors::ApiError;
use crate::query::{QueryDescriptor, QueryKey};
use crate::services::UsersService;
use crate::services::users::{ListFilters, NotificationFeed};
use crate::url_state::{FilterSchema, FilterState, UrlSync};

const UNREAD_RESOURCES: &[&str] = &["unread-notifications"];

pub fn unread_count_query(ctx: &PageContext, users: &UsersService) -> QueryDescriptor<u64> {
    let users = users.clone();
    QueryDescriptor::new(
        QueryKey::new("unread-notifications"),
        ctx.stale_time("unread-notifications"),
        move || {
            let users = users.clone();
            async move { users.unread_notifications_count().await }
        },
    )
}

/// Notification inbox. Read markers flip immediately and roll back if the
/// server refuses.
pub struct NotificationsPage {
    ctx: PageContext,
    users: UsersService,
    url: UrlSync,
    search: String,
    keep: KeepPrevious<NotificationFeed>,
}

impl NotificationsPage {
    pub fn schema() -> FilterSchema {
        FilterSchema::new().page("page").field("limit", 20i64)
    }

    pub fn new(ctx: PageContext) -> Self {
        let url = UrlSync::new(Self::schema(), ctx.history.clone());
        Self {
            users: UsersService::new(ctx.http.clone()),
            ctx,
            url,
            search: String::new(),
            keep: KeepPrevious::default(),
        }
    }

    pub fn filters(&self) -> &FilterState {
        self.url.state()
    }

    pub fn set_page(&mut self, page: i64) -> &FilterState {
        self.url.set_page(page)
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.search = search.into();
    }

    fn list_key(&self) -> QueryKey {
        QueryKey::from_filters("notifications", self.url.state())
    }

    pub fn list_query(&self) -> QueryDescriptor<NotificationFeed> {
        let users = self.users.clone();
        let filters = ListFilters {
            page: opt_u32(self.url.state(), "page"),
            limit: opt_u32(self.url.state(), "limit"),
            ..Default::default()
        };
        QueryDescriptor::new(self.list_key(), self.ctx.stale_time("notifications"), move || {
            let users = users.clone();
            let filters = filters.clone();
            async move { users.get_notifications(&filters).await }
        })
    }

    pub fn unread_query(&self) -> QueryDescriptor<u64> {
        unread_count_query(&self.ctx, &self.users)
    }

    pub async fn load(&self) -> Result<Arc<NotificationFeed>, ApiError> {
        self.ctx.cache.fetch(&self.list_query()).await
    }

    pub async fn unread_count(&self) -> Result<u64, ApiError> {
        Ok(*self.ctx.cache.fetch(&self.unread_query()).await?)
    }

    pub fn view(&mut self) -> PageView<NotificationFeed> {
        let entry = self.ctx.cache.observe(&self.list_query());
        self.keep.view(entry)
    }

    /// Notifications whose title or message contains the search text.
    pub fn visible(&self, feed: &NotificationFeed) -> Vec<Notification> {
        let needle = self.search.trim().to_lowercase();
        feed.notifications
            .items
            .iter()
            .filter(|n| matches_search(n, &needle))
            .cloned()
            .collect()
    }

    pub async fn mark_read(&self, id: &str) -> Result<(), ApiError> {
        let target = id.to_string();
        let mark = move |feed: &NotificationFeed| {
            let mut next = feed.clone();
            for n in next.notifications.items.iter_mut().filter(|n| n.id == target) {
                if !n.is_read {
                    n.is_read = true;
                    next.unread_count = next.unread_count.saturating_sub(1);
                }
            }
            next
        };
        self.ctx
            .cache
            .mutate_with(&self.list_key(), mark, self.users.mark_notification_read(id), UNREAD_RESOURCES)
            .await?;
        Ok(())
    }

    pub async fn mark_all_read(&self) -> Result<(), ApiError> {
        let mark = |feed: &NotificationFeed| {
            let mut next = feed.clone();
            next.notifications.items.iter_mut().for_each(|n| n.is_read = true);
            next.unread_count = 0;
            next
        };
        self.ctx
            .cache
            .mutate_with(&self.list_key(), mark, self.users.mark_all_notifications_read(), UNREAD_RESOURCES)
            .await?;
        self.ctx.cache.set_data(&QueryKey::new("unread-notifications"), 0u64);
        Ok(())
    }
}

/// `needle` must already be lowercase.
fn matches_search(n: &Notification, needle: &str) -> bool {
    needle.is_empty()
        || n.title.to_lowercase().contains(needle)
        || n.message.to_lowercase().contains(needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_matches_title_or_message() {
        let items: Vec<Notification> = serde_json::from_value(serde_json::json!([
            {"id": 1, "title": "Article approved", "message": "Your story is live"},
            {"id": 2, "title": "Security alert", "message": "New login from Berlin"}
        ]))
        .unwrap();
        let count = |needle: &str| items.iter().filter(|n| matches_search(n, needle)).count();
        assert_eq!(count("berlin"), 1);
        assert_eq!(count("article"), 1);
        assert_eq!(count(""), 2);
        assert_eq!(count("weather"), 0);
    }
}
