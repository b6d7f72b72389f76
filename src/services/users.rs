use lines_common::{
    BulkAction, DashboardStats, ExportFormat, Favorite, FavoriteStatus, FavoritesStats,
    Notification, Page, ReadingHistoryEntry, ReadingProgress, UserProfile,
};
use serde::Serialize;
use serde_json::{Value, json};

use super::{decode, field_from, page_from};
use crate::errors::ApiError;
use crate::http::{HttpClient, RequestOptions};

/// Paging and sorting shared by the per-user list endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFilters {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
}

/// Fields of `PUT /users/profile`. Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferences: Option<Value>,
}

/// `GET /favorites`: one page of favorites plus the collection stats.
#[derive(Debug, Clone, PartialEq)]
pub struct FavoritesFeed {
    pub favorites: Page<Favorite>,
    pub stats: FavoritesStats,
}

/// `GET /notifications`: one page plus the unread total.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationFeed {
    pub notifications: Page<Notification>,
    pub unread_count: u64,
}

/// Everything under `/users`, `/favorites` and `/notifications`. All calls
/// require a signed-in user.
#[derive(Clone)]
pub struct UsersService {
    http: HttpClient,
}

impl UsersService {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    // ── Profile ───────────────────────────────────────────────────────

    pub async fn get_profile(&self) -> Result<UserProfile, ApiError> {
        let data: Value = self.http.get_data("/users/profile", RequestOptions::new()).await?;
        field_from(data, "user")
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile, ApiError> {
        let opts = RequestOptions::new().json(update)?;
        let data: Value = self.http.put("/users/profile", opts).await?.data()?;
        field_from(data, "user")
    }

    pub async fn get_reading_history(
        &self,
        filters: &ListFilters,
    ) -> Result<Page<ReadingHistoryEntry>, ApiError> {
        let opts = RequestOptions::new().params_from(filters)?;
        let data: Value = self.http.get_data("/users/reading-history", opts).await?;
        page_from(data, "history")
    }

    pub async fn update_reading_progress(
        &self,
        article_id: &str,
        progress: &ReadingProgress,
    ) -> Result<Option<String>, ApiError> {
        let opts = RequestOptions::new().json(progress)?;
        self.http
            .put(&format!("/users/reading-progress/{}", article_id), opts)
            .await?
            .ack()
    }

    pub async fn get_dashboard(&self) -> Result<DashboardStats, ApiError> {
        let data: Value = self.http.get_data("/users/dashboard", RequestOptions::new()).await?;
        field_from(data, "dashboard")
    }

    // ── Favorites ─────────────────────────────────────────────────────

    pub async fn get_favorites(&self, filters: &ListFilters) -> Result<FavoritesFeed, ApiError> {
        let opts = RequestOptions::new().params_from(filters)?;
        let data: Value = self.http.get_data("/favorites", opts).await?;
        let stats = match data.get("stats") {
            Some(stats) if !stats.is_null() => decode(stats.clone())?,
            _ => FavoritesStats::default(),
        };
        let favorites = page_from(data, "favorites")?;
        Ok(FavoritesFeed { favorites, stats })
    }

    pub async fn add_favorite(&self, article_id: &str) -> Result<Option<String>, ApiError> {
        self.http
            .post(&format!("/favorites/{}", article_id), RequestOptions::new())
            .await?
            .ack()
    }

    pub async fn remove_favorite(&self, article_id: &str) -> Result<Option<String>, ApiError> {
        self.http
            .delete(&format!("/favorites/{}", article_id), RequestOptions::new())
            .await?
            .ack()
    }

    pub async fn favorite_status(&self, article_id: &str) -> Result<bool, ApiError> {
        let status: FavoriteStatus = self
            .http
            .get_data(&format!("/favorites/{}/status", article_id), RequestOptions::new())
            .await?;
        Ok(status.is_favorite)
    }

    pub async fn favorites_stats(&self) -> Result<FavoritesStats, ApiError> {
        let data: Value = self.http.get_data("/favorites/stats", RequestOptions::new()).await?;
        field_from(data, "stats")
    }

    /// Export in `format`. Returns the response body as sent (JSON text or
    /// CSV).
    pub async fn export_favorites(&self, format: ExportFormat) -> Result<String, ApiError> {
        let opts = RequestOptions::new().param("format", format.as_str());
        Ok(self.http.get("/favorites/export", opts).await?.body)
    }

    pub async fn bulk_favorites(
        &self,
        article_ids: &[String],
        action: BulkAction,
    ) -> Result<Option<String>, ApiError> {
        let opts = RequestOptions::new().json(&json!({ "articleIds": article_ids, "action": action }))?;
        self.http.post("/favorites/bulk", opts).await?.ack()
    }

    pub async fn clear_favorites(&self) -> Result<Option<String>, ApiError> {
        let opts = RequestOptions::new().json(&json!({ "confirm": true }))?;
        self.http.delete("/favorites", opts).await?.ack()
    }

    // ── Notifications ─────────────────────────────────────────────────

    pub async fn get_notifications(&self, filters: &ListFilters) -> Result<NotificationFeed, ApiError> {
        let opts = RequestOptions::new().params_from(filters)?;
        let data: Value = self.http.get_data("/notifications", opts).await?;
        let unread_count = data
            .get("unreadCount")
            .and_then(Value::as_u64)
            .unwrap_or_default();
        let notifications: Page<Notification> = page_from(data, "notifications")?;
        Ok(NotificationFeed {
            notifications,
            unread_count,
        })
    }

    pub async fn mark_notification_read(&self, id: &str) -> Result<Option<String>, ApiError> {
        self.http
            .put(&format!("/notifications/{}/read", id), RequestOptions::new())
            .await?
            .ack()
    }

    pub async fn mark_all_notifications_read(&self) -> Result<Option<String>, ApiError> {
        self.http
            .put("/notifications/read-all", RequestOptions::new())
            .await?
            .ack()
    }

    pub async fn unread_notifications_count(&self) -> Result<u64, ApiError> {
        let data: Value = self
            .http
            .get_data("/notifications/unread-count", RequestOptions::new())
            .await?;
        field_from(data, "count")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_update_sends_only_set_fields() {
        let update = ProfileUpdate {
            bio: Some("Reader".into()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&update).unwrap(), json!({ "bio": "Reader" }));
    }
}
