use chrono::Utc;
use lines_common::{InteractionType, Page, TimeSaverItem, TimeSaverStats};
use serde::Serialize;
use serde_json::{Value, json};

use super::{field_from, page_from, track};
use crate::errors::ApiError;
use crate::http::{HttpClient, RequestOptions};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSaverFilters {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub category: Option<String>,
    pub content_group: Option<String>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
}

/// The digest feed under `/time-saver`.
#[derive(Clone)]
pub struct TimeSaverService {
    http: HttpClient,
}

impl TimeSaverService {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub async fn get_content(&self, filters: &TimeSaverFilters) -> Result<Page<TimeSaverItem>, ApiError> {
        let opts = RequestOptions::new().params_from(filters)?;
        let data: Value = self.http.get_data("/time-saver/content", opts).await?;
        page_from(data, "content")
    }

    pub async fn get_content_by_id(&self, id: &str) -> Result<TimeSaverItem, ApiError> {
        let data: Value = self
            .http
            .get_data(&format!("/time-saver/content/{}", id), RequestOptions::new())
            .await?;
        field_from(data, "content")
    }

    pub async fn get_stats(&self) -> Result<TimeSaverStats, ApiError> {
        let data: Value = self.http.get_data("/time-saver/stats", RequestOptions::new()).await?;
        field_from(data, "stats")
    }

    /// Items of one content group (`today`, `breaking`, `viral`, ...).
    pub async fn get_category_content(
        &self,
        group: &str,
        filters: &TimeSaverFilters,
    ) -> Result<Page<TimeSaverItem>, ApiError> {
        let opts = RequestOptions::new().params_from(filters)?;
        let data: Value = self
            .http
            .get_data(&format!("/time-saver/category/{}", group), opts)
            .await?;
        page_from(data, "content")
    }

    pub async fn track_view(&self, id: &str) -> Option<Value> {
        let body = json!({ "timestamp": Utc::now() });
        track(&self.http, &format!("/time-saver/content/{}/view", id), body).await
    }

    pub async fn track_interaction(&self, id: &str, kind: InteractionType) -> Option<Value> {
        let body = json!({ "interactionType": kind, "timestamp": Utc::now() });
        track(&self.http, &format!("/time-saver/content/{}/interaction", id), body).await
    }

    /// Requires a signed-in user.
    pub async fn get_analytics(&self, period: Option<&str>) -> Result<Value, ApiError> {
        let mut opts = RequestOptions::new();
        if let Some(period) = period {
            opts = opts.param("period", period);
        }
        self.http.get_data("/time-saver/analytics", opts).await
    }
}
