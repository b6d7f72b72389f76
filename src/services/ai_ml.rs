use chrono::Utc;
use lines_common::{AiArticle, Category, InteractionType, Page, TimeSaverItem, Topic};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::warn;

use super::{field_from, page_from, track};
use crate::errors::ApiError;
use crate::http::{HttpClient, RequestOptions};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiMlFilters {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub category: Option<String>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
    /// Free-text query; only meaningful for [`AiMlService::search`].
    pub q: Option<String>,
}

/// The AI/ML news vertical under `/ai-ml`.
#[derive(Clone)]
pub struct AiMlService {
    http: HttpClient,
}

impl AiMlService {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub async fn get_news(&self, filters: &AiMlFilters) -> Result<Page<AiArticle>, ApiError> {
        let opts = RequestOptions::new().params_from(filters)?;
        let data: Value = self.http.get_data("/ai-ml/news", opts).await?;
        page_from(data, "articles")
    }

    pub async fn get_article_by_id(&self, id: &str, track_view: bool) -> Result<AiArticle, ApiError> {
        let opts = RequestOptions::new().param("trackView", track_view);
        let data: Value = self.http.get_data(&format!("/ai-ml/news/{}", id), opts).await?;
        field_from(data, "article")
    }

    pub async fn get_trending(&self, limit: u32) -> Result<Vec<AiArticle>, ApiError> {
        let opts = RequestOptions::new().param("limit", limit);
        let data: Value = self.http.get_data("/ai-ml/trending", opts).await?;
        Ok(page_from(data, "articles")?.items)
    }

    pub async fn search(&self, filters: &AiMlFilters) -> Result<Page<AiArticle>, ApiError> {
        let opts = RequestOptions::new().params_from(filters)?;
        let data: Value = self.http.get_data("/ai-ml/search", opts).await?;
        page_from(data, "articles")
    }

    pub async fn get_categories(&self) -> Result<Vec<Category>, ApiError> {
        let data: Value = self.http.get_data("/ai-ml/categories", RequestOptions::new()).await?;
        field_from(data, "categories")
    }

    pub async fn get_articles_by_category(
        &self,
        category: &str,
        filters: &AiMlFilters,
    ) -> Result<Page<AiArticle>, ApiError> {
        let opts = RequestOptions::new().params_from(filters)?;
        let data: Value = self
            .http
            .get_data(&format!("/ai-ml/category/{}", category), opts)
            .await?;
        page_from(data, "articles")
    }

    pub async fn get_popular_topics(&self, limit: u32) -> Result<Vec<Topic>, ApiError> {
        let opts = RequestOptions::new().param("limit", limit);
        let data: Value = self.http.get_data("/ai-ml/topics/popular", opts).await?;
        field_from(data, "topics")
    }

    /// Best effort: failures are logged and yield `None`.
    pub async fn track_view(&self, id: &str) -> Option<Value> {
        let body = json!({ "timestamp": Utc::now() });
        track(&self.http, &format!("/ai-ml/news/{}/view", id), body).await
    }

    /// Best effort: failures are logged and yield `None`.
    pub async fn track_interaction(&self, id: &str, kind: InteractionType) -> Option<Value> {
        let body = json!({ "interactionType": kind, "timestamp": Utc::now() });
        track(&self.http, &format!("/ai-ml/news/{}/interaction", id), body).await
    }

    /// Time-saver digests that summarize this article. Empty on failure.
    pub async fn get_linked_time_savers(&self, id: &str) -> Vec<TimeSaverItem> {
        let path = format!("/ai-ml/news/{}/timesavers", id);
        let result = async {
            let data: Value = self.http.get_data(&path, RequestOptions::new()).await?;
            field_from::<Vec<TimeSaverItem>>(data, "timeSavers")
        }
        .await;
        result.unwrap_or_else(|e| {
            warn!(%path, error = %e, "Failed to load linked time savers");
            Vec::new()
        })
    }

    pub async fn get_insights(&self, params: &[(&str, &str)]) -> Result<Value, ApiError> {
        let opts = params
            .iter()
            .fold(RequestOptions::new(), |opts, (k, v)| opts.param(*k, v));
        self.http.get_data("/ai-ml/insights", opts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{client_for, failing_backend};

    #[tokio::test]
    async fn test_tracking_failure_yields_none() {
        let service = AiMlService::new(client_for(failing_backend()).await);
        assert_eq!(service.track_view("5").await, None);
        assert_eq!(service.track_interaction("5", InteractionType::Share).await, None);
    }

    #[tokio::test]
    async fn test_linked_time_savers_empty_on_failure() {
        let service = AiMlService::new(client_for(failing_backend()).await);
        assert!(service.get_linked_time_savers("5").await.is_empty());
    }

    #[tokio::test]
    async fn test_linked_time_savers_unwraps_payload() {
        let router = axum::Router::new().route(
            "/ai-ml/news/{id}/timesavers",
            axum::routing::get(|| async {
                axum::Json(json!({
                    "success": true,
                    "data": { "timeSavers": [{ "id": 3, "title": "Digest" }] }
                }))
            }),
        );
        let service = AiMlService::new(client_for(router).await);
        let linked = service.get_linked_time_savers("5").await;
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].title, "Digest");
    }

    #[tokio::test]
    async fn test_news_errors_propagate() {
        let service = AiMlService::new(client_for(failing_backend()).await);
        let err = service.get_news(&AiMlFilters::default()).await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.message(), "Backend down");
    }
}
