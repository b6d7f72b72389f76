use lines_common::{Article, Category, Page};
use serde::Serialize;
use serde_json::Value;

use super::{field_from, page_from};
use crate::errors::ApiError;
use crate::http::{HttpClient, RequestOptions};

/// Query filters for `GET /articles` and the category listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleFilters {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub category: Option<String>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
    pub search: Option<String>,
    /// Only sent when set; `featured=false` would filter featured stories out.
    #[serde(skip_serializing_if = "is_false")]
    pub featured: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub q: String,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub category: Option<String>,
}

/// Result of sharing an article.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShareResult {
    pub share_count: u64,
    pub share_url: Option<String>,
}

/// `GET /articles`, `/search`, `/categories` and friends.
#[derive(Clone)]
pub struct ArticlesService {
    http: HttpClient,
}

impl ArticlesService {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub async fn get_articles(&self, filters: &ArticleFilters) -> Result<Page<Article>, ApiError> {
        let opts = RequestOptions::new().params_from(filters)?;
        let data: Value = self.http.get_data("/articles", opts).await?;
        page_from(data, "articles")
    }

    /// Fetch one article. With `track_view` the server counts a view.
    pub async fn get_article_by_id(&self, id: &str, track_view: bool) -> Result<Article, ApiError> {
        let opts = RequestOptions::new().param("trackView", track_view);
        let data: Value = self.http.get_data(&format!("/articles/{}", id), opts).await?;
        field_from(data, "article")
    }

    pub async fn search_articles(&self, params: &SearchParams) -> Result<Page<Article>, ApiError> {
        let opts = RequestOptions::new().params_from(params)?;
        let data: Value = self.http.get_data("/search", opts).await?;
        page_from(data, "articles")
    }

    pub async fn get_trending_articles(&self, limit: u32) -> Result<Vec<Article>, ApiError> {
        let opts = RequestOptions::new().param("limit", limit);
        let data: Value = self.http.get_data("/articles/trending/list", opts).await?;
        Ok(page_from(data, "articles")?.items)
    }

    pub async fn share_article(&self, id: &str) -> Result<ShareResult, ApiError> {
        let raw = self
            .http
            .post(&format!("/articles/{}/share", id), RequestOptions::new())
            .await?;
        Ok(raw.optional_data()?.unwrap_or_default())
    }

    pub async fn get_categories(&self) -> Result<Vec<Category>, ApiError> {
        let data: Value = self.http.get_data("/categories", RequestOptions::new()).await?;
        field_from(data, "categories")
    }

    pub async fn get_articles_by_category(
        &self,
        category: &str,
        filters: &ArticleFilters,
    ) -> Result<Page<Article>, ApiError> {
        let opts = RequestOptions::new().params_from(filters)?;
        let data: Value = self
            .http
            .get_data(&format!("/categories/{}/articles", category), opts)
            .await?;
        page_from(data, "articles")
    }

    /// `POST /search/advanced` with a free-form criteria body.
    pub async fn advanced_search(&self, criteria: &Value) -> Result<Page<Article>, ApiError> {
        let opts = RequestOptions::new().json(criteria)?;
        let data: Value = self.http.post("/search/advanced", opts).await?.data()?;
        page_from(data, "articles")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filters_send_nothing() {
        let opts = RequestOptions::new()
            .params_from(&ArticleFilters::default())
            .unwrap();
        assert!(opts.params.is_empty());
    }

    #[test]
    fn test_filters_use_camel_case_keys() {
        let filters = ArticleFilters {
            page: Some(2),
            sort_by: Some("publishedAt".into()),
            featured: true,
            ..Default::default()
        };
        let opts = RequestOptions::new().params_from(&filters).unwrap();
        assert!(opts.params.contains(&("sortBy".to_string(), "publishedAt".to_string())));
        assert!(opts.params.contains(&("featured".to_string(), "true".to_string())));
        assert!(opts.params.contains(&("page".to_string(), "2".to_string())));
    }
}
