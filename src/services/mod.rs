//! Typed wrappers over the REST endpoints, one module per resource family.
//!
//! Services only translate: filters in, normalized payloads out. They never
//! cache; that is the query layer's job.

pub mod ai_ml;
pub mod articles;
pub mod auth;
pub mod time_saver;
pub mod users;

use lines_common::{Page, Pagination};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::errors::ApiError;
use crate::http::{HttpClient, RequestOptions};

pub use ai_ml::AiMlService;
pub use articles::ArticlesService;
pub use auth::AuthService;
pub use time_saver::TimeSaverService;
pub use users::UsersService;

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Decode a list payload. The server wraps items under a resource-specific
/// field (`articles`, `content`, `favorites`, ...) next to a `pagination`
/// block; a bare array is accepted too.
pub(crate) fn page_from<T: DeserializeOwned>(data: Value, field: &str) -> Result<Page<T>, ApiError> {
    match data {
        Value::Array(_) => {
            let items: Vec<T> = decode(data)?;
            let pagination = Pagination {
                total_count: items.len() as u64,
                total_pages: 1,
                limit: items.len() as u32,
                ..Pagination::default()
            };
            Ok(Page::new(items, pagination))
        }
        Value::Object(mut map) => {
            let items = match map.remove(field) {
                Some(Value::Null) | None => Vec::new(),
                Some(items) => decode(items)?,
            };
            let pagination = match map.remove("pagination") {
                Some(Value::Null) | None => Pagination::default(),
                Some(p) => decode(p)?,
            };
            Ok(Page::new(items, pagination))
        }
        Value::Null => Ok(Page::empty()),
        other => Err(ApiError::Decode(format!("expected a list payload, got {}", other))),
    }
}

/// Decode a payload wrapped under `field` (`{"article": {...}}`), falling
/// back to the whole value when the wrapper is absent.
pub(crate) fn field_from<T: DeserializeOwned>(data: Value, field: &str) -> Result<T, ApiError> {
    match data {
        Value::Object(mut map) if map.contains_key(field) => {
            decode(map.remove(field).unwrap_or(Value::Null))
        }
        other => decode(other),
    }
}

/// POST a best-effort tracking event. Failures are logged and yield `None`.
pub(crate) async fn track(http: &HttpClient, path: &str, body: Value) -> Option<Value> {
    let result = async {
        let opts = RequestOptions::new().json(&body)?;
        let raw = http.post(path, opts).await?;
        Ok::<_, ApiError>(raw.optional_data::<Value>()?.unwrap_or(Value::Null))
    }
    .await;
    match result {
        Ok(data) => Some(data),
        Err(e) => {
            warn!(path, error = %e, "Tracking call failed");
            None
        }
    }
}

/// Serve `router` under `/api` on an ephemeral port and return a client for
/// it.
#[cfg(test)]
pub(crate) async fn client_for(router: axum::Router) -> HttpClient {
    use std::sync::Arc;

    use crate::config::ClientConfig;
    use crate::session::{MemoryTokenStore, SessionStore};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, axum::Router::new().nest("/api", router))
            .await
            .unwrap();
    });
    let config = ClientConfig::default().with_base_url(format!("http://{}/api", addr));
    HttpClient::new(&config, SessionStore::new(), Arc::new(MemoryTokenStore::new())).unwrap()
}

/// A backend where every endpoint fails with a 500.
#[cfg(test)]
pub(crate) fn failing_backend() -> axum::Router {
    use axum::http::StatusCode;

    axum::Router::new().fallback(|| async {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            axum::Json(serde_json::json!({ "success": false, "message": "Backend down" })),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lines_common::Article;
    use serde_json::json;

    #[test]
    fn test_page_from_wrapped_list() {
        let data = json!({
            "articles": [{"id": 1, "title": "One"}, {"id": "2", "headline": "Two"}],
            "pagination": {"currentPage": 2, "totalPages": 5, "total": 50, "limit": 10}
        });
        let page: Page<Article> = page_from(data, "articles").unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page.items[1].title, "Two");
        assert_eq!(page.pagination.page, 2);
        assert!(page.pagination.has_next());
    }

    #[test]
    fn test_page_from_bare_array() {
        let page: Page<Article> = page_from(json!([{"id": 7, "title": "Only"}]), "articles").unwrap();
        assert_eq!(page.pagination.total_count, 1);
        assert!(!page.pagination.has_next());
    }

    #[test]
    fn test_page_from_missing_field_is_empty() {
        let page: Page<Article> = page_from(json!({"pagination": null}), "articles").unwrap();
        assert!(page.is_empty());
    }

    #[test]
    fn test_page_from_rejects_scalar() {
        assert!(page_from::<Article>(json!(3), "articles").is_err());
    }

    #[tokio::test]
    async fn test_track_swallows_failures() {
        let http = client_for(failing_backend()).await;
        assert_eq!(track(&http, "/articles/1/view", json!({})).await, None);
    }

    #[tokio::test]
    async fn test_track_returns_payload() {
        let router = axum::Router::new().route(
            "/articles/{id}/view",
            axum::routing::post(|| async {
                axum::Json(json!({ "success": true, "data": { "viewCount": 9 } }))
            }),
        );
        let http = client_for(router).await;
        let data = track(&http, "/articles/1/view", json!({})).await.unwrap();
        assert_eq!(data["viewCount"], 9);
    }

    #[test]
    fn test_field_from_wrapped_and_bare() {
        let wrapped: Article = field_from(json!({"article": {"id": 1, "title": "A"}}), "article").unwrap();
        let bare: Article = field_from(json!({"id": 1, "title": "A"}), "article").unwrap();
        assert_eq!(wrapped, bare);
    }
}
