use std::sync::Arc;

use lines_common::envelope::EnvelopeError;
use lines_common::{Envelope, FieldError, TokenPair};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::errors::ApiError;
use crate::session::{SessionStore, TokenStore};

const REFRESH_PATH: &str = "/auth/refresh";

/// Paths where a 401 means bad credentials, not an expired access token.
const NO_REFRESH_PREFIXES: &[&str] = &["/auth/login", "/auth/refresh", "/auth/register"];

/// Query parameters and JSON body of one request.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub params: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    /// Flatten a filter struct into query parameters. Nulls and empty
    /// strings are dropped; nested values are sent as JSON text.
    pub fn params_from<T: Serialize>(mut self, filters: &T) -> Result<Self, ApiError> {
        let value =
            serde_json::to_value(filters).map_err(|e| ApiError::Decode(e.to_string()))?;
        if let serde_json::Value::Object(map) = value {
            for (key, value) in map {
                match value {
                    serde_json::Value::Null => {}
                    serde_json::Value::String(s) if s.is_empty() => {}
                    serde_json::Value::String(s) => self.params.push((key, s)),
                    other => self.params.push((key, other.to_string())),
                }
            }
        }
        Ok(self)
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, ApiError> {
        self.body =
            Some(serde_json::to_value(body).map_err(|e| ApiError::Decode(e.to_string()))?);
        Ok(self)
    }
}

/// A successful (2xx) response, body not yet decoded.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_str(&self.body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Decode the `{success, data, message}` envelope and return its payload.
    pub fn data<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        Ok(self.json::<Envelope<T>>()?.into_data()?)
    }

    /// Like [`data`](Self::data) for endpoints that may omit the payload.
    pub fn optional_data<T: DeserializeOwned>(&self) -> Result<Option<T>, ApiError> {
        if self.body.trim().is_empty() {
            return Ok(None);
        }
        match self.json::<Envelope<T>>()?.into_data() {
            Ok(data) => Ok(Some(data)),
            Err(EnvelopeError::MissingData) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Decode an envelope whose payload is irrelevant; returns the message.
    pub fn ack(&self) -> Result<Option<String>, ApiError> {
        if self.body.trim().is_empty() {
            return Ok(None);
        }
        Ok(self.json::<Envelope<serde_json::Value>>()?.into_ack()?)
    }
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshPayload {
    #[serde(alias = "token")]
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Error payload. `errors` is kept loose; its items are read field by field
/// so an unfamiliar shape never costs the server message.
#[derive(Default, serde::Deserialize)]
struct ErrorBody {
    #[serde(default, alias = "error")]
    message: Option<String>,
    #[serde(default)]
    errors: serde_json::Value,
}

impl ErrorBody {
    fn field_errors(&self) -> Vec<FieldError> {
        use serde_json::Value;

        fn text(item: &Value, names: &[&str]) -> Option<String> {
            names
                .iter()
                .find_map(|name| item.get(name).and_then(Value::as_str))
                .map(str::to_string)
        }

        match &self.errors {
            Value::Array(items) => items
                .iter()
                .filter_map(|item| match item {
                    Value::String(message) => Some(FieldError {
                        field: String::new(),
                        message: message.clone(),
                    }),
                    _ => Some(FieldError {
                        field: text(item, &["field", "path", "param"]).unwrap_or_default(),
                        message: text(item, &["message", "msg"])?,
                    }),
                })
                .collect(),
            Value::Object(map) => map
                .iter()
                .filter_map(|(field, message)| {
                    Some(FieldError {
                        field: field.clone(),
                        message: message.as_str()?.to_string(),
                    })
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

struct ClientInner {
    http: reqwest::Client,
    base_url: String,
    session: SessionStore,
    tokens: Arc<dyn TokenStore>,
    /// Serializes refreshes so concurrent 401s rotate the token once.
    refresh_lock: tokio::sync::Mutex<()>,
}

/// The single configured HTTP client every service module goes through.
///
/// Injects `Authorization: Bearer <access token>` from the session and, on a
/// 401, refreshes the token once and replays the request once.
#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<ClientInner>,
}

impl HttpClient {
    pub fn new(
        config: &ClientConfig,
        session: SessionStore,
        tokens: Arc<dyn TokenStore>,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.api.user_agent.clone())
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                base_url: config.api.base_url.trim_end_matches('/').to_string(),
                session,
                tokens,
                refresh_lock: tokio::sync::Mutex::new(()),
            }),
        })
    }

    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    pub fn token_store(&self) -> &Arc<dyn TokenStore> {
        &self.inner.tokens
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Send a request. Non-2xx statuses come back as `Err(ApiError)`.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        opts: RequestOptions,
    ) -> Result<RawResponse, ApiError> {
        let sent_token = self.inner.session.access_token();
        let (status, body) = self
            .send_once(&method, path, &opts, sent_token.as_deref())
            .await?;

        if status == StatusCode::UNAUTHORIZED && refreshable(path) && sent_token.is_some() {
            self.refresh_after(sent_token.as_deref()).await?;
            let token = self.inner.session.access_token();
            let (status, body) = self
                .send_once(&method, path, &opts, token.as_deref())
                .await?;
            return into_result(status, body);
        }

        into_result(status, body)
    }

    pub async fn get(&self, path: &str, opts: RequestOptions) -> Result<RawResponse, ApiError> {
        self.request(Method::GET, path, opts).await
    }

    pub async fn post(&self, path: &str, opts: RequestOptions) -> Result<RawResponse, ApiError> {
        self.request(Method::POST, path, opts).await
    }

    pub async fn put(&self, path: &str, opts: RequestOptions) -> Result<RawResponse, ApiError> {
        self.request(Method::PUT, path, opts).await
    }

    pub async fn delete(&self, path: &str, opts: RequestOptions) -> Result<RawResponse, ApiError> {
        self.request(Method::DELETE, path, opts).await
    }

    /// `GET` and unwrap the envelope payload.
    pub async fn get_data<T: DeserializeOwned>(
        &self,
        path: &str,
        opts: RequestOptions,
    ) -> Result<T, ApiError> {
        self.get(path, opts).await?.data()
    }

    async fn send_once(
        &self,
        method: &Method,
        path: &str,
        opts: &RequestOptions,
        token: Option<&str>,
    ) -> Result<(StatusCode, String), ApiError> {
        let url = format!("{}{}", self.inner.base_url, path);
        let request_id = Uuid::new_v4().to_string();

        let mut builder = self
            .inner
            .http
            .request(method.clone(), &url)
            .header("Accept", "application/json")
            .header("X-Request-Id", &request_id);
        if !opts.params.is_empty() {
            builder = builder.query(&opts.params);
        }
        if let Some(body) = &opts.body {
            builder = builder.json(body);
        }
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }

        let resp = builder.send().await.map_err(|e| {
            warn!(%method, path, request_id = %request_id, error = %e, "Request failed before a response");
            ApiError::from(e)
        })?;
        let status = resp.status();
        debug!(%method, path, request_id = %request_id, status = status.as_u16(), "Request completed");
        let body = resp.text().await.map_err(ApiError::from)?;
        Ok((status, body))
    }

    /// Refresh the access token unless another caller already rotated the
    /// one this request was sent with.
    async fn refresh_after(&self, sent_token: Option<&str>) -> Result<(), ApiError> {
        let _guard = self.inner.refresh_lock.lock().await;

        let current = self.inner.session.access_token();
        if current.is_some() && current.as_deref() != sent_token {
            debug!("Token already rotated by a concurrent request");
            return Ok(());
        }

        let Some(refresh_token) = self.inner.session.refresh_token() else {
            return Err(self.expire_session().await);
        };

        let opts = RequestOptions::new()
            .json(&serde_json::json!({ "refreshToken": refresh_token }))?;
        let outcome = match self.send_once(&Method::POST, REFRESH_PATH, &opts, None).await {
            Ok((status, body)) => {
                into_result(status, body).and_then(|raw| raw.data::<RefreshPayload>())
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(payload) => {
                let tokens = TokenPair {
                    access_token: payload.access_token,
                    refresh_token: payload.refresh_token.unwrap_or(refresh_token),
                };
                if !self.inner.session.rotate_tokens(tokens.clone()) {
                    return Err(ApiError::Unauthorized {
                        message: "Signed out during token refresh".to_string(),
                    });
                }
                if let Err(e) = self.inner.tokens.save(&tokens).await {
                    warn!(error = %e, "Failed to persist refreshed tokens");
                }
                info!("Access token refreshed");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                Err(self.expire_session().await)
            }
        }
    }

    async fn expire_session(&self) -> ApiError {
        self.inner.session.sign_out();
        if let Err(e) = self.inner.tokens.clear().await {
            warn!(error = %e, "Failed to clear persisted tokens");
        }
        ApiError::Unauthorized {
            message: "Your session has expired. Please sign in again.".to_string(),
        }
    }
}

fn refreshable(path: &str) -> bool {
    !NO_REFRESH_PREFIXES.iter().any(|p| path.starts_with(p))
}

fn into_result(status: StatusCode, body: String) -> Result<RawResponse, ApiError> {
    if status.is_success() {
        return Ok(RawResponse {
            status: status.as_u16(),
            body,
        });
    }
    let parsed: ErrorBody = serde_json::from_str(&body).unwrap_or_default();
    let fields = parsed.field_errors();
    Err(ApiError::from_status(status.as_u16(), parsed.message, fields))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Filters {
        page: u32,
        category: String,
        featured: bool,
        search: Option<String>,
    }

    #[test]
    fn test_params_from_skips_empty_and_null() {
        let opts = RequestOptions::new()
            .params_from(&Filters {
                page: 2,
                category: String::new(),
                featured: true,
                search: None,
            })
            .unwrap();
        assert_eq!(
            opts.params,
            vec![
                ("page".to_string(), "2".to_string()),
                ("featured".to_string(), "true".to_string()),
            ]
        );
    }

    #[test]
    fn test_param_builder_appends() {
        let opts = RequestOptions::new().param("limit", 5).param("q", "llm");
        assert_eq!(opts.params.len(), 2);
        assert_eq!(opts.params[1], ("q".to_string(), "llm".to_string()));
    }

    #[test]
    fn test_refreshable_excludes_auth_endpoints() {
        assert!(!refreshable("/auth/login"));
        assert!(!refreshable("/auth/refresh"));
        assert!(!refreshable("/auth/register/verify-otp"));
        assert!(refreshable("/auth/me"));
        assert!(refreshable("/favorites"));
    }

    #[test]
    fn test_into_result_maps_error_body() {
        let body = r#"{"success":false,"message":"Invalid email",
            "errors":[{"field":"email","message":"Invalid email"}]}"#;
        let err = into_result(StatusCode::BAD_REQUEST, body.to_string()).unwrap_err();
        assert_eq!(err.message(), "Invalid email");
        assert_eq!(err.field_errors().len(), 1);
    }

    #[test]
    fn test_into_result_keeps_message_with_unfamiliar_errors() {
        let body = r#"{"success":false,"message":"Email already registered",
            "errors":[{"msg":"Invalid value","path":"email"},{"location":"body"},"Too short"]}"#;
        let err = into_result(StatusCode::BAD_REQUEST, body.to_string()).unwrap_err();
        assert_eq!(err.message(), "Email already registered");
        assert_eq!(
            err.field_errors(),
            &[
                FieldError {
                    field: "email".to_string(),
                    message: "Invalid value".to_string(),
                },
                FieldError {
                    field: String::new(),
                    message: "Too short".to_string(),
                },
            ]
        );

        let keyed = r#"{"message":"Check the form","errors":{"password":"Too weak"}}"#;
        let err = into_result(StatusCode::UNPROCESSABLE_ENTITY, keyed.to_string()).unwrap_err();
        assert_eq!(err.message(), "Check the form");
        assert_eq!(err.field_errors()[0].field, "password");

        let scalar = r#"{"message":"Bad input","errors":"nope"}"#;
        let err = into_result(StatusCode::BAD_REQUEST, scalar.to_string()).unwrap_err();
        assert_eq!(err.message(), "Bad input");
        assert!(err.field_errors().is_empty());
    }

    #[test]
    fn test_into_result_non_json_error_body() {
        let err = into_result(StatusCode::BAD_GATEWAY, "<html>".to_string()).unwrap_err();
        assert!(matches!(err, ApiError::Server { status: 502, .. }));
    }

    #[test]
    fn test_raw_response_unwraps_envelope() {
        let raw = RawResponse {
            status: 200,
            body: r#"{"success":true,"data":{"count":4}}"#.to_string(),
        };
        let data: serde_json::Value = raw.data().unwrap();
        assert_eq!(data["count"], 4);
    }

    #[test]
    fn test_optional_data_tolerates_missing_payload() {
        let raw = RawResponse {
            status: 200,
            body: r#"{"success":true,"message":"Shared"}"#.to_string(),
        };
        assert_eq!(raw.optional_data::<serde_json::Value>().unwrap(), None);

        let rejected = RawResponse {
            status: 200,
            body: r#"{"success":false,"message":"Nope"}"#.to_string(),
        };
        assert!(rejected.optional_data::<serde_json::Value>().is_err());
    }

    #[test]
    fn test_raw_response_empty_ack() {
        let raw = RawResponse {
            status: 204,
            body: String::new(),
        };
        assert_eq!(raw.ack().unwrap(), None);
    }
}
