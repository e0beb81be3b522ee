//! LikeBot REST API Client
//!
//! HTTP client for communicating with the LikeBot backend. Attaches the
//! bearer token from the session store and applies the backend-wide status
//! handling (401 logs the operator out, 403 is logged as a warning).

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use super::error::{ApiError, ApiResult};
use crate::config::Config;
use crate::session::SessionStore;

/// Query parameters as sent on the wire
pub type Query = Vec<(&'static str, String)>;

/// LikeBot REST API client. Cheap to clone.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

struct Inner {
    http: Client,
    base_url: String,
    session: Arc<SessionStore>,
}

impl ApiClient {
    /// Create a client for `base_url` with the given request timeout
    pub fn new(
        base_url: &str,
        timeout: Duration,
        session: Arc<SessionStore>,
    ) -> ApiResult<Self> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base_url: base_url.trim_end_matches('/').to_string(),
                session,
            }),
        })
    }

    /// Create a client from configuration, loading the session file
    pub fn from_config(config: &Config) -> ApiResult<Self> {
        let session = Arc::new(SessionStore::load(&config.session.file));
        Self::new(
            &config.api.url,
            Duration::from_secs(config.api.request_timeout_secs),
            session,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.inner.session
    }

    /// Percent-encode a user-supplied path segment
    pub fn segment(value: &str) -> String {
        urlencoding::encode(value).into_owned()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.inner.base_url, path)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &Query) -> ApiResult<T> {
        let request = self.inner.http.get(self.url(path)).query(query);
        self.send(request).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.inner.http.post(self.url(path)).json(body);
        self.send(request).await
    }

    /// POST with parameters in the query string and an empty body
    pub async fn post_query<T: DeserializeOwned>(&self, path: &str, query: &Query) -> ApiResult<T> {
        let request = self.inner.http.post(self.url(path)).query(query);
        self.send(request).await
    }

    /// POST an `application/x-www-form-urlencoded` body
    pub async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, &str)],
    ) -> ApiResult<T> {
        let request = self.inner.http.post(self.url(path)).form(form);
        self.send(request).await
    }

    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &Query,
        form: reqwest::multipart::Form,
    ) -> ApiResult<T> {
        let request = self
            .inner
            .http
            .post(self.url(path))
            .query(query)
            .multipart(form);
        self.send(request).await
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.inner.http.put(self.url(path)).json(body);
        self.send(request).await
    }

    /// PUT with parameters in the query string and an empty body
    pub async fn put_query<T: DeserializeOwned>(&self, path: &str, query: &Query) -> ApiResult<T> {
        let request = self.inner.http.put(self.url(path)).query(query);
        self.send(request).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let request = self.inner.http.delete(self.url(path));
        self.send(request).await
    }

    /// DELETE with a JSON body (bulk deletes)
    pub async fn delete_json<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.inner.http.delete(self.url(path)).json(body);
        self.send(request).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        let request = match self.inner.session.token().await {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();
        let url = response.url().path().to_string();
        let body = response.text().await?;

        if status.is_success() {
            return decode_body(&body);
        }

        tracing::debug!(status = status.as_u16(), path = %url, "Request rejected");

        match status {
            StatusCode::UNAUTHORIZED => {
                tracing::warn!(path = %url, "Unauthorized, clearing session");
                if let Err(e) = self.inner.session.clear().await {
                    tracing::warn!(error = %e, "Failed to clear session file");
                }
            }
            StatusCode::FORBIDDEN => {
                tracing::warn!(path = %url, "Access forbidden - user may not be verified");
            }
            _ => {}
        }

        Err(ApiError::from_status(status.as_u16(), &body))
    }
}

/// Empty success bodies decode as JSON `null`
fn decode_body<T: DeserializeOwned>(body: &str) -> ApiResult<T> {
    let result = if body.trim().is_empty() {
        serde_json::from_value(serde_json::Value::Null)
    } else {
        serde_json::from_str(body)
    };
    result.map_err(|e| ApiError::Decode(e.to_string()))
}
