//! Proxies Service
//!
//! Proxy CRUD plus the backend's text-file import and connectivity test.
//! Create/update fields travel as query parameters; responses are
//! normalized by [`Proxy`]'s deserializer.

use reqwest::multipart::{Form, Part};
use std::path::Path;

use crate::api::dto::{
    MessageResponse, NewProxy, Proxy, ProxyImportOptions, ProxyImportResult, ProxyStats,
    ProxyTestResult, ProxyUpdate,
};
use crate::api::{ApiClient, ApiResult, Query};
use crate::bulk::{fan_out, BulkReport};

#[derive(Debug, Clone, Default)]
pub struct ProxyFilter {
    pub proxy_name: Option<String>,
    pub active_only: Option<bool>,
}

#[derive(Clone)]
pub struct ProxiesService {
    client: ApiClient,
}

impl ProxiesService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn path(name: &str) -> String {
        format!("/proxies/{}", ApiClient::segment(name))
    }

    pub async fn list(&self, filter: &ProxyFilter) -> ApiResult<Vec<Proxy>> {
        let mut query = Query::new();
        if let Some(name) = filter.proxy_name.as_ref().filter(|n| !n.is_empty()) {
            query.push(("proxy_name", name.clone()));
        }
        if let Some(active) = filter.active_only {
            query.push(("active_only", active.to_string()));
        }
        self.client.get("/proxies", &query).await
    }

    pub async fn get(&self, proxy_name: &str) -> ApiResult<Proxy> {
        self.client.get(&Self::path(proxy_name), &Query::new()).await
    }

    pub async fn create(&self, proxy: &NewProxy) -> ApiResult<MessageResponse> {
        let mut query: Query = vec![
            ("proxy_name", proxy.proxy_name.clone()),
            ("proxy_type", proxy.proxy_type.clone()),
            ("host", proxy.host.clone()),
            ("port", proxy.port.to_string()),
        ];
        if let Some(username) = proxy.username.as_ref().filter(|u| !u.is_empty()) {
            query.push(("username", username.clone()));
        }
        if let Some(password) = proxy.password.as_ref().filter(|p| !p.is_empty()) {
            query.push(("password", password.clone()));
        }
        if let Some(active) = proxy.is_active {
            query.push(("active", active.to_string()));
        }
        if let Some(notes) = &proxy.notes {
            query.push(("notes", notes.clone()));
        }
        self.client.post_query("/proxies", &query).await
    }

    pub async fn update(&self, proxy_name: &str, update: &ProxyUpdate) -> ApiResult<MessageResponse> {
        let mut query = Query::new();
        if let Some(kind) = update.proxy_type.as_ref().filter(|t| !t.is_empty()) {
            query.push(("proxy_type", kind.clone()));
        }
        if let Some(host) = update.host.as_ref().filter(|h| !h.is_empty()) {
            query.push(("host", host.clone()));
        }
        if let Some(port) = update.port.filter(|p| *p != 0) {
            query.push(("port", port.to_string()));
        }
        // Empty strings clear credentials and notes
        if let Some(username) = &update.username {
            query.push(("username", username.clone()));
        }
        if let Some(password) = &update.password {
            query.push(("password", password.clone()));
        }
        if let Some(active) = update.is_active {
            query.push(("active", active.to_string()));
        }
        if let Some(notes) = &update.notes {
            query.push(("notes", notes.clone()));
        }
        self.client.put_query(&Self::path(proxy_name), &query).await
    }

    pub async fn delete(&self, proxy_name: &str) -> ApiResult<MessageResponse> {
        self.client.delete(&Self::path(proxy_name)).await
    }

    pub async fn stats(&self) -> ApiResult<ProxyStats> {
        self.client.get("/proxies/stats/summary", &Query::new()).await
    }

    /// Upload a proxy list to the backend's own importer
    pub async fn import_file(
        &self,
        path: &Path,
        options: &ProxyImportOptions,
    ) -> ApiResult<ProxyImportResult> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "proxies.txt".to_string());
        self.import_bytes(bytes, &file_name, options).await
    }

    pub async fn import_bytes(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        options: &ProxyImportOptions,
    ) -> ApiResult<ProxyImportResult> {
        let mut query = Query::new();
        if let Some(kind) = options.proxy_type.as_ref().filter(|t| !t.is_empty()) {
            query.push(("proxy_type", kind.clone()));
        }
        if let Some(base) = options.base_name.as_ref().filter(|b| !b.is_empty()) {
            query.push(("base_name", base.clone()));
        }
        if let Some(dry_run) = options.dry_run {
            query.push(("dry_run", dry_run.to_string()));
        }

        let part = Part::bytes(bytes).file_name(file_name.to_string());
        let form = Form::new().part("proxy_file", part);
        self.client.post_multipart("/proxies/import", &query, form).await
    }

    /// Backend-side connectivity test
    pub async fn test(
        &self,
        proxy_name: &str,
        test_url: Option<&str>,
        timeout_seconds: Option<u64>,
    ) -> ApiResult<ProxyTestResult> {
        let mut query = Query::new();
        if let Some(url) = test_url.filter(|u| !u.is_empty()) {
            query.push(("test_url", url.to_string()));
        }
        if let Some(timeout) = timeout_seconds {
            query.push(("timeout_seconds", timeout.to_string()));
        }
        self.client
            .post_query(&format!("{}/test", Self::path(proxy_name)), &query)
            .await
    }

    /// Create proxies one by one with bounded concurrency
    pub async fn create_many(
        &self,
        proxies: Vec<NewProxy>,
        concurrency: usize,
    ) -> BulkReport<String, MessageResponse> {
        let names: Vec<String> = proxies.iter().map(|p| p.proxy_name.clone()).collect();
        let proxies = &proxies;
        fan_out(names, concurrency, |name| async move {
            match proxies.iter().find(|p| p.proxy_name == name) {
                Some(proxy) => self.create(proxy).await,
                None => Err(crate::api::ApiError::Validation(format!(
                    "Unknown proxy {}",
                    name
                ))),
            }
        })
        .await
    }
}
