//! Accounts Service
//!
//! Telegram account CRUD, account-level backend actions, the login
//! endpoints driven by [`crate::login`], and proxy auto-assignment.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::api::dto::{
    Account, AccountPassword, AccountUpdate, BulkResponse, ChannelIndexResult, LoginResponse,
    LoginStart, MessageResponse, Proxy,
};
use crate::api::{ApiClient, ApiResult, Query};
use crate::bulk::{fan_out, BulkReport};
use crate::login::LoginApi;
use crate::session::Access;

/// Strip everything but digits and prefix `+`. `None` when no digits remain.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        None
    } else {
        Some(format!("+{}", digits))
    }
}

/// Accounts linked to `proxy_name`
pub fn filter_by_proxy<'a>(accounts: &'a [Account], proxy_name: &str) -> Vec<&'a Account> {
    accounts
        .iter()
        .filter(|a| a.proxy_names.iter().any(|p| p == proxy_name))
        .collect()
}

/// Pair every proxy-less account with the active proxy carrying the fewest
/// accounts. Assignments made earlier in the batch count towards the load.
/// Ties go to the proxy listed first.
pub fn plan_proxy_assignment(accounts: &[Account], proxies: &[Proxy]) -> Vec<(String, String)> {
    let mut load: Vec<(&str, u64)> = proxies
        .iter()
        .filter(|p| p.is_active)
        .map(|p| (p.proxy_name.as_str(), p.load()))
        .collect();

    if load.is_empty() {
        return Vec::new();
    }

    let mut plan = Vec::new();
    for account in accounts.iter().filter(|a| a.proxy_names.is_empty()) {
        let mut best = 0;
        for (i, (_, count)) in load.iter().enumerate() {
            if *count < load[best].1 {
                best = i;
            }
        }
        load[best].1 += 1;
        plan.push((account.phone_number.clone(), load[best].0.to_string()));
    }
    plan
}

#[derive(Clone)]
pub struct AccountsService {
    client: ApiClient,
}

impl AccountsService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn path(phone: &str) -> String {
        format!("/accounts/{}", ApiClient::segment(phone))
    }

    /// List accounts, optionally filtered by phone number
    pub async fn list(&self, phone_number: Option<&str>) -> ApiResult<Vec<Account>> {
        let mut query = Query::new();
        if let Some(phone) = phone_number.filter(|p| !p.is_empty()) {
            query.push(("phone_number", phone.to_string()));
        }
        self.client.get("/accounts", &query).await
    }

    pub async fn get(&self, phone_number: &str) -> ApiResult<Account> {
        self.client.get(&Self::path(phone_number), &Query::new()).await
    }

    pub async fn create(&self, account: &Account) -> ApiResult<MessageResponse> {
        self.client.post_json("/accounts", account).await
    }

    pub async fn update(
        &self,
        phone_number: &str,
        update: &AccountUpdate,
    ) -> ApiResult<MessageResponse> {
        self.client.put_json(&Self::path(phone_number), update).await
    }

    pub async fn delete(&self, phone_number: &str) -> ApiResult<MessageResponse> {
        self.client.delete(&Self::path(phone_number)).await
    }

    pub async fn bulk_create(&self, accounts: &[Account]) -> ApiResult<BulkResponse> {
        self.client.post_json("/accounts/bulk", accounts).await
    }

    pub async fn bulk_delete(&self, phone_numbers: &[String]) -> ApiResult<BulkResponse> {
        self.client.delete_json("/accounts/bulk", phone_numbers).await
    }

    /// Delete accounts one by one with bounded concurrency
    pub async fn delete_many(
        &self,
        phone_numbers: Vec<String>,
        concurrency: usize,
    ) -> BulkReport<String, MessageResponse> {
        fan_out(phone_numbers, concurrency, |phone| async move {
            self.delete(&phone).await
        })
        .await
    }

    /// Ask the backend to validate the account's Telegram session
    pub async fn validate(&self, phone_number: &str) -> ApiResult<MessageResponse> {
        let path = format!("{}/validate", Self::path(phone_number));
        self.client.post_json(&path, &serde_json::json!({})).await
    }

    /// Index the channels the account is subscribed to
    pub async fn index_channels(&self, phone_number: &str) -> ApiResult<ChannelIndexResult> {
        let path = format!("{}/index-channels", Self::path(phone_number));
        self.client.post_json(&path, &serde_json::json!({})).await
    }

    /// Stored account password (admin only)
    pub async fn password(&self, phone_number: &str) -> ApiResult<AccountPassword> {
        self.client.session().check(Access::Admin).await?;
        let path = format!("{}/password", Self::path(phone_number));
        self.client.get(&path, &Query::new()).await
    }

    /// Give every proxy-less account in `accounts` the least-loaded active proxy
    pub async fn auto_assign_proxies(
        &self,
        accounts: &[Account],
        proxies: &[Proxy],
        concurrency: usize,
    ) -> BulkReport<String, String> {
        let plan: HashMap<String, String> =
            plan_proxy_assignment(accounts, proxies).into_iter().collect();
        let phones: Vec<String> = accounts
            .iter()
            .filter(|a| plan.contains_key(&a.phone_number))
            .map(|a| a.phone_number.clone())
            .collect();

        tracing::info!(accounts = phones.len(), "Auto-assigning proxies");

        let plan = &plan;
        fan_out(phones, concurrency, |phone| async move {
            let proxy = plan.get(&phone).cloned().unwrap_or_default();
            let update = AccountUpdate {
                proxy_names: Some(vec![proxy.clone()]),
                ..Default::default()
            };
            self.update(&phone, &update).await?;
            Ok::<_, crate::api::ApiError>(proxy)
        })
        .await
    }
}

#[async_trait]
impl LoginApi for AccountsService {
    async fn start(&self, request: &LoginStart) -> ApiResult<LoginResponse> {
        let mut query: Query = vec![("phone_number", request.phone_number.clone())];
        if let Some(password) = request.password.as_ref().filter(|p| !p.is_empty()) {
            query.push(("password", password.clone()));
        }
        if let Some(name) = request.session_name.as_ref().filter(|s| !s.is_empty()) {
            query.push(("session_name", name.clone()));
        }
        if let Some(notes) = request.notes.as_ref().filter(|n| !n.is_empty()) {
            query.push(("notes", notes.clone()));
        }
        self.client.post_query("/accounts/create/start", &query).await
    }

    async fn verify(
        &self,
        session_id: &str,
        code: Option<&str>,
        password_2fa: Option<&str>,
    ) -> ApiResult<LoginResponse> {
        let mut query: Query = vec![("login_session_id", session_id.to_string())];
        if let Some(code) = code {
            query.push(("code", code.to_string()));
        }
        if let Some(password) = password_2fa {
            query.push(("password_2fa", password.to_string()));
        }
        self.client.post_query("/accounts/create/verify", &query).await
    }

    async fn status(&self, session_id: &str) -> ApiResult<LoginResponse> {
        let query: Query = vec![("login_session_id", session_id.to_string())];
        self.client.get("/accounts/create/status", &query).await
    }
}
