//! Data Transfer Objects
//!
//! Request and response types for the LikeBot REST API.
//! Unknown fields sent by the backend are ignored.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

// ============================================
// COMMON
// ============================================

/// Generic `{"message": "..."}` acknowledgement
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}

/// Per-item outcome in a bulk response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkItemResult {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub post_id: Option<i64>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl BulkItemResult {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// Response of the bulk create/delete endpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub results: Vec<BulkItemResult>,
}

/// Accepts `"123"`, `123` or null
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Accepts integer or fractional milliseconds; fractions are truncated
fn millis<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or_default(),
        _ => 0,
    })
}

// ============================================
// ACCOUNT DTOs
// ============================================

/// Account lifecycle status as reported by the backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AccountStatus {
    New,
    Active,
    LoggedIn,
    Banned,
    Error,
    /// Any status this client does not know about, preserved verbatim
    Unknown(String),
}

impl From<String> for AccountStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "NEW" => AccountStatus::New,
            "ACTIVE" => AccountStatus::Active,
            "LOGGED_IN" => AccountStatus::LoggedIn,
            "BANNED" => AccountStatus::Banned,
            "ERROR" => AccountStatus::Error,
            _ => AccountStatus::Unknown(s),
        }
    }
}

impl From<AccountStatus> for String {
    fn from(status: AccountStatus) -> Self {
        status.to_string()
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AccountStatus::New => "NEW",
            AccountStatus::Active => "ACTIVE",
            AccountStatus::LoggedIn => "LOGGED_IN",
            AccountStatus::Banned => "BANNED",
            AccountStatus::Error => "ERROR",
            AccountStatus::Unknown(s) => s,
        };
        f.write_str(s)
    }
}

/// Telegram account record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Account {
    pub phone_number: String,
    #[serde(default, deserialize_with = "string_or_number", skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AccountStatus>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub proxy_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Account {
    pub fn is_active(&self) -> bool {
        self.status == Some(AccountStatus::Active)
    }
}

/// Partial account update; only set fields are sent
#[derive(Debug, Clone, Default, Serialize)]
pub struct AccountUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AccountStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_names: Option<Vec<String>>,
}

/// Admin-only password lookup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountPassword {
    pub phone_number: String,
    #[serde(default)]
    pub has_password: bool,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelIndexResult {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub channels_indexed: u64,
}

// ============================================
// ACCOUNT LOGIN DTOs
// ============================================

/// Server-side login progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginStatus {
    WaitCode,
    Wait2fa,
    Processing,
    Done,
    Failed,
    Other(String),
}

impl From<&str> for LoginStatus {
    fn from(s: &str) -> Self {
        match s {
            "wait_code" => LoginStatus::WaitCode,
            "wait_2fa" => LoginStatus::Wait2fa,
            "processing" => LoginStatus::Processing,
            "done" => LoginStatus::Done,
            "failed" => LoginStatus::Failed,
            other => LoginStatus::Other(other.to_string()),
        }
    }
}

impl LoginStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoginStatus::Done | LoginStatus::Failed)
    }
}

/// Body of start/verify/status responses. `status` is optional because the
/// backend has been seen to return bodies without it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub login_session_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub account_id: Option<Value>,
}

impl LoginResponse {
    pub fn login_status(&self) -> Option<LoginStatus> {
        self.status
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(LoginStatus::from)
    }
}

/// Parameters for starting an account login
#[derive(Debug, Clone, Default)]
pub struct LoginStart {
    pub phone_number: String,
    pub password: Option<String>,
    pub session_name: Option<String>,
    pub notes: Option<String>,
}

// ============================================
// POST DTOs
// ============================================

/// Telegram post targeted by tasks
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Post {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<i64>,
    pub message_link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<i64>,
    #[serde(default, rename = "is_validated", skip_serializing_if = "Option::is_none")]
    pub validated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Post {
    /// Backend flag when present, else both ids resolved
    pub fn is_validated(&self) -> bool {
        self.validated
            .unwrap_or(self.chat_id.is_some() && self.message_id.is_some())
    }
}

/// Body for creating a post
#[derive(Debug, Clone, Serialize)]
pub struct NewPost {
    pub message_link: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PostUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostCreated {
    #[serde(default)]
    pub message: String,
    pub post_id: i64,
}

// ============================================
// TASK DTOs
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Running,
    Paused,
    Finished,
    Crashed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Paused => "PAUSED",
            TaskStatus::Finished => "FINISHED",
            TaskStatus::Crashed => "CRASHED",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(TaskStatus::Pending),
            "RUNNING" => Ok(TaskStatus::Running),
            "PAUSED" => Ok(TaskStatus::Paused),
            "FINISHED" => Ok(TaskStatus::Finished),
            "CRASHED" => Ok(TaskStatus::Crashed),
            other => Err(format!("Unknown task status: {}", other)),
        }
    }
}

/// What a task does to each post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskAction {
    React { palette: String },
    Comment { content: String },
}

impl Default for TaskAction {
    fn default() -> Self {
        TaskAction::React {
            palette: "positive".to_string(),
        }
    }
}

impl fmt::Display for TaskAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskAction::React { palette } => write!(f, "react ({})", palette),
            TaskAction::Comment { content } => write!(f, "comment ({})", content),
        }
    }
}

/// Batch job definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<i64>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub post_ids: Vec<i64>,
    #[serde(default)]
    pub accounts: Vec<String>,
    pub action: TaskAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_ids: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accounts: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<TaskAction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskCreated {
    #[serde(default)]
    pub message: String,
    pub task_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatusResponse {
    pub task_id: i64,
    pub status: TaskStatus,
}

/// One execution of a task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub run_id: String,
    pub task_id: i64,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub finished_at: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub event_count: u64,
    #[serde(default)]
    pub meta: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRuns {
    pub task_id: i64,
    #[serde(default)]
    pub total_runs: u64,
    #[serde(default)]
    pub runs: Vec<Run>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllRuns {
    #[serde(default)]
    pub total_tasks: u64,
    #[serde(default)]
    pub total_runs: u64,
    #[serde(default)]
    pub tasks: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunsDeleted {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub runs_deleted: u64,
    #[serde(default)]
    pub events_deleted: u64,
}

/// One reaction/comment attempt recorded during a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportEvent {
    #[serde(default)]
    pub client: String,
    #[serde(default)]
    pub palette: Option<String>,
    /// Milliseconds since epoch
    #[serde(default, deserialize_with = "millis")]
    pub datetime: i64,
    /// Error text or object; `null` when the attempt succeeded
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl ReportEvent {
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn error_text(&self) -> Option<String> {
        self.error.as_ref().map(|e| match e {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskReport {
    #[serde(default)]
    pub report: Vec<ReportEvent>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

// ============================================
// CHANNEL DTOs
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub chat_id: i64,
    #[serde(default)]
    pub channel_name: String,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub has_enabled_reactions: bool,
    #[serde(default)]
    pub reactions_only_for_subscribers: bool,
    #[serde(default)]
    pub discussion_chat_id: Option<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelWithPostCount {
    #[serde(flatten)]
    pub channel: Channel,
    #[serde(default)]
    pub post_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelStats {
    #[serde(default)]
    pub total_channels: u64,
    #[serde(default)]
    pub private_channels: u64,
    #[serde(default)]
    pub public_channels: u64,
    #[serde(default)]
    pub channels_with_reactions: u64,
    #[serde(default)]
    pub tag_distribution: HashMap<String, u64>,
}

/// Fields for channel create/update, sent as query parameters
#[derive(Debug, Clone, Default)]
pub struct ChannelFields {
    pub channel_name: Option<String>,
    pub is_private: Option<bool>,
    pub has_enabled_reactions: Option<bool>,
    pub reactions_only_for_subscribers: Option<bool>,
    pub discussion_chat_id: Option<i64>,
    pub tags: Option<Vec<String>>,
}

// ============================================
// PROXY DTOs
// ============================================

/// Proxy record, normalized from the backend's loose shape
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "RawProxy")]
pub struct Proxy {
    pub proxy_name: String,
    pub proxy_type: String,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub is_active: bool,
    pub connected_accounts: Option<u64>,
    pub linked_accounts_count: Option<u64>,
    pub notes: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Deserialize)]
struct RawProxy {
    #[serde(default)]
    proxy_name: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    proxy_type: Option<String>,
    #[serde(default)]
    host: String,
    #[serde(default)]
    socks5_port: Option<u16>,
    #[serde(default)]
    http_port: Option<u16>,
    #[serde(default)]
    port: Option<u16>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    active: Option<bool>,
    #[serde(default)]
    is_active: Option<bool>,
    #[serde(default)]
    connected_accounts: Option<u64>,
    #[serde(default)]
    linked_accounts_count: Option<u64>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
}

impl From<RawProxy> for Proxy {
    fn from(raw: RawProxy) -> Self {
        // A zero port counts as unset
        let port = [raw.socks5_port, raw.http_port, raw.port]
            .into_iter()
            .flatten()
            .find(|p| *p != 0)
            .unwrap_or(0);

        let proxy_type = raw
            .kind
            .filter(|t| !t.is_empty())
            .or(raw.proxy_type.filter(|t| !t.is_empty()))
            .unwrap_or_else(|| "socks5".to_string());

        Self {
            proxy_name: raw.proxy_name,
            proxy_type,
            host: raw.host,
            port,
            username: raw.username,
            is_active: raw.active.or(raw.is_active).unwrap_or(true),
            connected_accounts: raw.connected_accounts,
            linked_accounts_count: raw.linked_accounts_count,
            notes: raw.notes,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
        }
    }
}

impl Proxy {
    /// Accounts currently using the proxy, as far as the backend reports
    pub fn load(&self) -> u64 {
        self.connected_accounts
            .or(self.linked_accounts_count)
            .unwrap_or(0)
    }
}

/// Fields for creating a proxy
#[derive(Debug, Clone)]
pub struct NewProxy {
    pub proxy_name: String,
    pub proxy_type: String,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub is_active: Option<bool>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ProxyUpdate {
    pub proxy_type: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub is_active: Option<bool>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyUsage {
    pub proxy_name: String,
    #[serde(default)]
    pub connected_accounts: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyStats {
    #[serde(default)]
    pub total_proxies: u64,
    #[serde(default)]
    pub active_proxies: u64,
    #[serde(default)]
    pub inactive_proxies: u64,
    #[serde(default)]
    pub total_connected_accounts: u64,
    #[serde(default)]
    pub least_used_proxy: Option<ProxyUsage>,
    #[serde(default)]
    pub most_used_proxy: Option<ProxyUsage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedProxy {
    pub proxy_name: String,
    #[serde(default)]
    pub reason: String,
}

/// Result of the backend's text-file proxy import
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyImportResult {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub imported: Option<u64>,
    #[serde(default)]
    pub skipped: Vec<SkippedProxy>,
    #[serde(default)]
    pub errors: Vec<Value>,
}

#[derive(Debug, Clone, Default)]
pub struct ProxyImportOptions {
    pub proxy_type: Option<String>,
    pub base_name: Option<String>,
    pub dry_run: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyTestResult {
    pub proxy_name: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub target_url: String,
    #[serde(default)]
    pub latency_ms: f64,
    #[serde(default)]
    pub status_code: u16,
    #[serde(default)]
    pub details: Option<Value>,
}

// ============================================
// PALETTE DTOs
// ============================================

/// Named reaction set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Palette {
    pub palette_name: String,
    #[serde(default)]
    pub emojis: Vec<String>,
    #[serde(default)]
    pub ordered: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PaletteUpdate {
    pub emojis: Option<Vec<String>>,
    pub ordered: Option<bool>,
    pub description: Option<String>,
}

// ============================================
// USER & AUTH DTOs
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    User,
    Admin,
    Guest,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
            UserRole::Guest => "guest",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" => Ok(UserRole::User),
            "admin" => Ok(UserRole::Admin),
            "guest" => Ok(UserRole::Guest),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// Dashboard operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
}

// ============================================
// STATS DTOs
// ============================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountCounts {
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostCounts {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub validated: u64,
    #[serde(default)]
    pub unvalidated: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskCounts {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub by_status: HashMap<String, u64>,
}

/// Database-wide counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stats {
    #[serde(default)]
    pub accounts: AccountCounts,
    #[serde(default)]
    pub posts: PostCounts,
    #[serde(default)]
    pub tasks: TaskCounts,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_proxy_normalization() {
        let proxy: Proxy = serde_json::from_value(json!({
            "proxy_name": "p1",
            "type": "http",
            "host": "10.0.0.1",
            "socks5_port": 0,
            "http_port": 3128,
            "active": false
        }))
        .unwrap();
        assert_eq!(proxy.proxy_type, "http");
        assert_eq!(proxy.port, 3128);
        assert!(!proxy.is_active);

        let proxy: Proxy = serde_json::from_value(json!({
            "proxy_name": "p2",
            "host": "10.0.0.2",
            "port": 1080
        }))
        .unwrap();
        assert_eq!(proxy.proxy_type, "socks5");
        assert_eq!(proxy.port, 1080);
        assert!(proxy.is_active);

        let proxy: Proxy = serde_json::from_value(json!({
            "proxy_name": "p3",
            "proxy_type": "socks4",
            "host": "h",
            "is_active": false,
            "connected_accounts": 3
        }))
        .unwrap();
        assert_eq!(proxy.proxy_type, "socks4");
        assert_eq!(proxy.port, 0);
        assert!(!proxy.is_active);
        assert_eq!(proxy.load(), 3);
    }

    #[test]
    fn test_account_status_roundtrip_unknown() {
        let account: Account = serde_json::from_value(json!({
            "phone_number": "+1555",
            "account_id": 42,
            "status": "FROZEN",
            "extra": true
        }))
        .unwrap();
        assert_eq!(account.account_id.as_deref(), Some("42"));
        assert_eq!(
            account.status,
            Some(AccountStatus::Unknown("FROZEN".to_string()))
        );
        assert_eq!(serde_json::to_value(&account).unwrap()["status"], "FROZEN");

        let account: Account =
            serde_json::from_value(json!({"phone_number": "+1", "status": "ACTIVE"})).unwrap();
        assert!(account.is_active());
    }

    #[test]
    fn test_task_action_shape() {
        let value = serde_json::to_value(TaskAction::default()).unwrap();
        assert_eq!(value, json!({"type": "react", "palette": "positive"}));

        let action: TaskAction =
            serde_json::from_value(json!({"type": "comment", "content": "Nice"})).unwrap();
        assert_eq!(
            action,
            TaskAction::Comment {
                content: "Nice".to_string()
            }
        );
    }

    #[test]
    fn test_post_validation_flag() {
        let post: Post =
            serde_json::from_value(json!({"message_link": "https://t.me/c/1", "chat_id": 1, "message_id": 2}))
                .unwrap();
        assert!(post.is_validated());

        let post: Post = serde_json::from_value(
            json!({"message_link": "https://t.me/c/1", "chat_id": 1, "is_validated": true}),
        )
        .unwrap();
        assert!(post.is_validated());

        let post: Post =
            serde_json::from_value(json!({"message_link": "https://t.me/c/1"})).unwrap();
        assert!(!post.is_validated());
    }

    #[test]
    fn test_login_status_parsing() {
        let response: LoginResponse =
            serde_json::from_value(json!({"status": "wait_code", "login_session_id": "abc"}))
                .unwrap();
        assert_eq!(response.login_status(), Some(LoginStatus::WaitCode));

        let response: LoginResponse = serde_json::from_value(json!({"message": "hi"})).unwrap();
        assert_eq!(response.login_status(), None);

        assert!(LoginStatus::from("done").is_terminal());
        assert!(!LoginStatus::from("wait_2fa").is_terminal());
        assert_eq!(
            LoginStatus::from("mystery"),
            LoginStatus::Other("mystery".to_string())
        );
    }

    #[test]
    fn test_report_event_fractional_timestamp() {
        let report: TaskReport = serde_json::from_value(json!({
            "task_id": 7,
            "report": [
                {"client": "+1", "datetime": 1700000000123.75, "error": null},
                {"client": "+2", "datetime": 1700000000000i64, "error": null},
                {"client": "+3", "datetime": null}
            ]
        }))
        .unwrap();
        assert_eq!(report.report[0].datetime, 1700000000123);
        assert_eq!(report.report[1].datetime, 1700000000000);
        assert_eq!(report.report[2].datetime, 0);
    }

    #[test]
    fn test_report_event_keeps_extra_fields() {
        let report: TaskReport = serde_json::from_value(json!({
            "task_id": 7,
            "report": [
                {"client": "+1", "palette": "positive", "datetime": 1700000000000i64, "error": null, "emoji": "👍"}
            ]
        }))
        .unwrap();
        assert_eq!(report.report.len(), 1);
        assert_eq!(report.report[0].extra["emoji"], "👍");
        assert_eq!(report.extra["task_id"], 7);
    }
}
