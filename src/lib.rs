//! # LikeBot Admin
//!
//! Typed client and command-line dashboard for the LikeBot Telegram
//! automation backend. All real work (Telegram sessions, task execution,
//! proxy checks) happens on the backend; this crate drives its REST and
//! WebSocket API.
//!
//! ## Modules
//!
//! - [`api`]: HTTP client, DTOs and error classification
//! - [`services`]: one service per backend resource
//! - [`session`]: persisted token/user and access guards
//! - [`login`]: account login state machine and polling driver
//! - [`drafts`]: three-stage task creation
//! - [`bulk`]: bounded-concurrency fan-out
//! - [`logs`]: live log tail over WebSocket
//! - [`import`]: proxy/account CSV and post list import
//! - [`reports`]: filter, sort and page task reports
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use likebot::api::ApiClient;
//! use likebot::config::Config;
//! use likebot::services::{AuthService, TaskFilter, TasksService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ApiClient::from_config(&Config::load_default())?;
//!
//!     AuthService::new(client.clone()).login("admin", "secret").await?;
//!
//!     let tasks = TasksService::new(client).list(&TaskFilter::default()).await?;
//!     for task in tasks {
//!         println!("{} {}", task.name, task.action);
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod bulk;
pub mod config;
pub mod drafts;
pub mod import;
pub mod login;
pub mod logs;
pub mod reports;
pub mod services;
pub mod session;

// Re-export top-level types for convenience
pub use api::{ApiClient, ApiError, ApiResult, Query};

pub use bulk::{fan_out, BulkItem, BulkReport, DEFAULT_CONCURRENCY};

pub use config::{Config, ConfigError, LoggingConfig};

pub use drafts::{DraftError, SelectionMode, StagedPost, TaskDraft};

pub use import::{ImportError, ImportItem, ImportStatus, ProxyCsvImporter};

pub use login::{LoginApi, LoginDriver, LoginEvent, LoginFlow, LoginInput, LoginOutcome, LoginPolicy};

pub use logs::{LogBuffer, LogEvent, LogStream, LogStreamError};

pub use reports::{ReportFilter, ReportStats, ReportView, SortDirection, SortField};

pub use services::{
    AccountsService, AuthService, ChannelsService, PalettesService, PostsService, ProxiesService,
    StatsService, TasksService, UsersService,
};

pub use session::{Access, AccessError, Landing, SessionStore};
