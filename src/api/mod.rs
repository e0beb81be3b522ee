//! LikeBot REST API
//!
//! Client-side HTTP layer for the LikeBot backend, built with reqwest.
//!
//! # Endpoints consumed
//!
//! ## Accounts
//! - `GET /accounts`, `POST /accounts`, `GET|PUT|DELETE /accounts/:phone`
//! - `POST|DELETE /accounts/bulk`
//! - `POST /accounts/:phone/validate`, `POST /accounts/:phone/index-channels`
//! - `GET /accounts/:phone/password` (admin)
//! - `POST /accounts/create/start`, `POST /accounts/create/verify`,
//!   `GET /accounts/create/status`
//!
//! ## Posts
//! - `GET /posts`, `POST /posts`, `GET|PUT|DELETE /posts/:id`
//! - `POST|DELETE /posts/bulk`, `POST /posts/:id/validate`
//!
//! ## Tasks
//! - `GET /tasks`, `POST /tasks`, `GET|PUT|DELETE /tasks/:id`
//! - `POST /tasks/:id/{start,pause,resume}`, `GET /tasks/:id/status`
//! - `GET|DELETE /tasks/:id/runs`, `DELETE /tasks/:id/runs/:run_id`
//! - `GET /tasks/:id/report`, `GET /tasks/:id/runs/:run_id/report`
//! - `GET /runs`
//!
//! ## Channels, proxies, palettes
//! - `/channels` CRUD, `GET /channels/stats/summary`, `GET /channels/with-post-counts`
//! - `/proxies` CRUD, `GET /proxies/stats/summary`, `POST /proxies/import`,
//!   `POST /proxies/:name/test`
//! - `/palettes` CRUD
//!
//! ## Users, auth, stats
//! - `GET /users`, `PUT /users/:name/role`, `PUT /users/:name/verify`, `DELETE /users/:name`
//! - `POST /auth/register`, `POST /auth/login`, `GET /auth/me`
//! - `GET /stats`
//!
//! ## WebSocket
//! - `GET /ws/logs` - live log tail (see [`crate::logs`])
//!
//! # Example
//!
//! ```rust,ignore
//! use likebot::api::ApiClient;
//! use likebot::config::Config;
//! use likebot::services::AccountsService;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ApiClient::from_config(&Config::load_default())?;
//!     let accounts = AccountsService::new(client).list(None).await?;
//!     println!("{} accounts", accounts.len());
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod dto;
pub mod error;

#[cfg(test)]
pub(crate) mod mock;

pub use client::{ApiClient, Query};
pub use error::{ApiError, ApiResult};
