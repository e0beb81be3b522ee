//! Resource Services
//!
//! One thin service per backend resource. Each wraps a cloned
//! [`ApiClient`](crate::api::ApiClient) and maps calls to endpoints;
//! nothing is cached apart from the session.

pub mod accounts;
pub mod auth;
pub mod channels;
pub mod palettes;
pub mod posts;
pub mod proxies;
pub mod stats;
pub mod tasks;
pub mod users;

pub use accounts::AccountsService;
pub use auth::AuthService;
pub use channels::{ChannelFilter, ChannelsService};
pub use palettes::PalettesService;
pub use posts::{PostFilter, PostsService};
pub use proxies::{ProxiesService, ProxyFilter};
pub use stats::StatsService;
pub use tasks::{ReportQuery, TaskFilter, TasksService};
pub use users::UsersService;
