//! Account Login
//!
//! Adding a Telegram account is a server-driven login: `start` opens a
//! login session, the operator supplies the code Telegram sends, and the
//! client polls `status` until the backend reports `done` or `failed`.
//!
//! The transition logic lives in [`LoginFlow`], a plain state machine fed
//! with responses and clock ticks. [`LoginDriver`] runs it against a
//! [`LoginApi`] with a poll ticker and operator input.

mod driver;
mod machine;

pub use driver::{LoginDriver, LoginEvent, LoginInput};
pub use machine::{LoginFlow, LoginOutcome, LoginPolicy, Step};

use async_trait::async_trait;

use crate::api::dto::{LoginResponse, LoginStart};
use crate::api::ApiResult;

/// The three backend calls a login needs
#[async_trait]
pub trait LoginApi: Send + Sync {
    async fn start(&self, request: &LoginStart) -> ApiResult<LoginResponse>;

    async fn verify(
        &self,
        session_id: &str,
        code: Option<&str>,
        password_2fa: Option<&str>,
    ) -> ApiResult<LoginResponse>;

    async fn status(&self, session_id: &str) -> ApiResult<LoginResponse>;
}
