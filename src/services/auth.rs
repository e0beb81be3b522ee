//! Auth Service
//!
//! Operator registration and login. A successful login stores the bearer
//! token and the current user in the session store.

use crate::api::dto::{RegisterRequest, TokenResponse, User};
use crate::api::{ApiClient, ApiError, ApiResult, Query};

#[derive(Clone)]
pub struct AuthService {
    client: ApiClient,
}

impl AuthService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn register(&self, request: &RegisterRequest) -> ApiResult<User> {
        if request.username.trim().is_empty() || request.password.is_empty() {
            return Err(ApiError::Validation(
                "Username and password are required".into(),
            ));
        }
        self.client.post_json("/auth/register", request).await
    }

    /// Exchange credentials for a token, then cache the current user
    pub async fn login(&self, username: &str, password: &str) -> ApiResult<User> {
        let token: TokenResponse = self
            .client
            .post_form("/auth/login", &[("username", username), ("password", password)])
            .await?;

        self.client.session().set_token(token.access_token).await?;
        tracing::info!(username, "Logged in");
        self.me().await
    }

    /// Fetch the current user and refresh the cached copy
    pub async fn me(&self) -> ApiResult<User> {
        let user: User = self.client.get("/auth/me", &Query::new()).await?;
        self.client.session().set_user(user.clone()).await?;
        Ok(user)
    }

    /// Forget the local token and user
    pub async fn logout(&self) -> ApiResult<()> {
        self.client.session().clear().await?;
        tracing::info!("Logged out");
        Ok(())
    }

    pub async fn current_user(&self) -> Option<User> {
        self.client.session().current_user().await
    }
}
