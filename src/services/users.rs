//! Users Service (admin only)

use crate::api::dto::{User, UserRole};
use crate::api::{ApiClient, ApiResult, Query};
use crate::session::Access;

#[derive(Clone)]
pub struct UsersService {
    client: ApiClient,
}

impl UsersService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn path(username: &str) -> String {
        format!("/users/{}", ApiClient::segment(username))
    }

    pub async fn list(&self) -> ApiResult<Vec<User>> {
        self.client.session().check(Access::Admin).await?;
        self.client.get("/users", &Query::new()).await
    }

    pub async fn set_role(&self, username: &str, role: UserRole) -> ApiResult<serde_json::Value> {
        self.client.session().check(Access::Admin).await?;
        let query: Query = vec![("role", role.to_string())];
        self.client
            .put_query(&format!("{}/role", Self::path(username)), &query)
            .await
    }

    pub async fn set_verified(&self, username: &str, is_verified: bool) -> ApiResult<serde_json::Value> {
        self.client.session().check(Access::Admin).await?;
        let query: Query = vec![("is_verified", is_verified.to_string())];
        self.client
            .put_query(&format!("{}/verify", Self::path(username)), &query)
            .await
    }

    pub async fn delete(&self, username: &str) -> ApiResult<serde_json::Value> {
        self.client.session().check(Access::Admin).await?;
        self.client.delete(&Self::path(username)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockBackend;
    use crate::api::ApiError;
    use crate::session::AccessError;
    use serde_json::{json, Value};

    async fn admin_client(mock: &MockBackend) -> ApiClient {
        let client = mock.client();
        client.session().set_token("t".into()).await.unwrap();
        client
            .session()
            .set_user(User {
                username: "root".into(),
                is_verified: true,
                role: UserRole::Admin,
                created_at: None,
                updated_at: None,
            })
            .await
            .unwrap();
        client
    }

    #[tokio::test]
    async fn test_requires_login() {
        let mock = MockBackend::start().await;
        let service = UsersService::new(mock.client());
        let err = service.list().await.unwrap_err();
        assert!(matches!(err, ApiError::Access(AccessError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn test_role_and_verification() {
        let mock = MockBackend::start().await;
        mock.respond("PUT", "/users/alice/role", 200, json!({"message": "ok"}));
        mock.respond("PUT", "/users/alice/verify", 200, json!({"message": "ok"}));
        mock.respond("DELETE", "/users/alice", 200, Value::Null);
        let service = UsersService::new(admin_client(&mock).await);

        service.set_role("alice", UserRole::Guest).await.unwrap();
        service.set_verified("alice", true).await.unwrap();
        service.delete("alice").await.unwrap();

        assert_eq!(
            mock.requests_to("PUT", "/users/alice/role")[0].param("role"),
            Some("guest")
        );
        assert_eq!(
            mock.requests_to("PUT", "/users/alice/verify")[0].param("is_verified"),
            Some("true")
        );
    }
}
