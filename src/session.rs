//! Operator Session
//!
//! Persists the bearer token and the cached current user between CLI
//! invocations, and implements the access guards that sit in front of
//! authenticated and admin-only commands.

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::api::dto::{User, UserRole};

/// What is persisted on disk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

/// Token + user store backed by an optional JSON file
pub struct SessionStore {
    path: Option<PathBuf>,
    data: RwLock<SessionData>,
}

/// Access level required by a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
    Admin,
}

/// Where the operator should be sent when no command is given
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Landing {
    Home,
    Login,
}

/// Guard rejections
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("Not logged in. Run `likebot auth login` first")]
    NotAuthenticated,

    #[error("Admin role required (current role: {role})")]
    NotAdmin { role: String },
}

#[derive(Debug, Deserialize)]
struct TokenClaims {
    #[serde(default)]
    exp: Option<i64>,
}

impl SessionStore {
    /// Session kept only in memory
    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: RwLock::new(SessionData::default()),
        }
    }

    /// Load a session file, starting empty when it is missing or unreadable
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let data = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = ?path, error = %e, "Ignoring corrupt session file");
                SessionData::default()
            }),
            Err(_) => SessionData::default(),
        };

        Self {
            path: Some(path),
            data: RwLock::new(data),
        }
    }

    pub async fn token(&self) -> Option<String> {
        self.data.read().await.token.clone()
    }

    pub async fn current_user(&self) -> Option<User> {
        self.data.read().await.user.clone()
    }

    pub async fn set_token(&self, token: String) -> std::io::Result<()> {
        self.data.write().await.token = Some(token);
        self.persist().await
    }

    pub async fn set_user(&self, user: User) -> std::io::Result<()> {
        self.data.write().await.user = Some(user);
        self.persist().await
    }

    /// Drop token and user ("logout")
    pub async fn clear(&self) -> std::io::Result<()> {
        *self.data.write().await = SessionData::default();
        self.persist().await
    }

    /// A token is present and its `exp` claim, if any, is in the future
    pub async fn is_authenticated(&self) -> bool {
        match self.token().await {
            Some(token) => !token_expired(&token, chrono::Utc::now().timestamp()),
            None => false,
        }
    }

    pub async fn is_admin(&self) -> bool {
        matches!(
            self.current_user().await,
            Some(User {
                role: UserRole::Admin,
                ..
            })
        )
    }

    pub async fn landing(&self) -> Landing {
        if self.is_authenticated().await {
            Landing::Home
        } else {
            Landing::Login
        }
    }

    /// Guard a command
    pub async fn check(&self, access: Access) -> Result<(), AccessError> {
        match access {
            Access::Public => Ok(()),
            Access::Authenticated => {
                if self.is_authenticated().await {
                    Ok(())
                } else {
                    Err(AccessError::NotAuthenticated)
                }
            }
            Access::Admin => {
                if !self.is_authenticated().await {
                    return Err(AccessError::NotAuthenticated);
                }
                match self.current_user().await {
                    Some(user) if user.role == UserRole::Admin => Ok(()),
                    Some(user) => Err(AccessError::NotAdmin {
                        role: user.role.to_string(),
                    }),
                    None => Err(AccessError::NotAdmin {
                        role: "unknown".to_string(),
                    }),
                }
            }
        }
    }

    async fn persist(&self) -> std::io::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let data = self.data.read().await;
        if data.token.is_none() && data.user.is_none() {
            if path.exists() {
                std::fs::remove_file(path)?;
            }
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&*data)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }
}

/// Read `exp` without verifying the signature; the backend owns the key.
/// Tokens that cannot be decoded are treated as opaque and never expire
/// locally, leaving the decision to the backend's 401.
fn token_expired(token: &str, now: i64) -> bool {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    match decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation) {
        Ok(data) => data.claims.exp.map(|exp| exp <= now).unwrap_or(false),
        Err(e) => {
            tracing::debug!(error = %e, "Session token is not a readable JWT");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn jwt(exp: i64) -> String {
        #[derive(Serialize)]
        struct Claims {
            sub: String,
            exp: i64,
        }
        encode(
            &Header::default(),
            &Claims {
                sub: "operator".to_string(),
                exp,
            },
            &EncodingKey::from_secret(b"backend-secret"),
        )
        .unwrap()
    }

    fn user(role: UserRole) -> User {
        User {
            username: "operator".to_string(),
            is_verified: true,
            role,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_token_expiry() {
        let now = chrono::Utc::now().timestamp();
        assert!(!token_expired(&jwt(now + 3600), now));
        assert!(token_expired(&jwt(now - 10), now));
        assert!(!token_expired("opaque-token", now));
    }

    #[tokio::test]
    async fn test_guards() {
        let store = SessionStore::in_memory();
        assert_eq!(store.landing().await, Landing::Login);
        assert_eq!(
            store.check(Access::Authenticated).await,
            Err(AccessError::NotAuthenticated)
        );
        assert!(store.check(Access::Public).await.is_ok());

        let exp = chrono::Utc::now().timestamp() + 3600;
        store.set_token(jwt(exp)).await.unwrap();
        store.set_user(user(UserRole::User)).await.unwrap();
        assert_eq!(store.landing().await, Landing::Home);
        assert!(store.check(Access::Authenticated).await.is_ok());
        assert_eq!(
            store.check(Access::Admin).await,
            Err(AccessError::NotAdmin {
                role: "user".to_string()
            })
        );

        store.set_user(user(UserRole::Admin)).await.unwrap();
        assert!(store.check(Access::Admin).await.is_ok());
        assert!(store.is_admin().await);
    }

    #[tokio::test]
    async fn test_expired_token_is_not_authenticated() {
        let store = SessionStore::in_memory();
        store
            .set_token(jwt(chrono::Utc::now().timestamp() - 60))
            .await
            .unwrap();
        assert!(!store.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_persist_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let store = SessionStore::load(&path);
        store.set_token("abc".to_string()).await.unwrap();
        store.set_user(user(UserRole::Guest)).await.unwrap();
        assert!(path.exists());

        let reloaded = SessionStore::load(&path);
        assert_eq!(reloaded.token().await.as_deref(), Some("abc"));
        assert_eq!(reloaded.current_user().await.unwrap().role, UserRole::Guest);

        reloaded.clear().await.unwrap();
        assert!(!path.exists());
        assert!(SessionStore::load(&path).token().await.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = SessionStore::load(&path);
        assert!(store.token().await.is_none());
    }
}
