//! Bearer-token boundary. Identity is resolved once here and passed on explicitly.

use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use storage::repository::UserRepository;
use vocab_core::model::UserId;

use crate::error::ServiceError;

/// The caller behind a valid token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthUser {
    pub id: UserId,
    pub email: String,
}

/// `{valid, user?, error?}` as reported by the auth collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthOutcome {
    pub valid: bool,
    pub user: Option<AuthUser>,
    pub error: Option<String>,
}

impl AuthOutcome {
    #[must_use]
    pub fn accepted(user: AuthUser) -> Self {
        Self {
            valid: true,
            user: Some(user),
            error: None,
        }
    }

    #[must_use]
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            user: None,
            error: Some(reason.into()),
        }
    }

    /// Collapse into the caller identity.
    ///
    /// # Errors
    ///
    /// Any outcome that is not valid with a user is `ServiceError::Unauthenticated`.
    pub fn into_user(self) -> Result<AuthUser, ServiceError> {
        match (self.valid, self.user) {
            (true, Some(user)) => Ok(user),
            _ => Err(ServiceError::Unauthenticated(
                self.error.unwrap_or_else(|| "not authenticated".into()),
            )),
        }
    }
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, token: &str) -> AuthOutcome;
}

/// Claims carried by access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: String,
    pub exp: u64,
}

/// HS256 tokens whose `id` claim names an existing user.
pub struct JwtAuthenticator {
    key: DecodingKey,
    validation: Validation,
    users: Arc<dyn UserRepository>,
}

impl JwtAuthenticator {
    #[must_use]
    pub fn new(secret: &[u8], users: Arc<dyn UserRepository>) -> Self {
        Self {
            key: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
            users,
        }
    }
}

#[async_trait]
impl Authenticator for JwtAuthenticator {
    async fn authenticate(&self, token: &str) -> AuthOutcome {
        let token = token.trim();
        let token = token.strip_prefix("Bearer ").unwrap_or(token).trim();
        if token.is_empty() {
            return AuthOutcome::rejected("missing token");
        }

        let claims = match decode::<Claims>(token, &self.key, &self.validation) {
            Ok(data) => data.claims,
            Err(e) => {
                tracing::debug!(error = %e, "rejected token");
                return AuthOutcome::rejected("invalid token");
            }
        };
        let Ok(id) = claims.id.parse::<UserId>() else {
            return AuthOutcome::rejected("invalid token");
        };

        match self.users.get_user(id).await {
            Ok(Some(user)) => AuthOutcome::accepted(AuthUser {
                id: user.id,
                email: user.email,
            }),
            Ok(None) => AuthOutcome::rejected("user not found"),
            Err(e) => {
                tracing::warn!(error = %e, "user lookup failed during authentication");
                AuthOutcome::rejected("not authenticated")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use storage::repository::InMemoryRepository;
    use vocab_core::model::User;
    use vocab_core::time::fixed_now;

    const SECRET: &[u8] = b"test-secret";

    fn token(id: &str, secret: &[u8]) -> String {
        let claims = Claims {
            id: id.into(),
            exp: 4_102_444_800,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    async fn setup() -> (JwtAuthenticator, User) {
        let repo = InMemoryRepository::new();
        let user = User::new(UserId::generate(), "a@b.co", fixed_now()).unwrap();
        repo.insert_user(&user).await.unwrap();
        (JwtAuthenticator::new(SECRET, Arc::new(repo)), user)
    }

    #[tokio::test]
    async fn accepts_bearer_token_for_known_user() {
        let (auth, user) = setup().await;
        let outcome = auth
            .authenticate(&format!("Bearer {}", token(&user.id.to_string(), SECRET)))
            .await;
        assert!(outcome.valid);
        assert_eq!(outcome.into_user().unwrap().id, user.id);
    }

    #[tokio::test]
    async fn rejects_bad_signature_and_unknown_user() {
        let (auth, user) = setup().await;
        let forged = auth
            .authenticate(&token(&user.id.to_string(), b"other"))
            .await;
        assert!(!forged.valid);

        let ghost = auth
            .authenticate(&token(&UserId::generate().to_string(), SECRET))
            .await;
        assert_eq!(ghost.error.as_deref(), Some("user not found"));
        let err = ghost.into_user().unwrap_err();
        assert_eq!(err.code(), 301);
    }

    #[tokio::test]
    async fn rejects_empty_token() {
        let (auth, _) = setup().await;
        assert!(!auth.authenticate("   ").await.valid);
    }
}
