use std::sync::Arc;

use async_trait::async_trait;
use storage::repository::{StorageError, UserRepository};
use vocab_core::Clock;
use vocab_core::model::{User, UserId};

use crate::error::ServiceError;

/// Gate in front of registration; code delivery and retries live elsewhere.
#[async_trait]
pub trait VerificationGate: Send + Sync {
    async fn verify(&self, email: &str, code: &str) -> bool;
}

/// Accepts every code. For local tools and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenGate;

#[async_trait]
impl VerificationGate for OpenGate {
    async fn verify(&self, _email: &str, _code: &str) -> bool {
        true
    }
}

#[derive(Clone)]
pub struct AccountService {
    clock: Clock,
    users: Arc<dyn UserRepository>,
    gate: Arc<dyn VerificationGate>,
}

impl AccountService {
    #[must_use]
    pub fn new(
        clock: Clock,
        users: Arc<dyn UserRepository>,
        gate: Arc<dyn VerificationGate>,
    ) -> Self {
        Self { clock, users, gate }
    }

    /// Create an account once the verification code checks out.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for a bad email or code, and
    /// `ServiceError::Conflict` when the email is already registered.
    pub async fn register(&self, email: &str, code: &str) -> Result<User, ServiceError> {
        let user = User::new(UserId::generate(), email, self.clock.now())?;
        if !self.gate.verify(&user.email, code).await {
            return Err(ServiceError::Validation("invalid verification code".into()));
        }
        match self.users.insert_user(&user).await {
            Ok(()) => Ok(user),
            Err(StorageError::Conflict) => Err(ServiceError::Conflict(
                "email is already registered".into(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the account no longer exists.
    pub async fn profile(&self, id: UserId) -> Result<User, ServiceError> {
        self.users
            .get_user(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("user not found".into()))
    }
}
