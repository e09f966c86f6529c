use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::model::ids::UserId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UserError {
    #[error("invalid email address: {0:?}")]
    InvalidEmail(String),
}

/// An account as seen by the progress backend.
///
/// Credentials live with the auth collaborator and never appear here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Build a user with a normalised (trimmed, lower-cased) email.
    ///
    /// # Errors
    ///
    /// Returns `UserError::InvalidEmail` unless the address has a non-empty
    /// local part and a dotted domain.
    pub fn new(id: UserId, email: &str, created_at: DateTime<Utc>) -> Result<Self, UserError> {
        let email = normalize_email(email)?;
        Ok(Self {
            id,
            email,
            created_at,
        })
    }
}

fn normalize_email(raw: &str) -> Result<String, UserError> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split('.')
                    .filter(|part| !part.is_empty())
                    .count()
                    >= 2
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };
    if valid {
        Ok(email)
    } else {
        Err(UserError::InvalidEmail(raw.to_owned()))
    }
}
