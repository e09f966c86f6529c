//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;
use vocab_core::MergeError;
use vocab_core::model::{CategoryError, ProgressError, StatusError, UserError, WordError};

/// Every failure a service call can surface, each tied to an envelope code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthenticated(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Envelope code for this error.
    #[must_use]
    pub fn code(&self) -> u16 {
        match self {
            ServiceError::Validation(_) | ServiceError::Conflict(_) => 400,
            ServiceError::Unauthenticated(_) => 301,
            ServiceError::NotFound(_) => 404,
            ServiceError::Internal(_) => 500,
        }
    }

    /// Message safe to show a client. Internal detail stays in the logs.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            ServiceError::Internal(_) => "internal server error".to_owned(),
            other => other.to_string(),
        }
    }

    pub(crate) fn internal(detail: impl std::fmt::Display) -> Self {
        tracing::error!(error = %detail, "internal service failure");
        ServiceError::Internal(detail.to_string())
    }
}

impl From<StorageError> for ServiceError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound => ServiceError::NotFound("resource not found".into()),
            StorageError::Conflict => ServiceError::Conflict("resource already exists".into()),
            other => ServiceError::internal(other),
        }
    }
}

impl From<SqliteInitError> for ServiceError {
    fn from(e: SqliteInitError) -> Self {
        ServiceError::internal(e)
    }
}

impl From<MergeError> for ServiceError {
    fn from(e: MergeError) -> Self {
        ServiceError::internal(e)
    }
}

macro_rules! validation_from {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl From<$ty> for ServiceError {
                fn from(e: $ty) -> Self {
                    ServiceError::Validation(e.to_string())
                }
            }
        )+
    };
}

validation_from!(StatusError, ProgressError, WordError, CategoryError, UserError);

impl From<vocab_core::Error> for ServiceError {
    fn from(e: vocab_core::Error) -> Self {
        match e {
            vocab_core::Error::Merge(m) => m.into(),
            other => ServiceError::Validation(other.to_string()),
        }
    }
}
