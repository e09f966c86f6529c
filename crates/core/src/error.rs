use thiserror::Error;

use crate::merge::MergeError;
use crate::model::{CategoryError, ProgressError, StatusError, UserError, WordError};

/// Any domain validation failure raised by this crate.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Status(#[from] StatusError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Word(#[from] WordError),
    #[error(transparent)]
    Category(#[from] CategoryError),
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Merge(#[from] MergeError),
}
