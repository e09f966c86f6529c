use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StatusError {
    #[error("invalid word status: {0:?}")]
    Invalid(String),
}

//
// ─── WORD STATUS ───────────────────────────────────────────────────────────────
//

/// Learning state of one word for one user.
///
/// `Unmarked` is the implicit state of every word without a progress overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum WordStatus {
    #[default]
    Unmarked,
    Unknown,
    Known,
}

impl WordStatus {
    pub const ALL: [WordStatus; 3] = [WordStatus::Unmarked, WordStatus::Unknown, WordStatus::Known];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            WordStatus::Unmarked => "unmarked",
            WordStatus::Unknown => "unknown",
            WordStatus::Known => "known",
        }
    }

    /// True for states that require a stored overlay on their own.
    #[must_use]
    pub fn is_marked(self) -> bool {
        !matches!(self, WordStatus::Unmarked)
    }
}

impl fmt::Display for WordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WordStatus {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unmarked" => Ok(WordStatus::Unmarked),
            "unknown" => Ok(WordStatus::Unknown),
            "known" => Ok(WordStatus::Known),
            other => Err(StatusError::Invalid(other.to_owned())),
        }
    }
}

impl TryFrom<String> for WordStatus {
    type Error = StatusError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
