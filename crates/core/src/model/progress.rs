use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{UserId, WordKey};
use crate::model::status::WordStatus;

const DATE_FORMAT: &str = "%Y-%m-%d";

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("invalid date stamp {0:?} (expected YYYY-MM-DD)")]
    InvalidDate(String),
}

//
// ─── MISTAKE DATE ──────────────────────────────────────────────────────────────
//

/// Calendar day on which a mistake (or a check-in) was recorded, `YYYY-MM-DD` on the wire.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DayStamp(NaiveDate);

impl DayStamp {
    #[must_use]
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Parse a list of wire stamps, keeping their order.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::InvalidDate` for the first malformed stamp.
    pub fn parse_all<S: AsRef<str>>(raw: &[S]) -> Result<Vec<DayStamp>, ProgressError> {
        raw.iter().map(|s| s.as_ref().parse()).collect()
    }
}

impl fmt::Debug for DayStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DayStamp({self})")
    }
}

impl fmt::Display for DayStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DATE_FORMAT))
    }
}

impl FromStr for DayStamp {
    type Err = ProgressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
            .map(DayStamp)
            .map_err(|_| ProgressError::InvalidDate(s.to_owned()))
    }
}

impl TryFrom<String> for DayStamp {
    type Error = ProgressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DayStamp> for String {
    fn from(value: DayStamp) -> Self {
        value.to_string()
    }
}

//
// ─── PROGRESS OVERLAY ──────────────────────────────────────────────────────────
//

/// Sparse per-user learning state for one word.
///
/// A word without an overlay is `Unmarked` with no mistakes. An overlay whose
/// status is `Unmarked` only exists to carry mistakes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressOverlay {
    pub user: UserId,
    pub key: WordKey,
    pub status: WordStatus,
    pub mistakes: Vec<DayStamp>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProgressOverlay {
    #[must_use]
    pub fn new(
        user: UserId,
        key: WordKey,
        status: WordStatus,
        mistakes: Vec<DayStamp>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user,
            key,
            status,
            mistakes,
            created_at: now,
            updated_at: now,
        }
    }

    /// True when the overlay carries nothing beyond the implicit default.
    #[must_use]
    pub fn is_redundant(&self) -> bool {
        !self.status.is_marked() && self.mistakes.is_empty()
    }

    #[must_use]
    pub fn has_mistake_on_any(&self, days: &[DayStamp]) -> bool {
        self.mistakes.iter().any(|m| days.contains(m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn day_stamp_parses_and_formats() {
        let day: DayStamp = "2024-01-01".parse().unwrap();
        assert_eq!(day.to_string(), "2024-01-01");
        assert_eq!(day.date(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn day_stamp_rejects_other_formats() {
        assert!("01/02/2024".parse::<DayStamp>().is_err());
        assert!("2024-13-01".parse::<DayStamp>().is_err());
    }

    #[test]
    fn parse_all_keeps_order_and_reports_first_bad() {
        let days = DayStamp::parse_all(&["2024-01-02", "2024-01-01"]).unwrap();
        assert_eq!(days[0].to_string(), "2024-01-02");

        let err = DayStamp::parse_all(&["2024-01-02", "yesterday"]).unwrap_err();
        assert_eq!(err, ProgressError::InvalidDate("yesterday".into()));
    }

    #[test]
    fn redundant_only_when_unmarked_without_mistakes() {
        let user = UserId::generate();
        let key = WordKey::new("c", "s", 1);
        let bare = ProgressOverlay::new(user, key.clone(), WordStatus::Unmarked, vec![], fixed_now());
        assert!(bare.is_redundant());

        let placeholder = ProgressOverlay::new(
            user,
            key.clone(),
            WordStatus::Unmarked,
            vec!["2024-01-01".parse().unwrap()],
            fixed_now(),
        );
        assert!(!placeholder.is_redundant());

        let known = ProgressOverlay::new(user, key, WordStatus::Known, vec![], fixed_now());
        assert!(!known.is_redundant());
    }
}
