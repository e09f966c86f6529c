//! Business-key join between catalog words and progress overlays.
//!
//! Nothing here touches storage: callers hand in the words and overlays they
//! fetched and receive composite records back.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::model::{DayStamp, ProgressOverlay, WordEntry, WordKey, WordStatus};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MergeError {
    #[error("progress overlay {0} appears more than once")]
    DuplicateOverlay(WordKey),
}

/// A catalog word with the caller's learning state spliced in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewRecord {
    #[serde(flatten)]
    pub word: WordEntry,
    pub status: WordStatus,
    pub mistakes: Vec<DayStamp>,
}

impl ViewRecord {
    fn compose(word: WordEntry, overlay: Option<&ProgressOverlay>) -> Self {
        match overlay {
            Some(o) => Self {
                word,
                status: o.status,
                mistakes: o.mistakes.clone(),
            },
            None => Self {
                word,
                status: WordStatus::Unmarked,
                mistakes: Vec::new(),
            },
        }
    }
}

fn index_overlays(
    overlays: &[ProgressOverlay],
) -> Result<HashMap<WordKey, &ProgressOverlay>, MergeError> {
    let mut index = HashMap::with_capacity(overlays.len());
    for overlay in overlays {
        if index.insert(overlay.key.clone(), overlay).is_some() {
            return Err(MergeError::DuplicateOverlay(overlay.key.clone()));
        }
    }
    Ok(index)
}

/// Join in catalog order: one record per word, defaults for words without an overlay.
///
/// # Errors
///
/// Returns `MergeError::DuplicateOverlay` if two overlays share a business key.
pub fn merge_by_key(
    words: Vec<WordEntry>,
    overlays: &[ProgressOverlay],
) -> Result<Vec<ViewRecord>, MergeError> {
    let index = index_overlays(overlays)?;
    Ok(words
        .into_iter()
        .map(|word| {
            let overlay = index.get(&word.key()).copied();
            ViewRecord::compose(word, overlay)
        })
        .collect())
}

/// Join and order by overlay recency (`updated_at` descending).
///
/// Words without an overlay follow every matched word and keep their input order.
///
/// # Errors
///
/// Returns `MergeError::DuplicateOverlay` if two overlays share a business key.
pub fn merge_by_recency(
    words: Vec<WordEntry>,
    overlays: &[ProgressOverlay],
) -> Result<Vec<ViewRecord>, MergeError> {
    let index = index_overlays(overlays)?;
    let mut rows: Vec<(Option<DateTime<Utc>>, ViewRecord)> = words
        .into_iter()
        .map(|word| {
            let overlay = index.get(&word.key()).copied();
            (overlay.map(|o| o.updated_at), ViewRecord::compose(word, overlay))
        })
        .collect();

    // `sort_by` is stable, so equal timestamps and unmatched words keep input order.
    rows.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(a), Some(b)) => b.cmp(a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    Ok(rows.into_iter().map(|(_, record)| record).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UserId;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn word(subcategory: &str, id: u32) -> WordEntry {
        WordEntry {
            local_id: id,
            category: "cet4".into(),
            subcategory: subcategory.into(),
            word: format!("w{id}"),
            meaning: format!("m{id}"),
            example: String::new(),
            example_cn: String::new(),
            phonetic: None,
            audio: None,
            part_of_speech: Vec::new(),
            example_audio: None,
        }
    }

    fn overlay(user: UserId, subcategory: &str, id: u32, status: WordStatus, age_min: i64) -> ProgressOverlay {
        let at = fixed_now() - Duration::minutes(age_min);
        ProgressOverlay::new(user, WordKey::new("cet4", subcategory, id), status, vec![], at)
    }

    #[test]
    fn merge_by_key_defaults_missing_overlays() {
        let user = UserId::generate();
        let words = vec![word("a", 1), word("a", 2), word("a", 3)];
        let overlays = vec![overlay(user, "a", 2, WordStatus::Known, 0)];

        let merged = merge_by_key(words, &overlays).unwrap();
        let statuses: Vec<_> = merged.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![WordStatus::Unmarked, WordStatus::Known, WordStatus::Unmarked]
        );
        assert!(merged.iter().all(|r| r.mistakes.is_empty()));
        assert_eq!(merged[1].word.local_id, 2);
    }

    #[test]
    fn merge_by_key_matches_on_full_triple() {
        let user = UserId::generate();
        let words = vec![word("a", 1), word("b", 1)];
        let overlays = vec![overlay(user, "b", 1, WordStatus::Unknown, 0)];

        let merged = merge_by_key(words, &overlays).unwrap();
        assert_eq!(merged[0].status, WordStatus::Unmarked);
        assert_eq!(merged[1].status, WordStatus::Unknown);
    }

    #[test]
    fn merge_carries_mistakes() {
        let user = UserId::generate();
        let mut o = overlay(user, "a", 1, WordStatus::Unmarked, 0);
        o.mistakes = vec!["2024-01-01".parse().unwrap()];
        let merged = merge_by_key(vec![word("a", 1)], &[o]).unwrap();
        assert_eq!(merged[0].mistakes.len(), 1);
        assert_eq!(merged[0].status, WordStatus::Unmarked);
    }

    #[test]
    fn duplicate_overlay_keys_are_rejected() {
        let user = UserId::generate();
        let overlays = vec![
            overlay(user, "a", 1, WordStatus::Known, 0),
            overlay(user, "a", 1, WordStatus::Unknown, 1),
        ];
        let err = merge_by_key(vec![word("a", 1)], &overlays).unwrap_err();
        assert_eq!(err, MergeError::DuplicateOverlay(WordKey::new("cet4", "a", 1)));
    }

    #[test]
    fn merge_by_recency_orders_newest_first() {
        let user = UserId::generate();
        let words = vec![word("a", 1), word("a", 2), word("a", 3)];
        let overlays = vec![
            overlay(user, "a", 1, WordStatus::Known, 30),
            overlay(user, "a", 2, WordStatus::Unknown, 5),
            overlay(user, "a", 3, WordStatus::Known, 10),
        ];

        let merged = merge_by_recency(words, &overlays).unwrap();
        let ids: Vec<u32> = merged.iter().map(|r| r.word.local_id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn merge_by_recency_puts_unmatched_last_in_input_order() {
        let user = UserId::generate();
        let words = vec![word("a", 9), word("a", 1), word("a", 4), word("a", 2)];
        let overlays = vec![overlay(user, "a", 4, WordStatus::Known, 0)];

        let merged = merge_by_recency(words, &overlays).unwrap();
        let ids: Vec<u32> = merged.iter().map(|r| r.word.local_id).collect();
        assert_eq!(ids, vec![4, 9, 1, 2]);
        assert_eq!(merged[1].status, WordStatus::Unmarked);
    }

    #[test]
    fn view_record_serializes_flat() {
        let user = UserId::generate();
        let merged = merge_by_key(
            vec![word("a", 7)],
            &[overlay(user, "a", 7, WordStatus::Known, 0)],
        )
        .unwrap();
        let json = serde_json::to_value(&merged[0]).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["status"], "known");
        assert_eq!(json["exampleCn"], "");
        assert!(json["mistakes"].as_array().unwrap().is_empty());
    }
}
