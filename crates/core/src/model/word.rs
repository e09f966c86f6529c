use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::WordKey;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum WordError {
    #[error("word #{index} has an empty word")]
    EmptyWord { index: usize },

    #[error("word #{index} has an empty meaning")]
    EmptyMeaning { index: usize },

    #[error("word id must be >= 1")]
    InvalidLocalId,

    #[error("duplicate word id {0}")]
    DuplicateLocalId(u32),
}

//
// ─── WORD ENTRY ────────────────────────────────────────────────────────────────
//

/// One catalog word, either from the shared catalog or from a user's custom list.
///
/// The pronunciation and grammar fields are only populated for built-in words.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordEntry {
    #[serde(rename = "id")]
    pub local_id: u32,
    pub category: String,
    pub subcategory: String,
    pub word: String,
    pub meaning: String,
    #[serde(default)]
    pub example: String,
    #[serde(default)]
    pub example_cn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phonetic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub part_of_speech: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example_audio: Option<String>,
}

impl WordEntry {
    #[must_use]
    pub fn key(&self) -> WordKey {
        WordKey::new(self.category.clone(), self.subcategory.clone(), self.local_id)
    }
}

//
// ─── DRAFTS ────────────────────────────────────────────────────────────────────
//

/// User-supplied word for a custom list, before ids are assigned.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordDraft {
    #[serde(default, rename = "id")]
    pub local_id: Option<u32>,
    pub word: String,
    pub meaning: String,
    #[serde(default)]
    pub example: Option<String>,
    #[serde(default)]
    pub example_cn: Option<String>,
}

impl WordDraft {
    #[must_use]
    pub fn new(word: impl Into<String>, meaning: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            meaning: meaning.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_id(mut self, local_id: u32) -> Self {
        self.local_id = Some(local_id);
        self
    }
}

/// Validate drafts and place them under `(category, subcategory)`.
///
/// Explicit ids are kept; drafts without one receive the lowest ids not already
/// taken, counting up from 1.
///
/// # Errors
///
/// Returns `WordError` for blank words or meanings, an id of 0, or a repeated id.
pub fn place_drafts(
    category: &str,
    subcategory: &str,
    drafts: Vec<WordDraft>,
) -> Result<Vec<WordEntry>, WordError> {
    let mut taken = HashSet::with_capacity(drafts.len());
    for draft in &drafts {
        if let Some(id) = draft.local_id {
            if id == 0 {
                return Err(WordError::InvalidLocalId);
            }
            if !taken.insert(id) {
                return Err(WordError::DuplicateLocalId(id));
            }
        }
    }

    let mut next_free = 1_u32;
    let mut out = Vec::with_capacity(drafts.len());
    for (index, draft) in drafts.into_iter().enumerate() {
        let word = draft.word.trim();
        if word.is_empty() {
            return Err(WordError::EmptyWord { index });
        }
        let meaning = draft.meaning.trim();
        if meaning.is_empty() {
            return Err(WordError::EmptyMeaning { index });
        }

        let local_id = match draft.local_id {
            Some(id) => id,
            None => {
                while taken.contains(&next_free) {
                    next_free += 1;
                }
                taken.insert(next_free);
                next_free
            }
        };

        out.push(WordEntry {
            local_id,
            category: category.to_owned(),
            subcategory: subcategory.to_owned(),
            word: word.to_owned(),
            meaning: meaning.to_owned(),
            example: draft.example.unwrap_or_default().trim().to_owned(),
            example_cn: draft.example_cn.unwrap_or_default().trim().to_owned(),
            phonetic: None,
            audio: None,
            part_of_speech: Vec::new(),
            example_audio: None,
        });
    }
    Ok(out)
}
