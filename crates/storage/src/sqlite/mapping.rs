use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;
use vocab_core::model::{
    CategoryDescriptor, CustomCategory, DayStamp, ProgressOverlay, User, UserId, WordEntry,
    WordKey, WordStatus,
};

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Maps driver errors onto the storage taxonomy.
pub(crate) fn map_sqlx(e: sqlx::Error) -> StorageError {
    match e {
        sqlx::Error::RowNotFound => StorageError::NotFound,
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
        other => StorageError::Connection(other.to_string()),
    }
}

pub(crate) fn local_id_from_i64(v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid local_id: {v}")))
}

pub(crate) fn count_from_i64(v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization("count sign overflow".into()))
}

pub(crate) fn window_limit(limit: u32) -> i64 {
    i64::from(limit)
}

pub(crate) fn window_offset(offset: u64) -> Result<i64, StorageError> {
    i64::try_from(offset).map_err(|_| StorageError::Serialization("offset overflow".into()))
}

/// Encodes keys as `[[category, subcategory, id], ...]` for `json_each` lookups.
pub(crate) fn keys_json(keys: &[WordKey]) -> Result<String, StorageError> {
    let tuples: Vec<(&str, &str, u32)> = keys
        .iter()
        .map(|k| (k.category.as_str(), k.subcategory.as_str(), k.local_id))
        .collect();
    serde_json::to_string(&tuples).map_err(ser)
}

pub(crate) fn days_json(days: &[DayStamp]) -> Result<String, StorageError> {
    serde_json::to_string(days).map_err(ser)
}

fn parse_days(raw: &str) -> Result<Vec<DayStamp>, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

/// Maps a word row. Custom word queries alias the global-only columns to NULL.
pub(crate) fn map_word_row(row: &SqliteRow) -> Result<WordEntry, StorageError> {
    let part_of_speech: Option<String> = row.try_get("part_of_speech").map_err(ser)?;
    let part_of_speech = match part_of_speech {
        Some(raw) => serde_json::from_str(&raw).map_err(ser)?,
        None => Vec::new(),
    };
    Ok(WordEntry {
        local_id: local_id_from_i64(row.try_get("local_id").map_err(ser)?)?,
        category: row.try_get("category").map_err(ser)?,
        subcategory: row.try_get("subcategory").map_err(ser)?,
        word: row.try_get("word").map_err(ser)?,
        meaning: row.try_get("meaning").map_err(ser)?,
        example: row.try_get("example").map_err(ser)?,
        example_cn: row.try_get("example_cn").map_err(ser)?,
        phonetic: row.try_get("phonetic").map_err(ser)?,
        audio: row.try_get("audio").map_err(ser)?,
        part_of_speech,
        example_audio: row.try_get("example_audio").map_err(ser)?,
    })
}

pub(crate) fn map_overlay_row(row: &SqliteRow) -> Result<ProgressOverlay, StorageError> {
    let status: String = row.try_get("status").map_err(ser)?;
    let status: WordStatus = status.parse().map_err(ser)?;
    let mistakes: String = row.try_get("mistakes").map_err(ser)?;
    Ok(ProgressOverlay {
        user: UserId::new(row.try_get::<Uuid, _>("user_id").map_err(ser)?),
        key: WordKey::new(
            row.try_get::<String, _>("word_category").map_err(ser)?,
            row.try_get::<String, _>("word_subcategory").map_err(ser)?,
            local_id_from_i64(row.try_get("word_id").map_err(ser)?)?,
        ),
        status,
        mistakes: parse_days(&mistakes)?,
        created_at: row.try_get("created_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}

pub(crate) fn map_descriptor_row(row: &SqliteRow) -> Result<CategoryDescriptor, StorageError> {
    Ok(CategoryDescriptor {
        category: row.try_get("category").map_err(ser)?,
        category_name: row.try_get("category_name").map_err(ser)?,
        subcategory: row.try_get("subcategory").map_err(ser)?,
        subcategory_name: row.try_get("subcategory_name").map_err(ser)?,
    })
}

pub(crate) fn map_custom_category_row(row: &SqliteRow) -> Result<CustomCategory, StorageError> {
    Ok(CustomCategory {
        owner: UserId::new(row.try_get::<Uuid, _>("owner_id").map_err(ser)?),
        descriptor: map_descriptor_row(row)?,
        emoji: row.try_get("emoji").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

pub(crate) fn map_user_row(row: &SqliteRow) -> Result<User, StorageError> {
    Ok(User {
        id: UserId::new(row.try_get::<Uuid, _>("id").map_err(ser)?),
        email: row.try_get("email").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_encode_as_tuples() {
        let json = keys_json(&[WordKey::new("cet4", "a", 7)]).unwrap();
        assert_eq!(json, r#"[["cet4","a",7]]"#);
    }

    #[test]
    fn days_roundtrip_through_json() {
        let days: Vec<DayStamp> = DayStamp::parse_all(&["2024-01-02", "2024-01-01"]).unwrap();
        let json = days_json(&days).unwrap();
        assert_eq!(json, r#"["2024-01-02","2024-01-01"]"#);
        assert_eq!(parse_days(&json).unwrap(), days);
    }

    #[test]
    fn rejects_negative_local_ids() {
        assert!(matches!(
            local_id_from_i64(-1),
            Err(StorageError::Serialization(_))
        ));
    }
}
