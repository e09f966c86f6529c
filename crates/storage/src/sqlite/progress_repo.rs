use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Row, Sqlite};
use vocab_core::StatusCounts;
use vocab_core::model::{DayStamp, ProgressOverlay, UserId, WordKey, WordStatus};

use super::SqliteRepository;
use super::mapping::{
    count_from_i64, days_json, keys_json, local_id_from_i64, map_overlay_row, map_sqlx, ser,
    window_limit, window_offset,
};
use crate::repository::{
    ClearOutcome, ProgressFilter, ProgressSort, ProgressStore, StorageError, Window,
};

const OVERLAY_COLUMNS: &str = "p.user_id, p.word_category, p.word_subcategory, p.word_id, \
     p.status, p.mistakes, p.created_at, p.updated_at";

const KEY_PREDICATE: &str =
    "user_id = ?1 AND word_category = ?2 AND word_subcategory = ?3 AND word_id = ?4";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cleared {
    Deleted,
    Updated,
    Missing,
}

fn push_filter<'a>(
    qb: &mut QueryBuilder<'a, Sqlite>,
    user: UserId,
    filter: &ProgressFilter,
    with_statuses: bool,
) -> Result<(), StorageError> {
    qb.push(" WHERE p.user_id = ");
    qb.push_bind(user.value());
    if with_statuses && !filter.statuses.is_empty() {
        qb.push(" AND p.status IN (");
        let mut list = qb.separated(", ");
        for status in &filter.statuses {
            list.push_bind(status.as_str());
        }
        list.push_unseparated(")");
    }
    if let Some(category) = &filter.category {
        qb.push(" AND p.word_category = ");
        qb.push_bind(category.clone());
    }
    if let Some(subcategory) = &filter.subcategory {
        qb.push(" AND p.word_subcategory = ");
        qb.push_bind(subcategory.clone());
    }
    if filter.has_mistakes {
        qb.push(" AND json_array_length(p.mistakes) > 0");
    }
    if !filter.mistake_days.is_empty() {
        qb.push(
            " AND EXISTS (SELECT 1 FROM json_each(p.mistakes) m \
             WHERE m.value IN (SELECT value FROM json_each(",
        );
        qb.push_bind(days_json(&filter.mistake_days)?);
        qb.push(")))");
    }
    Ok(())
}

fn push_sort(qb: &mut QueryBuilder<'_, Sqlite>, sort: ProgressSort) {
    match sort {
        ProgressSort::ByKey => {
            qb.push(" ORDER BY p.word_category, p.word_subcategory, p.word_id");
        }
        ProgressSort::Recent => {
            qb.push(" ORDER BY p.updated_at DESC, p.word_category, p.word_subcategory, p.word_id");
        }
    }
}

impl SqliteRepository {
    /// Clears one overlay: unmarked rows are deleted, marked rows keep their status.
    async fn clear_one(
        &self,
        user: UserId,
        key: &WordKey,
        now: DateTime<Utc>,
    ) -> Result<Cleared, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query(&format!(
            "DELETE FROM user_words WHERE {KEY_PREDICATE} AND status = 'unmarked'"
        ))
        .bind(user.value())
        .bind(&key.category)
        .bind(&key.subcategory)
        .bind(i64::from(key.local_id))
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let outcome = if deleted > 0 {
            Cleared::Deleted
        } else {
            let updated = sqlx::query(&format!(
                r"UPDATE user_words SET
                    updated_at = CASE WHEN json_array_length(mistakes) = 0 THEN updated_at ELSE ?5 END,
                    mistakes = '[]'
                 WHERE {KEY_PREDICATE}"
            ))
            .bind(user.value())
            .bind(&key.category)
            .bind(&key.subcategory)
            .bind(i64::from(key.local_id))
            .bind(now)
            .execute(&mut *tx)
            .await?
            .rows_affected();
            if updated > 0 {
                Cleared::Updated
            } else {
                Cleared::Missing
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }
}

#[async_trait::async_trait]
impl ProgressStore for SqliteRepository {
    async fn fetch_one(
        &self,
        user: UserId,
        key: &WordKey,
    ) -> Result<Option<ProgressOverlay>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {OVERLAY_COLUMNS} FROM user_words p WHERE {KEY_PREDICATE}"
        ))
        .bind(user.value())
        .bind(&key.category)
        .bind(&key.subcategory)
        .bind(i64::from(key.local_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        row.as_ref().map(map_overlay_row).transpose()
    }

    async fn fetch_by_keys(
        &self,
        user: UserId,
        keys: &[WordKey],
    ) -> Result<Vec<ProgressOverlay>, StorageError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(&format!(
            "SELECT {OVERLAY_COLUMNS} FROM user_words p WHERE p.user_id = ?1 AND EXISTS (\
             SELECT 1 FROM json_each(?2) k WHERE json_extract(k.value, '$[0]') = p.word_category \
             AND json_extract(k.value, '$[1]') = p.word_subcategory \
             AND json_extract(k.value, '$[2]') = p.word_id)"
        ))
        .bind(user.value())
        .bind(keys_json(keys)?)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        rows.iter().map(map_overlay_row).collect()
    }

    async fn fetch_page(
        &self,
        user: UserId,
        filter: &ProgressFilter,
        sort: ProgressSort,
        window: Window,
    ) -> Result<Vec<ProgressOverlay>, StorageError> {
        let mut qb = QueryBuilder::new(format!("SELECT {OVERLAY_COLUMNS} FROM user_words p"));
        push_filter(&mut qb, user, filter, true)?;
        push_sort(&mut qb, sort);
        qb.push(" LIMIT ");
        qb.push_bind(window_limit(window.limit));
        qb.push(" OFFSET ");
        qb.push_bind(window_offset(window.offset)?);

        let rows = qb.build().fetch_all(&self.pool).await.map_err(map_sqlx)?;
        rows.iter().map(map_overlay_row).collect()
    }

    async fn fetch_keys(
        &self,
        user: UserId,
        filter: &ProgressFilter,
    ) -> Result<Vec<WordKey>, StorageError> {
        let mut qb =
            QueryBuilder::new("SELECT p.word_category, p.word_subcategory, p.word_id FROM user_words p");
        push_filter(&mut qb, user, filter, true)?;
        push_sort(&mut qb, ProgressSort::ByKey);

        let rows = qb.build().fetch_all(&self.pool).await.map_err(map_sqlx)?;
        rows.iter()
            .map(|row| {
                let id: i64 = row.try_get("word_id").map_err(ser)?;
                Ok(WordKey::new(
                    row.try_get::<String, _>("word_category").map_err(ser)?,
                    row.try_get::<String, _>("word_subcategory").map_err(ser)?,
                    local_id_from_i64(id)?,
                ))
            })
            .collect()
    }

    async fn count(&self, user: UserId, filter: &ProgressFilter) -> Result<u64, StorageError> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) AS n FROM user_words p");
        push_filter(&mut qb, user, filter, true)?;
        let row = qb.build().fetch_one(&self.pool).await.map_err(map_sqlx)?;
        count_from_i64(row.try_get::<i64, _>("n").map_err(ser)?)
    }

    async fn count_by_status(
        &self,
        user: UserId,
        filter: &ProgressFilter,
    ) -> Result<StatusCounts, StorageError> {
        let mut qb = QueryBuilder::new("SELECT p.status, COUNT(*) AS n FROM user_words p");
        push_filter(&mut qb, user, filter, false)?;
        qb.push(" GROUP BY p.status");

        let rows = qb.build().fetch_all(&self.pool).await.map_err(map_sqlx)?;
        let mut counts = StatusCounts::default();
        for row in rows {
            let status: String = row.try_get("status").map_err(ser)?;
            let status: WordStatus = status.parse().map_err(ser)?;
            counts.add(status, count_from_i64(row.try_get("n").map_err(ser)?)?);
        }
        Ok(counts)
    }

    async fn upsert_status(
        &self,
        user: UserId,
        key: &WordKey,
        status: WordStatus,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        if status.is_marked() {
            sqlx::query(
                r"
                INSERT INTO user_words (user_id, word_category, word_subcategory, word_id, status, mistakes, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, '[]', ?6, ?6)
                ON CONFLICT(user_id, word_category, word_subcategory, word_id) DO UPDATE SET
                    status = excluded.status,
                    updated_at = excluded.updated_at
                WHERE user_words.status <> excluded.status
                ",
            )
            .bind(user.value())
            .bind(&key.category)
            .bind(&key.subcategory)
            .bind(i64::from(key.local_id))
            .bind(status.as_str())
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        let deleted = sqlx::query(&format!(
            "DELETE FROM user_words WHERE {KEY_PREDICATE} AND json_array_length(mistakes) = 0"
        ))
        .bind(user.value())
        .bind(&key.category)
        .bind(&key.subcategory)
        .bind(i64::from(key.local_id))
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?
        .rows_affected();

        if deleted == 0 {
            sqlx::query(&format!(
                "UPDATE user_words SET status = 'unmarked', updated_at = ?5 WHERE {KEY_PREDICATE} AND status <> 'unmarked'"
            ))
            .bind(user.value())
            .bind(&key.category)
            .bind(&key.subcategory)
            .bind(i64::from(key.local_id))
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        }
        tx.commit().await.map_err(map_sqlx)?;
        Ok(())
    }

    async fn record_mistakes(
        &self,
        user: UserId,
        key: &WordKey,
        mistakes: &[DayStamp],
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        if mistakes.is_empty() {
            self.clear_one(user, key, now).await.map_err(map_sqlx)?;
            return Ok(());
        }

        sqlx::query(
            r"
            INSERT INTO user_words (user_id, word_category, word_subcategory, word_id, status, mistakes, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, 'unmarked', ?5, ?6, ?6)
            ON CONFLICT(user_id, word_category, word_subcategory, word_id) DO UPDATE SET
                mistakes = excluded.mistakes,
                updated_at = excluded.updated_at
            ",
        )
        .bind(user.value())
        .bind(&key.category)
        .bind(&key.subcategory)
        .bind(i64::from(key.local_id))
        .bind(days_json(mistakes)?)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn clear_mistakes_batch(
        &self,
        user: UserId,
        keys: &[WordKey],
        now: DateTime<Utc>,
    ) -> Result<ClearOutcome, StorageError> {
        let mut outcome = ClearOutcome::default();
        let mut seen = HashSet::with_capacity(keys.len());
        for key in keys.iter().filter(|k| seen.insert(*k)) {
            match self.clear_one(user, key, now).await {
                Ok(Cleared::Deleted) => outcome.deleted += 1,
                Ok(Cleared::Updated) => outcome.updated += 1,
                Ok(Cleared::Missing) => outcome.not_found += 1,
                Err(e) => {
                    tracing::warn!(%key, error = %e, "failed to clear mistakes");
                    outcome.failed += 1;
                }
            }
        }
        Ok(outcome)
    }
}
