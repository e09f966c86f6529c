use std::collections::HashMap;

use sqlx::{QueryBuilder, Row, Sqlite};
use vocab_core::model::{CatalogScope, WordEntry, WordKey};

use super::SqliteRepository;
use super::mapping::{
    count_from_i64, keys_json, map_sqlx, map_word_row, ser, window_limit, window_offset,
};
use crate::repository::{StorageError, Window, WordFilter, WordSource};

const GLOBAL_COLUMNS: &str = "w.category, w.subcategory, w.local_id, w.word, w.meaning, \
     w.example, w.example_cn, w.phonetic, w.audio, w.part_of_speech, w.example_audio";

const CUSTOM_COLUMNS: &str = "w.category, w.subcategory, w.local_id, w.word, w.meaning, \
     w.example, w.example_cn, NULL AS phonetic, NULL AS audio, NULL AS part_of_speech, \
     NULL AS example_audio";

/// Starts `SELECT <projection> FROM <catalog> w WHERE <scope>`.
fn scoped<'a>(scope: CatalogScope, projection: Option<&str>) -> QueryBuilder<'a, Sqlite> {
    let mut qb = QueryBuilder::new("SELECT ");
    match scope {
        CatalogScope::Global => {
            qb.push(projection.unwrap_or(GLOBAL_COLUMNS));
            qb.push(" FROM words w WHERE 1=1");
        }
        CatalogScope::Custom(owner) => {
            qb.push(projection.unwrap_or(CUSTOM_COLUMNS));
            qb.push(" FROM custom_words w WHERE w.owner_id = ");
            qb.push_bind(owner.value());
        }
    }
    qb
}

/// Matches `w` against a JSON array of `[category, subcategory, id]` tuples.
const KEY_MATCH: &str = "SELECT 1 FROM json_each(";
const KEY_MATCH_TAIL: &str = ") k WHERE json_extract(k.value, '$[0]') = w.category \
     AND json_extract(k.value, '$[1]') = w.subcategory \
     AND json_extract(k.value, '$[2]') = w.local_id)";

fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &WordFilter) -> Result<(), StorageError> {
    if let Some(category) = &filter.category {
        qb.push(" AND w.category = ");
        qb.push_bind(category.clone());
    }
    if let Some(subcategory) = &filter.subcategory {
        qb.push(" AND w.subcategory = ");
        qb.push_bind(subcategory.clone());
    }
    if !filter.exclude.is_empty() {
        qb.push(" AND NOT EXISTS (");
        qb.push(KEY_MATCH);
        qb.push_bind(keys_json(&filter.exclude)?);
        qb.push(KEY_MATCH_TAIL);
    }
    Ok(())
}

#[async_trait::async_trait]
impl WordSource for SqliteRepository {
    async fn fetch_page(
        &self,
        scope: CatalogScope,
        filter: &WordFilter,
        window: Window,
    ) -> Result<Vec<WordEntry>, StorageError> {
        let mut qb = scoped(scope, None);
        push_filter(&mut qb, filter)?;
        qb.push(" ORDER BY w.local_id, w.category, w.subcategory LIMIT ");
        qb.push_bind(window_limit(window.limit));
        qb.push(" OFFSET ");
        qb.push_bind(window_offset(window.offset)?);

        let rows = qb.build().fetch_all(&self.pool).await.map_err(map_sqlx)?;
        rows.iter().map(map_word_row).collect()
    }

    async fn count(&self, scope: CatalogScope, filter: &WordFilter) -> Result<u64, StorageError> {
        let mut qb = scoped(scope, Some("COUNT(*) AS n"));
        push_filter(&mut qb, filter)?;
        let row = qb.build().fetch_one(&self.pool).await.map_err(map_sqlx)?;
        count_from_i64(row.try_get::<i64, _>("n").map_err(ser)?)
    }

    async fn count_by_subcategory(
        &self,
        scope: CatalogScope,
    ) -> Result<HashMap<(String, String), u64>, StorageError> {
        let mut qb = scoped(scope, Some("w.category, w.subcategory, COUNT(*) AS n"));
        qb.push(" GROUP BY w.category, w.subcategory");
        let rows = qb.build().fetch_all(&self.pool).await.map_err(map_sqlx)?;

        let mut totals = HashMap::with_capacity(rows.len());
        for row in &rows {
            let category: String = row.try_get("category").map_err(ser)?;
            let subcategory: String = row.try_get("subcategory").map_err(ser)?;
            let n = count_from_i64(row.try_get::<i64, _>("n").map_err(ser)?)?;
            totals.insert((category, subcategory), n);
        }
        Ok(totals)
    }

    async fn fetch_by_keys(
        &self,
        scope: CatalogScope,
        keys: &[WordKey],
    ) -> Result<Vec<WordEntry>, StorageError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb = scoped(scope, None);
        qb.push(" AND EXISTS (");
        qb.push(KEY_MATCH);
        qb.push_bind(keys_json(keys)?);
        qb.push(KEY_MATCH_TAIL);

        let rows = qb.build().fetch_all(&self.pool).await.map_err(map_sqlx)?;
        rows.iter().map(map_word_row).collect()
    }

    async fn fetch_one(
        &self,
        scope: CatalogScope,
        key: &WordKey,
    ) -> Result<Option<WordEntry>, StorageError> {
        let mut qb = scoped(scope, None);
        qb.push(" AND w.category = ");
        qb.push_bind(key.category.clone());
        qb.push(" AND w.subcategory = ");
        qb.push_bind(key.subcategory.clone());
        qb.push(" AND w.local_id = ");
        qb.push_bind(i64::from(key.local_id));

        let row = qb
            .build()
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        row.as_ref().map(map_word_row).transpose()
    }
}
