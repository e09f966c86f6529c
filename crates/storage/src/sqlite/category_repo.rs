use vocab_core::model::{CategoryDescriptor, CustomCategory, UserId, WordEntry};

use super::SqliteRepository;
use super::mapping::{map_custom_category_row, map_descriptor_row, map_sqlx, ser};
use crate::repository::{CascadeReport, CatalogWriter, CategoryRepository, StorageError};

const CUSTOM_CATEGORY_COLUMNS: &str =
    "owner_id, category, category_name, subcategory, subcategory_name, emoji, created_at";

#[async_trait::async_trait]
impl CategoryRepository for SqliteRepository {
    async fn global_categories(&self) -> Result<Vec<CategoryDescriptor>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT category, category_name, subcategory, subcategory_name
            FROM word_categories
            ORDER BY category, subcategory
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        rows.iter().map(map_descriptor_row).collect()
    }

    async fn custom_categories(&self, owner: UserId) -> Result<Vec<CustomCategory>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {CUSTOM_CATEGORY_COLUMNS} FROM custom_categories \
             WHERE owner_id = ?1 ORDER BY created_at DESC, subcategory"
        ))
        .bind(owner.value())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        rows.iter().map(map_custom_category_row).collect()
    }

    async fn create_custom_category(
        &self,
        category: &CustomCategory,
        words: &[WordEntry],
    ) -> Result<(), StorageError> {
        let owner = category.owner.value();
        let d = &category.descriptor;
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        sqlx::query(
            r"
            INSERT INTO custom_categories (owner_id, category, category_name, subcategory, subcategory_name, emoji, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(owner)
        .bind(&d.category)
        .bind(&d.category_name)
        .bind(&d.subcategory)
        .bind(&d.subcategory_name)
        .bind(&category.emoji)
        .bind(category.created_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        for word in words {
            sqlx::query(
                r"
                INSERT INTO custom_words (owner_id, category, subcategory, local_id, word, meaning, example, example_cn, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ",
            )
            .bind(owner)
            .bind(&word.category)
            .bind(&word.subcategory)
            .bind(i64::from(word.local_id))
            .bind(&word.word)
            .bind(&word.meaning)
            .bind(&word.example)
            .bind(&word.example_cn)
            .bind(category.created_at)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        }

        tx.commit().await.map_err(map_sqlx)?;
        tracing::debug!(
            owner = %category.owner,
            subcategory = %d.subcategory,
            words = words.len(),
            "created custom category"
        );
        Ok(())
    }

    async fn delete_custom_category(
        &self,
        owner: UserId,
        category: &str,
        subcategory: &str,
    ) -> Result<CascadeReport, StorageError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        let removed = sqlx::query(
            "DELETE FROM custom_categories WHERE owner_id = ?1 AND category = ?2 AND subcategory = ?3",
        )
        .bind(owner.value())
        .bind(category)
        .bind(subcategory)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?
        .rows_affected();
        if removed == 0 {
            return Err(StorageError::NotFound);
        }

        let words_deleted = sqlx::query(
            "DELETE FROM custom_words WHERE owner_id = ?1 AND category = ?2 AND subcategory = ?3",
        )
        .bind(owner.value())
        .bind(category)
        .bind(subcategory)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?
        .rows_affected();

        let overlays_deleted = sqlx::query(
            "DELETE FROM user_words WHERE user_id = ?1 AND word_category = ?2 AND word_subcategory = ?3",
        )
        .bind(owner.value())
        .bind(category)
        .bind(subcategory)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?
        .rows_affected();

        tx.commit().await.map_err(map_sqlx)?;
        Ok(CascadeReport {
            words_deleted,
            overlays_deleted,
        })
    }
}

#[async_trait::async_trait]
impl CatalogWriter for SqliteRepository {
    async fn import_categories(
        &self,
        descriptors: &[CategoryDescriptor],
    ) -> Result<u64, StorageError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        for d in descriptors {
            sqlx::query(
                r"
                INSERT INTO word_categories (category, category_name, subcategory, subcategory_name)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(category, subcategory) DO UPDATE SET
                    category_name = excluded.category_name,
                    subcategory_name = excluded.subcategory_name
                ",
            )
            .bind(&d.category)
            .bind(&d.category_name)
            .bind(&d.subcategory)
            .bind(&d.subcategory_name)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        }
        tx.commit().await.map_err(map_sqlx)?;
        Ok(descriptors.len() as u64)
    }

    async fn import_words(&self, words: &[WordEntry]) -> Result<u64, StorageError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        for w in words {
            let part_of_speech = serde_json::to_string(&w.part_of_speech).map_err(ser)?;
            sqlx::query(
                r"
                INSERT INTO words (category, subcategory, local_id, word, meaning, example, example_cn, phonetic, audio, part_of_speech, example_audio)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                ON CONFLICT(category, subcategory, local_id) DO UPDATE SET
                    word = excluded.word,
                    meaning = excluded.meaning,
                    example = excluded.example,
                    example_cn = excluded.example_cn,
                    phonetic = excluded.phonetic,
                    audio = excluded.audio,
                    part_of_speech = excluded.part_of_speech,
                    example_audio = excluded.example_audio
                ",
            )
            .bind(&w.category)
            .bind(&w.subcategory)
            .bind(i64::from(w.local_id))
            .bind(&w.word)
            .bind(&w.meaning)
            .bind(&w.example)
            .bind(&w.example_cn)
            .bind(&w.phonetic)
            .bind(&w.audio)
            .bind(part_of_speech)
            .bind(&w.example_audio)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        }
        tx.commit().await.map_err(map_sqlx)?;
        Ok(words.len() as u64)
    }

    async fn clear_global_catalog(&self) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        sqlx::query("DELETE FROM words")
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        sqlx::query("DELETE FROM word_categories")
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        tx.commit().await.map_err(map_sqlx)?;
        tracing::info!("cleared global catalog");
        Ok(())
    }
}
