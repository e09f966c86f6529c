use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

const SCHEMA_V1: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS word_categories (
            category TEXT NOT NULL,
            category_name TEXT NOT NULL,
            subcategory TEXT NOT NULL,
            subcategory_name TEXT NOT NULL,
            PRIMARY KEY (category, subcategory)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS words (
            category TEXT NOT NULL,
            subcategory TEXT NOT NULL,
            local_id INTEGER NOT NULL CHECK (local_id >= 1),
            word TEXT NOT NULL,
            meaning TEXT NOT NULL,
            example TEXT NOT NULL DEFAULT '',
            example_cn TEXT NOT NULL DEFAULT '',
            phonetic TEXT,
            audio TEXT,
            part_of_speech TEXT NOT NULL DEFAULT '[]',
            example_audio TEXT,
            PRIMARY KEY (category, subcategory, local_id)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS custom_categories (
            owner_id BLOB NOT NULL,
            category TEXT NOT NULL,
            category_name TEXT NOT NULL,
            subcategory TEXT NOT NULL,
            subcategory_name TEXT NOT NULL,
            emoji TEXT NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (owner_id, category, subcategory),
            UNIQUE (owner_id, subcategory)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS custom_words (
            owner_id BLOB NOT NULL,
            category TEXT NOT NULL,
            subcategory TEXT NOT NULL,
            local_id INTEGER NOT NULL CHECK (local_id >= 1),
            word TEXT NOT NULL,
            meaning TEXT NOT NULL,
            example TEXT NOT NULL DEFAULT '',
            example_cn TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            PRIMARY KEY (owner_id, category, subcategory, local_id)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS user_words (
            id INTEGER PRIMARY KEY,
            user_id BLOB NOT NULL,
            word_category TEXT NOT NULL,
            word_subcategory TEXT NOT NULL,
            word_id INTEGER NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('unmarked', 'unknown', 'known')),
            mistakes TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (user_id, word_category, word_subcategory, word_id)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS users (
            id BLOB PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS user_check_ins (
            user_id BLOB NOT NULL,
            day TEXT NOT NULL,
            PRIMARY KEY (user_id, day)
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_words_local_id
            ON words (local_id, category, subcategory);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_user_words_user_status_updated
            ON user_words (user_id, status, updated_at);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_user_words_user_updated
            ON user_words (user_id, updated_at);
    ",
];

/// Runs a single, consolidated migration for the current schema.
///
/// Creates the shared catalog, custom catalogs, progress overlays, users and
/// check-ins. Overlays join catalogs on `(category, subcategory, local id)`
/// only, so there are no foreign keys between them.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        for statement in SCHEMA_V1 {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(version = 1, "applied schema migration");
    }

    Ok(())
}
