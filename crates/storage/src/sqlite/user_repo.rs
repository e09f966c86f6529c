use sqlx::Row;
use vocab_core::model::{DayStamp, User, UserId};

use super::SqliteRepository;
use super::mapping::{map_sqlx, map_user_row, ser};
use crate::repository::{StorageError, UserRepository};

#[async_trait::async_trait]
impl UserRepository for SqliteRepository {
    async fn insert_user(&self, user: &User) -> Result<(), StorageError> {
        sqlx::query("INSERT INTO users (id, email, created_at) VALUES (?1, ?2, ?3)")
            .bind(user.id.value())
            .bind(&user.email)
            .bind(user.created_at)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        let row = sqlx::query("SELECT id, email, created_at FROM users WHERE id = ?1")
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        row.as_ref().map(map_user_row).transpose()
    }

    async fn add_check_in(&self, id: UserId, day: DayStamp) -> Result<bool, StorageError> {
        let inserted = sqlx::query(
            "INSERT INTO user_check_ins (user_id, day) VALUES (?1, ?2) ON CONFLICT(user_id, day) DO NOTHING",
        )
        .bind(id.value())
        .bind(day.to_string())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?
        .rows_affected();
        Ok(inserted > 0)
    }

    async fn check_ins(&self, id: UserId) -> Result<Vec<DayStamp>, StorageError> {
        let rows = sqlx::query("SELECT day FROM user_check_ins WHERE user_id = ?1 ORDER BY day")
            .bind(id.value())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        rows.iter()
            .map(|row| {
                let raw: String = row.try_get("day").map_err(ser)?;
                raw.parse::<DayStamp>().map_err(ser)
            })
            .collect()
    }
}
