use chrono::Utc;
use sqlx::Row;

use statusquo_core::domain::user::{UserFilter, UserId};

use super::{FilterRepository, RepositoryError};
use crate::DbPool;

pub struct SqlFilterRepository {
    pool: DbPool,
}

impl SqlFilterRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl FilterRepository for SqlFilterRepository {
    async fn find(&self, user_id: &UserId) -> Result<Option<UserFilter>, RepositoryError> {
        let row = sqlx::query("SELECT user_id, author_filter FROM user_filters WHERE user_id = ?")
            .bind(&user_id.0)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let user_id: String =
            row.try_get("user_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let author_filter: String =
            row.try_get("author_filter").map_err(|e| RepositoryError::Decode(e.to_string()))?;

        Ok(Some(UserFilter { user_id: UserId(user_id), author_filter }))
    }

    async fn save(&self, filter: UserFilter) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO user_filters (user_id, author_filter, updated_at)
             VALUES (?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                 author_filter = excluded.author_filter,
                 updated_at = excluded.updated_at",
        )
        .bind(&filter.user_id.0)
        .bind(&filter.author_filter)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn clear(&self, user_id: &UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM user_filters WHERE user_id = ?")
            .bind(&user_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
