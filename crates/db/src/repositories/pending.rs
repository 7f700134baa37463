use chrono::{DateTime, Utc};
use sqlx::Row;

use statusquo_core::domain::quote::{ModerationStatus, PendingQuote, QuoteId};
use statusquo_core::domain::user::UserId;

use super::{PendingQuoteRepository, RepositoryError};
use crate::DbPool;

pub struct SqlPendingQuoteRepository {
    pool: DbPool,
}

impl SqlPendingQuoteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_pending(row: &sqlx::sqlite::SqliteRow) -> Result<PendingQuote, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let text: String = row.try_get("text").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let author: String =
        row.try_get("author").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let emoji: String =
        row.try_get("emoji").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let proposer: String =
        row.try_get("proposer").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let status = ModerationStatus::parse(&status_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown status `{status_str}`")))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("created_at: {e}")))?;

    Ok(PendingQuote {
        id: QuoteId(id),
        text,
        author,
        emoji,
        proposer: UserId(proposer),
        status,
        created_at,
    })
}

#[async_trait::async_trait]
impl PendingQuoteRepository for SqlPendingQuoteRepository {
    async fn insert(&self, pending: PendingQuote) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO pending_quotes (id, text, author, emoji, proposer, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&pending.id.0)
        .bind(&pending.text)
        .bind(&pending.author)
        .bind(&pending.emoji)
        .bind(&pending.proposer.0)
        .bind(pending.status.as_str())
        .bind(pending.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|error| match error {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepositoryError::Duplicate(format!("pending id `{}`", pending.id))
            }
            other => RepositoryError::Database(other),
        })?;

        Ok(())
    }

    async fn claim(
        &self,
        id: &QuoteId,
        decision: ModerationStatus,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE pending_quotes SET status = ? WHERE id = ? AND status = 'PENDING'",
        )
        .bind(decision.as_str())
        .bind(&id.0)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<PendingQuote>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, text, author, emoji, proposer, status, created_at
             FROM pending_quotes WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_pending).transpose()
    }

    async fn delete(&self, id: &QuoteId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM pending_quotes WHERE id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_pending(&self) -> Result<Vec<PendingQuote>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, text, author, emoji, proposer, status, created_at
             FROM pending_quotes
             WHERE status = 'PENDING'
             ORDER BY created_at ASC, rowid ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_pending).collect()
    }

    async fn list_decided(&self) -> Result<Vec<PendingQuote>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, text, author, emoji, proposer, status, created_at
             FROM pending_quotes
             WHERE status <> 'PENDING'
             ORDER BY created_at ASC, rowid ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_pending).collect()
    }

    async fn count_by_proposer(&self, proposer: &UserId) -> Result<u32, RepositoryError> {
        let count: i64 = sqlx::query(
            "SELECT COUNT(*) AS count FROM pending_quotes
             WHERE proposer = ? AND status = 'PENDING'",
        )
        .bind(&proposer.0)
        .fetch_one(&self.pool)
        .await?
        .try_get("count")
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;

        u32::try_from(count).map_err(|e| RepositoryError::Decode(e.to_string()))
    }
}
