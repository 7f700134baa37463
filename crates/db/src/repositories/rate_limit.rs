use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::Row;

use statusquo_core::domain::rate_limit::RateLimitRecord;
use statusquo_core::domain::user::UserId;

use super::{RateLimitRepository, RepositoryError};
use crate::DbPool;

/// Counter storage. Each write is one `INSERT .. ON CONFLICT DO UPDATE` whose CASE
/// arms mirror the `RateLimitRecord::record_*` rules, so concurrent writers for the
/// same user never lose an increment.
pub struct SqlRateLimitRepository {
    pool: DbPool,
}

impl SqlRateLimitRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode_count(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<u32, RepositoryError> {
    let value: i64 = row.try_get(column).map_err(|e| RepositoryError::Decode(e.to_string()))?;
    u32::try_from(value).map_err(|_| RepositoryError::Decode(format!("{column} out of range")))
}

fn decode_epoch(
    row: &sqlx::sqlite::SqliteRow,
    column: &str,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    let value: Option<i64> =
        row.try_get(column).map_err(|e| RepositoryError::Decode(e.to_string()))?;
    value
        .map(|secs| {
            DateTime::<Utc>::from_timestamp(secs, 0)
                .ok_or_else(|| RepositoryError::Decode(format!("{column} out of range")))
        })
        .transpose()
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<RateLimitRecord, RepositoryError> {
    let user_id: String =
        row.try_get("user_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let last_activity_date: Option<String> =
        row.try_get("last_activity_date").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let last_activity_date = last_activity_date
        .map(|raw| {
            raw.parse::<NaiveDate>()
                .map_err(|e| RepositoryError::Decode(format!("last_activity_date: {e}")))
        })
        .transpose()?;

    Ok(RateLimitRecord {
        user_id: UserId(user_id),
        window_start: decode_epoch(row, "window_start")?,
        window_count: decode_count(row, "window_count")?,
        pending_count: decode_count(row, "pending_count")?,
        daily_approved_count: decode_count(row, "daily_approved_count")?,
        last_activity_date,
        last_submission_at: decode_epoch(row, "last_submission_at")?,
    })
}

#[async_trait::async_trait]
impl RateLimitRepository for SqlRateLimitRepository {
    async fn find(&self, user_id: &UserId) -> Result<Option<RateLimitRecord>, RepositoryError> {
        let row = sqlx::query(
            "SELECT user_id, window_start, window_count, pending_count, daily_approved_count,
                    last_activity_date, last_submission_at
             FROM rate_limits WHERE user_id = ?",
        )
        .bind(&user_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn record_update_attempt(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO rate_limits (user_id, window_start, window_count)
             VALUES (?1, ?2, 1)
             ON CONFLICT(user_id) DO UPDATE SET
                 window_start = CASE
                     WHEN rate_limits.window_start IS NULL
                          OR ?2 - rate_limits.window_start > ?3 THEN ?2
                     ELSE rate_limits.window_start
                 END,
                 window_count = CASE
                     WHEN rate_limits.window_start IS NULL
                          OR ?2 - rate_limits.window_start > ?3 THEN 1
                     ELSE rate_limits.window_count + 1
                 END",
        )
        .bind(&user_id.0)
        .bind(now.timestamp())
        .bind(window.num_seconds())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn increment_pending(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
        today: NaiveDate,
        stale_after: Duration,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO rate_limits
                 (user_id, pending_count, daily_approved_count, last_activity_date,
                  last_submission_at)
             VALUES (?1, 1, 0, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET
                 pending_count = CASE
                     WHEN rate_limits.last_submission_at IS NULL
                          OR ?3 - rate_limits.last_submission_at > ?4 THEN 1
                     ELSE rate_limits.pending_count + 1
                 END,
                 daily_approved_count = CASE
                     WHEN rate_limits.last_activity_date IS ?2
                         THEN rate_limits.daily_approved_count
                     ELSE 0
                 END,
                 last_activity_date = ?2,
                 last_submission_at = ?3",
        )
        .bind(&user_id.0)
        .bind(today.to_string())
        .bind(now.timestamp())
        .bind(stale_after.num_seconds())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn process_approval(
        &self,
        user_id: &UserId,
        today: NaiveDate,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO rate_limits
                 (user_id, pending_count, daily_approved_count, last_activity_date)
             VALUES (?1, 0, 1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET
                 pending_count = MAX(rate_limits.pending_count - 1, 0),
                 daily_approved_count = CASE
                     WHEN rate_limits.last_activity_date IS ?2
                         THEN rate_limits.daily_approved_count + 1
                     ELSE 1
                 END,
                 last_activity_date = ?2",
        )
        .bind(&user_id.0)
        .bind(today.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn process_denial(&self, user_id: &UserId) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO rate_limits (user_id, pending_count)
             VALUES (?1, 0)
             ON CONFLICT(user_id) DO UPDATE SET
                 pending_count = MAX(rate_limits.pending_count - 1, 0)",
        )
        .bind(&user_id.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
