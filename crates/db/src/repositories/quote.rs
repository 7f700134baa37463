use chrono::Utc;
use sqlx::Row;

use statusquo_core::domain::quote::{Quote, QuoteId};

use super::{QuoteRepository, RepositoryError};
use crate::DbPool;

pub struct SqlQuoteRepository {
    pool: DbPool,
}

impl SqlQuoteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_quote(row: &sqlx::sqlite::SqliteRow) -> Result<Quote, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let text: String = row.try_get("text").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let author: String =
        row.try_get("author").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let emoji: String =
        row.try_get("emoji").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Quote { id: QuoteId(id), text, author, emoji })
}

#[async_trait::async_trait]
impl QuoteRepository for SqlQuoteRepository {
    async fn insert(&self, quote: Quote) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO quotes (id, text, author, emoji, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 text = excluded.text,
                 author = excluded.author,
                 emoji = excluded.emoji",
        )
        .bind(&quote.id.0)
        .bind(&quote.text)
        .bind(&quote.author)
        .bind(&quote.emoji)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, id: &QuoteId) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM quotes WHERE id = ?").bind(&id.0).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        let row = sqlx::query("SELECT id, text, author, emoji FROM quotes WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_quote).transpose()
    }

    async fn find_by_text(&self, text: &str) -> Result<Option<Quote>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, text, author, emoji FROM quotes
             WHERE text = ?
             ORDER BY rowid ASC
             LIMIT 1",
        )
        .bind(text)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_quote).transpose()
    }

    async fn find_by_author_containing(
        &self,
        needle: &str,
    ) -> Result<Vec<Quote>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, text, author, emoji FROM quotes
             WHERE instr(author, ?) > 0
             ORDER BY rowid ASC",
        )
        .bind(needle)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_quote).collect()
    }

    async fn find_by_text_containing(&self, needle: &str) -> Result<Vec<Quote>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, text, author, emoji FROM quotes
             WHERE instr(text, ?) > 0
             ORDER BY rowid ASC",
        )
        .bind(needle)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_quote).collect()
    }

    async fn list_all(&self) -> Result<Vec<Quote>, RepositoryError> {
        let rows = sqlx::query("SELECT id, text, author, emoji FROM quotes ORDER BY rowid ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_quote).collect()
    }
}

#[cfg(test)]
mod tests {
    use statusquo_core::domain::quote::{Quote, QuoteId};

    use super::SqlQuoteRepository;
    use crate::repositories::QuoteRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> SqlQuoteRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlQuoteRepository::new(pool)
    }

    fn quote(id: &str, text: &str, author: &str) -> Quote {
        Quote {
            id: QuoteId(id.to_string()),
            text: text.to_string(),
            author: author.to_string(),
            emoji: ":wave:".to_string(),
        }
    }

    #[tokio::test]
    async fn insert_is_an_upsert_by_id() {
        let repo = setup().await;
        repo.insert(quote("q-1", "Hi", "Bob")).await.expect("insert");
        repo.insert(quote("q-1", "Hi there", "Bob")).await.expect("replay");

        let all = repo.list_all().await.expect("list");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].text, "Hi there");
    }

    #[tokio::test]
    async fn exact_text_lookup_returns_first_inserted() {
        let repo = setup().await;
        repo.insert(quote("q-1", "Stay hungry", "Jobs")).await.expect("insert 1");
        repo.insert(quote("q-2", "Stay hungry", "Someone")).await.expect("insert 2");

        let found = repo.find_by_text("Stay hungry").await.expect("find").expect("present");
        assert_eq!(found.author, "Jobs");
        assert!(repo.find_by_text("stay hungry").await.expect("find").is_none());
    }

    #[tokio::test]
    async fn author_search_is_case_sensitive_substring() {
        let repo = setup().await;
        repo.insert(quote("q-1", "A", "Yoda")).await.expect("insert");
        repo.insert(quote("q-2", "B", "Master Yoda")).await.expect("insert");
        repo.insert(quote("q-3", "C", "Obi-Wan")).await.expect("insert");

        let matches = repo.find_by_author_containing("Yoda").await.expect("search");
        assert_eq!(matches.len(), 2);
        assert!(repo.find_by_author_containing("yoda").await.expect("search").is_empty());
    }

    #[tokio::test]
    async fn text_search_and_delete() {
        let repo = setup().await;
        repo.insert(quote("q-1", "The force is strong", "Vader")).await.expect("insert");
        repo.insert(quote("q-2", "Use the force", "Obi-Wan")).await.expect("insert");

        assert_eq!(repo.find_by_text_containing("force").await.expect("search").len(), 2);

        assert!(repo.delete(&QuoteId("q-1".to_string())).await.expect("delete"));
        assert!(!repo.delete(&QuoteId("q-1".to_string())).await.expect("delete again"));
        assert!(repo.find_by_id(&QuoteId("q-1".to_string())).await.expect("find").is_none());
    }
}
