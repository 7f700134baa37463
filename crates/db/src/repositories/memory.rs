use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tokio::sync::RwLock;

use statusquo_core::domain::installation::Installation;
use statusquo_core::domain::quote::{ModerationStatus, PendingQuote, Quote, QuoteId};
use statusquo_core::domain::rate_limit::RateLimitRecord;
use statusquo_core::domain::user::{TenantId, UserFilter, UserId};

use super::{
    FilterRepository, InstallationRepository, PendingQuoteRepository, QuoteRepository,
    RateLimitRepository, RepositoryError,
};

/// Insertion-ordered so lookups match the SQL `rowid` ordering.
#[derive(Default)]
pub struct InMemoryQuoteRepository {
    quotes: RwLock<Vec<Quote>>,
}

#[async_trait::async_trait]
impl QuoteRepository for InMemoryQuoteRepository {
    async fn insert(&self, quote: Quote) -> Result<(), RepositoryError> {
        let mut quotes = self.quotes.write().await;
        match quotes.iter_mut().find(|existing| existing.id == quote.id) {
            Some(existing) => *existing = quote,
            None => quotes.push(quote),
        }
        Ok(())
    }

    async fn delete(&self, id: &QuoteId) -> Result<bool, RepositoryError> {
        let mut quotes = self.quotes.write().await;
        let before = quotes.len();
        quotes.retain(|quote| &quote.id != id);
        Ok(quotes.len() != before)
    }

    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        let quotes = self.quotes.read().await;
        Ok(quotes.iter().find(|quote| &quote.id == id).cloned())
    }

    async fn find_by_text(&self, text: &str) -> Result<Option<Quote>, RepositoryError> {
        let quotes = self.quotes.read().await;
        Ok(quotes.iter().find(|quote| quote.text == text).cloned())
    }

    async fn find_by_author_containing(
        &self,
        needle: &str,
    ) -> Result<Vec<Quote>, RepositoryError> {
        let quotes = self.quotes.read().await;
        Ok(quotes.iter().filter(|quote| quote.author_contains(needle)).cloned().collect())
    }

    async fn find_by_text_containing(&self, needle: &str) -> Result<Vec<Quote>, RepositoryError> {
        let quotes = self.quotes.read().await;
        Ok(quotes.iter().filter(|quote| quote.text.contains(needle)).cloned().collect())
    }

    async fn list_all(&self) -> Result<Vec<Quote>, RepositoryError> {
        Ok(self.quotes.read().await.clone())
    }
}

#[derive(Default)]
pub struct InMemoryPendingQuoteRepository {
    pending: RwLock<Vec<PendingQuote>>,
}

#[async_trait::async_trait]
impl PendingQuoteRepository for InMemoryPendingQuoteRepository {
    async fn insert(&self, pending: PendingQuote) -> Result<(), RepositoryError> {
        let mut rows = self.pending.write().await;
        if rows.iter().any(|row| row.id == pending.id) {
            return Err(RepositoryError::Duplicate(format!("pending id `{}`", pending.id)));
        }
        rows.push(pending);
        Ok(())
    }

    async fn claim(
        &self,
        id: &QuoteId,
        decision: ModerationStatus,
    ) -> Result<bool, RepositoryError> {
        let mut rows = self.pending.write().await;
        match rows.iter_mut().find(|row| &row.id == id) {
            Some(row) if row.status == ModerationStatus::Pending => {
                row.status = decision;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<PendingQuote>, RepositoryError> {
        let rows = self.pending.read().await;
        Ok(rows.iter().find(|row| &row.id == id).cloned())
    }

    async fn delete(&self, id: &QuoteId) -> Result<bool, RepositoryError> {
        let mut rows = self.pending.write().await;
        let before = rows.len();
        rows.retain(|row| &row.id != id);
        Ok(rows.len() != before)
    }

    async fn list_pending(&self) -> Result<Vec<PendingQuote>, RepositoryError> {
        let rows = self.pending.read().await;
        let mut pending: Vec<PendingQuote> =
            rows.iter().filter(|row| row.status == ModerationStatus::Pending).cloned().collect();
        pending.sort_by_key(|row| row.created_at);
        Ok(pending)
    }

    async fn list_decided(&self) -> Result<Vec<PendingQuote>, RepositoryError> {
        let rows = self.pending.read().await;
        let mut decided: Vec<PendingQuote> =
            rows.iter().filter(|row| row.status != ModerationStatus::Pending).cloned().collect();
        decided.sort_by_key(|row| row.created_at);
        Ok(decided)
    }

    async fn count_by_proposer(&self, proposer: &UserId) -> Result<u32, RepositoryError> {
        let rows = self.pending.read().await;
        let count = rows
            .iter()
            .filter(|row| &row.proposer == proposer && row.status == ModerationStatus::Pending)
            .count();
        u32::try_from(count).map_err(|e| RepositoryError::Decode(e.to_string()))
    }
}

#[derive(Default)]
pub struct InMemoryFilterRepository {
    filters: RwLock<HashMap<String, UserFilter>>,
}

#[async_trait::async_trait]
impl FilterRepository for InMemoryFilterRepository {
    async fn find(&self, user_id: &UserId) -> Result<Option<UserFilter>, RepositoryError> {
        let filters = self.filters.read().await;
        Ok(filters.get(&user_id.0).cloned())
    }

    async fn save(&self, filter: UserFilter) -> Result<(), RepositoryError> {
        let mut filters = self.filters.write().await;
        filters.insert(filter.user_id.0.clone(), filter);
        Ok(())
    }

    async fn clear(&self, user_id: &UserId) -> Result<bool, RepositoryError> {
        let mut filters = self.filters.write().await;
        Ok(filters.remove(&user_id.0).is_some())
    }
}

/// Holds the write lock for the whole read-modify-write, which gives the same
/// per-user atomicity as the SQL upserts.
#[derive(Default)]
pub struct InMemoryRateLimitRepository {
    records: RwLock<HashMap<String, RateLimitRecord>>,
}

impl InMemoryRateLimitRepository {
    async fn update(&self, user_id: &UserId, apply: impl FnOnce(&mut RateLimitRecord) + Send) {
        let mut records = self.records.write().await;
        let record = records
            .entry(user_id.0.clone())
            .or_insert_with(|| RateLimitRecord::new(user_id.clone()));
        apply(record);
    }
}

#[async_trait::async_trait]
impl RateLimitRepository for InMemoryRateLimitRepository {
    async fn find(&self, user_id: &UserId) -> Result<Option<RateLimitRecord>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records.get(&user_id.0).cloned())
    }

    async fn record_update_attempt(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<(), RepositoryError> {
        self.update(user_id, |record| record.record_update_attempt(now, window)).await;
        Ok(())
    }

    async fn increment_pending(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
        today: NaiveDate,
        stale_after: Duration,
    ) -> Result<(), RepositoryError> {
        self.update(user_id, |record| record.record_submission(now, today, stale_after)).await;
        Ok(())
    }

    async fn process_approval(
        &self,
        user_id: &UserId,
        today: NaiveDate,
    ) -> Result<(), RepositoryError> {
        self.update(user_id, |record| record.record_approval(today)).await;
        Ok(())
    }

    async fn process_denial(&self, user_id: &UserId) -> Result<(), RepositoryError> {
        self.update(user_id, RateLimitRecord::record_denial).await;
        Ok(())
    }
}

/// Saves move the row to the end, so the last row of a tenant is its most recent.
#[derive(Default)]
pub struct InMemoryInstallationRepository {
    installations: RwLock<Vec<Installation>>,
}

#[async_trait::async_trait]
impl InstallationRepository for InMemoryInstallationRepository {
    async fn save(&self, installation: Installation) -> Result<(), RepositoryError> {
        let mut rows = self.installations.write().await;
        rows.retain(|row| {
            !(row.tenant_id == installation.tenant_id && row.user_id == installation.user_id)
        });
        rows.push(installation);
        Ok(())
    }

    async fn find(
        &self,
        tenant_id: &TenantId,
        user_id: Option<&UserId>,
    ) -> Result<Option<Installation>, RepositoryError> {
        let rows = self.installations.read().await;
        let found = rows
            .iter()
            .rev()
            .filter(|row| &row.tenant_id == tenant_id)
            .find(|row| user_id.map_or(true, |user_id| &row.user_id == user_id));
        Ok(found.cloned())
    }

    async fn list_all(&self) -> Result<Vec<Installation>, RepositoryError> {
        let mut rows = self.installations.read().await.clone();
        rows.sort_by(|a, b| (&a.tenant_id, &a.user_id).cmp(&(&b.tenant_id, &b.user_id)));
        Ok(rows)
    }
}
