use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use thiserror::Error;

use statusquo_core::domain::installation::Installation;
use statusquo_core::domain::quote::{ModerationStatus, PendingQuote, Quote, QuoteId};
use statusquo_core::domain::rate_limit::RateLimitRecord;
use statusquo_core::domain::user::{TenantId, UserFilter, UserId};

pub mod filter;
pub mod installation;
pub mod memory;
pub mod pending;
pub mod quote;
pub mod rate_limit;

pub use filter::SqlFilterRepository;
pub use installation::SqlInstallationRepository;
pub use memory::{
    InMemoryFilterRepository, InMemoryInstallationRepository, InMemoryPendingQuoteRepository,
    InMemoryQuoteRepository, InMemoryRateLimitRepository,
};
pub use pending::SqlPendingQuoteRepository;
pub use quote::SqlQuoteRepository;
pub use rate_limit::SqlRateLimitRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("duplicate key: {0}")]
    Duplicate(String),
}

/// The live pool of approved quotes.
#[async_trait]
pub trait QuoteRepository: Send + Sync {
    /// Upsert keyed by id, so replaying an approval is harmless.
    async fn insert(&self, quote: Quote) -> Result<(), RepositoryError>;
    async fn delete(&self, id: &QuoteId) -> Result<bool, RepositoryError>;
    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError>;
    /// First quote (oldest) whose text equals `text` exactly.
    async fn find_by_text(&self, text: &str) -> Result<Option<Quote>, RepositoryError>;
    /// Case-sensitive substring match on the author.
    async fn find_by_author_containing(&self, needle: &str)
        -> Result<Vec<Quote>, RepositoryError>;
    /// Case-sensitive substring match on the text.
    async fn find_by_text_containing(&self, needle: &str) -> Result<Vec<Quote>, RepositoryError>;
    async fn list_all(&self) -> Result<Vec<Quote>, RepositoryError>;
}

#[async_trait]
pub trait PendingQuoteRepository: Send + Sync {
    async fn insert(&self, pending: PendingQuote) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<PendingQuote>, RepositoryError>;
    /// Moves a PENDING row to `decision`. False when the row is gone or another
    /// moderator already decided it.
    async fn claim(&self, id: &QuoteId, decision: ModerationStatus)
        -> Result<bool, RepositoryError>;
    async fn delete(&self, id: &QuoteId) -> Result<bool, RepositoryError>;
    /// Oldest first.
    async fn list_pending(&self) -> Result<Vec<PendingQuote>, RepositoryError>;
    /// Claimed rows whose moderation never finished, oldest first.
    async fn list_decided(&self) -> Result<Vec<PendingQuote>, RepositoryError>;
    /// Rows still PENDING for `proposer`; exact where the counter is best-effort.
    async fn count_by_proposer(&self, proposer: &UserId) -> Result<u32, RepositoryError>;
}

#[async_trait]
pub trait FilterRepository: Send + Sync {
    async fn find(&self, user_id: &UserId) -> Result<Option<UserFilter>, RepositoryError>;
    async fn save(&self, filter: UserFilter) -> Result<(), RepositoryError>;
    async fn clear(&self, user_id: &UserId) -> Result<bool, RepositoryError>;
}

/// Per-user counters. Every write is a single atomic upsert on the user's row; a
/// missing row is created with zeroed counters first.
#[async_trait]
pub trait RateLimitRepository: Send + Sync {
    async fn find(&self, user_id: &UserId) -> Result<Option<RateLimitRecord>, RepositoryError>;

    async fn record_update_attempt(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<(), RepositoryError>;

    async fn increment_pending(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
        today: NaiveDate,
        stale_after: Duration,
    ) -> Result<(), RepositoryError>;

    async fn process_approval(
        &self,
        user_id: &UserId,
        today: NaiveDate,
    ) -> Result<(), RepositoryError>;

    async fn process_denial(&self, user_id: &UserId) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait InstallationRepository: Send + Sync {
    async fn save(&self, installation: Installation) -> Result<(), RepositoryError>;

    /// With no user, the tenant's most recently saved installation.
    async fn find(
        &self,
        tenant_id: &TenantId,
        user_id: Option<&UserId>,
    ) -> Result<Option<Installation>, RepositoryError>;

    async fn list_all(&self) -> Result<Vec<Installation>, RepositoryError>;
}
