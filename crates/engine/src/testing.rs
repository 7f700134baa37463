use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use secrecy::{ExposeSecret, SecretString};

use statusquo_core::clock::ManualClock;
use statusquo_core::domain::installation::{Installation, TokenGrant, UserAuthorization};
use statusquo_core::domain::quote::{ModerationStatus, PendingQuote, Quote, QuoteId};
use statusquo_core::domain::rate_limit::RateLimitRecord;
use statusquo_core::domain::user::{TenantId, UserFilter, UserId};
use statusquo_core::status::StatusUpdate;
use statusquo_db::repositories::{
    FilterRepository, InstallationRepository, PendingQuoteRepository, QuoteRepository,
    RateLimitRepository, RepositoryError,
};
use statusquo_slack::api::{SlackApi, SlackApiError};
use statusquo_slack::blocks::MessageTemplate;

use crate::context::{BotContext, EngineSettings, Stores};

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

pub fn quote(id: &str, text: &str, author: &str) -> Quote {
    Quote {
        id: QuoteId(id.to_owned()),
        text: text.to_owned(),
        author: author.to_owned(),
        emoji: ":star:".to_owned(),
    }
}

pub fn installation(tenant: &str, user: &str, token: Option<&str>) -> Installation {
    Installation {
        tenant_id: TenantId(tenant.to_owned()),
        user_id: UserId(user.to_owned()),
        access_token: token.map(|token| SecretString::from(token.to_owned())),
        refresh_token: Some(SecretString::from(format!("refresh-{user}"))),
        token_expires_at: None,
        display_name: format!("{user}@{tenant}"),
    }
}

pub struct Harness {
    pub context: BotContext,
    pub clock: Arc<ManualClock>,
    pub slack: Arc<FakeSlack>,
}

pub fn harness() -> Harness {
    harness_with(Stores::in_memory(), EngineSettings::default())
}

pub fn harness_with(stores: Stores, settings: EngineSettings) -> Harness {
    let clock = Arc::new(ManualClock::new(start_time()));
    let slack = Arc::new(FakeSlack::default());
    let context = BotContext::new(stores, clock.clone(), slack.clone(), settings);
    Harness { context, clock, slack }
}

/// Records every call; failure modes are switched on per token.
#[derive(Default)]
pub struct FakeSlack {
    pub statuses: Mutex<Vec<(String, StatusUpdate)>>,
    pub posts: Mutex<Vec<(String, MessageTemplate)>>,
    pub refreshes: Mutex<Vec<String>>,
    pub reject_emoji: Mutex<HashSet<String>>,
    pub failing_tokens: Mutex<HashSet<String>>,
    pub failing_refresh: Mutex<HashSet<String>>,
    pub slow_tokens: Mutex<HashSet<String>>,
}

impl FakeSlack {
    pub fn reject_emoji(&self, emoji: &str) {
        self.reject_emoji.lock().expect("lock").insert(emoji.to_owned());
    }

    pub fn fail_token(&self, token: &str) {
        self.failing_tokens.lock().expect("lock").insert(token.to_owned());
    }

    pub fn fail_refresh(&self, refresh_token: &str) {
        self.failing_refresh.lock().expect("lock").insert(refresh_token.to_owned());
    }

    pub fn slow_token(&self, token: &str) {
        self.slow_tokens.lock().expect("lock").insert(token.to_owned());
    }

    pub fn statuses(&self) -> Vec<(String, StatusUpdate)> {
        self.statuses.lock().expect("lock").clone()
    }

    pub fn posts(&self) -> Vec<(String, MessageTemplate)> {
        self.posts.lock().expect("lock").clone()
    }
}

#[async_trait]
impl SlackApi for FakeSlack {
    async fn set_status(
        &self,
        access_token: &SecretString,
        status: &StatusUpdate,
    ) -> Result<(), SlackApiError> {
        let token = access_token.expose_secret().to_owned();
        let slow = self.slow_tokens.lock().expect("lock").contains(&token);
        if slow {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        }
        if self.failing_tokens.lock().expect("lock").contains(&token) {
            return Err(SlackApiError::Api { code: "invalid_auth".to_owned() });
        }
        if self.reject_emoji.lock().expect("lock").contains(&status.emoji) {
            return Err(SlackApiError::InvalidEmoji);
        }
        self.statuses.lock().expect("lock").push((token, status.clone()));
        Ok(())
    }

    async fn refresh_token(
        &self,
        refresh_token: &SecretString,
    ) -> Result<TokenGrant, SlackApiError> {
        let refresh_token = refresh_token.expose_secret().to_owned();
        self.refreshes.lock().expect("lock").push(refresh_token.clone());
        if self.failing_refresh.lock().expect("lock").contains(&refresh_token) {
            return Err(SlackApiError::Api { code: "invalid_refresh_token".to_owned() });
        }
        Ok(TokenGrant {
            access_token: SecretString::from(format!("{refresh_token}-access")),
            refresh_token: SecretString::from(format!("{refresh_token}-next")),
            expires_in_secs: 43_200,
        })
    }

    /// `code-<user>` installs that user into tenant `T-code`; anything else is
    /// rejected.
    async fn exchange_code(&self, code: &str) -> Result<UserAuthorization, SlackApiError> {
        let Some(user) = code.strip_prefix("code-") else {
            return Err(SlackApiError::Api { code: "invalid_code".to_owned() });
        };
        Ok(UserAuthorization {
            tenant_id: TenantId("T-code".to_owned()),
            user_id: UserId(user.to_owned()),
            team_name: "Acme".to_owned(),
            access_token: SecretString::from(format!("xoxp-{user}")),
            refresh_token: Some(SecretString::from(format!("refresh-{user}"))),
            expires_in_secs: Some(43_200),
        })
    }

    async fn post_message(
        &self,
        channel: &str,
        message: &MessageTemplate,
    ) -> Result<(), SlackApiError> {
        self.posts.lock().expect("lock").push((channel.to_owned(), message.clone()));
        Ok(())
    }
}

/// Every call fails, for exercising fail-open reads and propagated writes.
pub struct FailingStore;

fn offline() -> RepositoryError {
    RepositoryError::Decode("store offline".to_owned())
}

#[async_trait]
impl QuoteRepository for FailingStore {
    async fn insert(&self, _quote: Quote) -> Result<(), RepositoryError> {
        Err(offline())
    }
    async fn delete(&self, _id: &QuoteId) -> Result<bool, RepositoryError> {
        Err(offline())
    }
    async fn find_by_id(&self, _id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        Err(offline())
    }
    async fn find_by_text(&self, _text: &str) -> Result<Option<Quote>, RepositoryError> {
        Err(offline())
    }
    async fn find_by_author_containing(
        &self,
        _needle: &str,
    ) -> Result<Vec<Quote>, RepositoryError> {
        Err(offline())
    }
    async fn find_by_text_containing(&self, _needle: &str) -> Result<Vec<Quote>, RepositoryError> {
        Err(offline())
    }
    async fn list_all(&self) -> Result<Vec<Quote>, RepositoryError> {
        Err(offline())
    }
}

#[async_trait]
impl PendingQuoteRepository for FailingStore {
    async fn insert(&self, _pending: PendingQuote) -> Result<(), RepositoryError> {
        Err(offline())
    }
    async fn find_by_id(&self, _id: &QuoteId) -> Result<Option<PendingQuote>, RepositoryError> {
        Err(offline())
    }
    async fn claim(
        &self,
        _id: &QuoteId,
        _decision: ModerationStatus,
    ) -> Result<bool, RepositoryError> {
        Err(offline())
    }
    async fn delete(&self, _id: &QuoteId) -> Result<bool, RepositoryError> {
        Err(offline())
    }
    async fn list_pending(&self) -> Result<Vec<PendingQuote>, RepositoryError> {
        Err(offline())
    }
    async fn list_decided(&self) -> Result<Vec<PendingQuote>, RepositoryError> {
        Err(offline())
    }
    async fn count_by_proposer(&self, _proposer: &UserId) -> Result<u32, RepositoryError> {
        Err(offline())
    }
}

#[async_trait]
impl FilterRepository for FailingStore {
    async fn find(&self, _user_id: &UserId) -> Result<Option<UserFilter>, RepositoryError> {
        Err(offline())
    }
    async fn save(&self, _filter: UserFilter) -> Result<(), RepositoryError> {
        Err(offline())
    }
    async fn clear(&self, _user_id: &UserId) -> Result<bool, RepositoryError> {
        Err(offline())
    }
}

#[async_trait]
impl RateLimitRepository for FailingStore {
    async fn find(&self, _user_id: &UserId) -> Result<Option<RateLimitRecord>, RepositoryError> {
        Err(offline())
    }
    async fn record_update_attempt(
        &self,
        _user_id: &UserId,
        _now: DateTime<Utc>,
        _window: Duration,
    ) -> Result<(), RepositoryError> {
        Err(offline())
    }
    async fn increment_pending(
        &self,
        _user_id: &UserId,
        _now: DateTime<Utc>,
        _today: NaiveDate,
        _stale_after: Duration,
    ) -> Result<(), RepositoryError> {
        Err(offline())
    }
    async fn process_approval(
        &self,
        _user_id: &UserId,
        _today: NaiveDate,
    ) -> Result<(), RepositoryError> {
        Err(offline())
    }
    async fn process_denial(&self, _user_id: &UserId) -> Result<(), RepositoryError> {
        Err(offline())
    }
}

#[async_trait]
impl InstallationRepository for FailingStore {
    async fn save(&self, _installation: Installation) -> Result<(), RepositoryError> {
        Err(offline())
    }
    async fn find(
        &self,
        _tenant_id: &TenantId,
        _user_id: Option<&UserId>,
    ) -> Result<Option<Installation>, RepositoryError> {
        Err(offline())
    }
    async fn list_all(&self) -> Result<Vec<Installation>, RepositoryError> {
        Err(offline())
    }
}
