use std::sync::Arc;

use chrono::Duration;

use statusquo_core::clock::Clock;
use statusquo_core::config::AppConfig;
use statusquo_core::limits::LimitPolicy;
use statusquo_core::status::DEFAULT_STATUS_EMOJI;
use statusquo_db::repositories::{
    FilterRepository, InMemoryFilterRepository, InMemoryInstallationRepository,
    InMemoryPendingQuoteRepository, InMemoryQuoteRepository, InMemoryRateLimitRepository,
    InstallationRepository, PendingQuoteRepository, QuoteRepository, RateLimitRepository,
    SqlFilterRepository, SqlInstallationRepository, SqlPendingQuoteRepository,
    SqlQuoteRepository, SqlRateLimitRepository,
};
use statusquo_db::DbPool;
use statusquo_slack::api::SlackApi;

use crate::broadcast::{BroadcastScheduler, DailySchedule};
use crate::credentials::CredentialRefresher;
use crate::dedup::Deduplicator;
use crate::filters::FilterService;
use crate::install::{InstallFlow, InstallStates};
use crate::moderation::ModerationWorkflow;
use crate::rate_limiter::RateLimiter;
use crate::selector::QuoteSelector;
use crate::status::StatusUpdater;

/// One handle per store. Each store is keyed and owned independently.
#[derive(Clone)]
pub struct Stores {
    pub quotes: Arc<dyn QuoteRepository>,
    pub pending: Arc<dyn PendingQuoteRepository>,
    pub filters: Arc<dyn FilterRepository>,
    pub rate_limits: Arc<dyn RateLimitRepository>,
    pub installations: Arc<dyn InstallationRepository>,
}

impl Stores {
    pub fn sql(pool: DbPool) -> Self {
        Self {
            quotes: Arc::new(SqlQuoteRepository::new(pool.clone())),
            pending: Arc::new(SqlPendingQuoteRepository::new(pool.clone())),
            filters: Arc::new(SqlFilterRepository::new(pool.clone())),
            rate_limits: Arc::new(SqlRateLimitRepository::new(pool.clone())),
            installations: Arc::new(SqlInstallationRepository::new(pool)),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            quotes: Arc::new(InMemoryQuoteRepository::default()),
            pending: Arc::new(InMemoryPendingQuoteRepository::default()),
            filters: Arc::new(InMemoryFilterRepository::default()),
            rate_limits: Arc::new(InMemoryRateLimitRepository::default()),
            installations: Arc::new(InMemoryInstallationRepository::default()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineSettings {
    pub limits: LimitPolicy,
    pub default_emoji: String,
    pub refresh_margin: Duration,
    pub install_url: String,
    pub client_id: String,
    pub review_channel: Option<String>,
    pub schedule: DailySchedule,
    pub broadcast_concurrency: usize,
    pub broadcast_deadline: std::time::Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            limits: LimitPolicy::default(),
            default_emoji: DEFAULT_STATUS_EMOJI.to_owned(),
            refresh_margin: Duration::seconds(300),
            install_url: "/slack/install".to_owned(),
            client_id: String::new(),
            review_channel: None,
            schedule: DailySchedule { hour: 9, minute: 0 },
            broadcast_concurrency: 4,
            broadcast_deadline: std::time::Duration::from_secs(1800),
        }
    }
}

impl From<&AppConfig> for EngineSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            limits: LimitPolicy::from(&config.limits),
            default_emoji: config.broadcast.default_emoji.clone(),
            refresh_margin: Duration::seconds(
                i64::try_from(config.broadcast.refresh_margin_secs).unwrap_or(i64::MAX),
            ),
            install_url: config.slack.install_url.clone(),
            client_id: config.slack.client_id.clone(),
            review_channel: config.slack.review_channel.clone(),
            schedule: DailySchedule { hour: config.broadcast.hour, minute: config.broadcast.minute },
            broadcast_concurrency: config.broadcast.concurrency.max(1),
            broadcast_deadline: std::time::Duration::from_secs(config.broadcast.deadline_secs),
        }
    }
}

/// Everything a request or the scheduler needs, built once at startup and passed
/// down explicitly.
#[derive(Clone)]
pub struct BotContext {
    pub stores: Stores,
    pub clock: Arc<dyn Clock>,
    pub slack: Arc<dyn SlackApi>,
    pub settings: EngineSettings,
    install_states: Arc<InstallStates>,
}

impl BotContext {
    pub fn new(
        stores: Stores,
        clock: Arc<dyn Clock>,
        slack: Arc<dyn SlackApi>,
        settings: EngineSettings,
    ) -> Self {
        Self { stores, clock, slack, settings, install_states: Arc::default() }
    }

    pub fn rate_limiter(&self) -> RateLimiter {
        RateLimiter::new(
            self.stores.rate_limits.clone(),
            self.clock.clone(),
            self.settings.limits.clone(),
        )
    }

    pub fn deduplicator(&self) -> Deduplicator {
        Deduplicator::new(self.stores.quotes.clone())
    }

    pub fn selector(&self) -> QuoteSelector {
        QuoteSelector::new(self.stores.quotes.clone(), self.stores.filters.clone())
    }

    pub fn filters(&self) -> FilterService {
        FilterService::new(self.stores.filters.clone(), self.stores.quotes.clone())
    }

    pub fn moderation(&self) -> ModerationWorkflow {
        ModerationWorkflow::new(
            self.stores.pending.clone(),
            self.stores.quotes.clone(),
            self.rate_limiter(),
            self.deduplicator(),
            self.clock.clone(),
        )
    }

    pub fn credentials(&self) -> CredentialRefresher {
        CredentialRefresher::new(
            self.stores.installations.clone(),
            self.slack.clone(),
            self.clock.clone(),
            self.settings.refresh_margin,
        )
    }

    pub fn install_flow(&self) -> InstallFlow {
        InstallFlow::new(
            self.stores.installations.clone(),
            self.slack.clone(),
            self.clock.clone(),
            self.install_states.clone(),
            self.settings.client_id.clone(),
        )
    }

    pub fn status_updater(&self) -> StatusUpdater {
        StatusUpdater::new(self.selector(), self.slack.clone(), self.settings.default_emoji.clone())
    }

    pub fn broadcaster(&self) -> BroadcastScheduler {
        BroadcastScheduler::new(
            self.stores.installations.clone(),
            self.credentials(),
            self.status_updater(),
            self.settings.broadcast_concurrency,
            self.settings.broadcast_deadline,
        )
    }
}
