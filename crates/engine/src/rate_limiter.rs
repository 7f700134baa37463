use std::sync::Arc;

use tracing::warn;

use statusquo_core::clock::Clock;
use statusquo_core::domain::rate_limit::RateLimitRecord;
use statusquo_core::domain::user::UserId;
use statusquo_core::errors::ApplicationError;
use statusquo_core::limits::{check_submission, check_update, LimitDecision, LimitPolicy};
use statusquo_db::repositories::RateLimitRepository;

use crate::persistence;

/// Gate for manual status updates and quote submissions.
///
/// Checks only read; the `log_*`/`process_*` calls are the writes that move the
/// counters. A failed read allows the action.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitRepository>,
    clock: Arc<dyn Clock>,
    policy: LimitPolicy,
}

impl RateLimiter {
    pub fn new(
        store: Arc<dyn RateLimitRepository>,
        clock: Arc<dyn Clock>,
        policy: LimitPolicy,
    ) -> Self {
        Self { store, clock, policy }
    }

    pub fn policy(&self) -> &LimitPolicy {
        &self.policy
    }

    async fn load(&self, user_id: &UserId) -> Option<RateLimitRecord> {
        match self.store.find(user_id).await {
            Ok(record) => record,
            Err(error) => {
                warn!(
                    event_name = "limits.read_failed",
                    user_id = %user_id,
                    error = %error,
                    "rate limit lookup failed; allowing"
                );
                None
            }
        }
    }

    pub async fn check_update_limit(&self, user_id: &UserId) -> LimitDecision {
        let record = self.load(user_id).await;
        check_update(record.as_ref(), self.clock.now(), &self.policy)
    }

    pub async fn log_update_attempt(&self, user_id: &UserId) -> Result<(), ApplicationError> {
        self.store
            .record_update_attempt(user_id, self.clock.now(), self.policy.update_window)
            .await
            .map_err(persistence)
    }

    pub async fn check_add_limit(&self, user_id: &UserId) -> LimitDecision {
        let record = self.load(user_id).await;
        check_submission(record.as_ref(), self.clock.now(), self.clock.today(), &self.policy)
    }

    /// The submission check with `pending_rows` standing in for the stored pending
    /// counter.
    pub async fn check_add_limit_with_pending(
        &self,
        user_id: &UserId,
        pending_rows: u32,
    ) -> LimitDecision {
        let record = self.load(user_id).await.map(|mut record| {
            record.pending_count = pending_rows;
            record
        });
        check_submission(record.as_ref(), self.clock.now(), self.clock.today(), &self.policy)
    }

    pub async fn increment_pending(&self, user_id: &UserId) -> Result<(), ApplicationError> {
        self.store
            .increment_pending(
                user_id,
                self.clock.now(),
                self.clock.today(),
                self.policy.pending_stale_after,
            )
            .await
            .map_err(persistence)
    }

    pub async fn process_approval(&self, user_id: &UserId) -> Result<(), ApplicationError> {
        self.store.process_approval(user_id, self.clock.today()).await.map_err(persistence)
    }

    pub async fn process_denial(&self, user_id: &UserId) -> Result<(), ApplicationError> {
        self.store.process_denial(user_id).await.map_err(persistence)
    }
}
