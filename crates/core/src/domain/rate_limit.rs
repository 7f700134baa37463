use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;

/// Per-user counters for manual updates and quote submissions.
///
/// The stored values may be stale: a window that has run out or a pending count
/// that nobody touched for a day is only corrected on the next write. Readers go
/// through the `effective_*` accessors.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRecord {
    pub user_id: UserId,
    pub window_start: Option<DateTime<Utc>>,
    pub window_count: u32,
    pub pending_count: u32,
    pub daily_approved_count: u32,
    pub last_activity_date: Option<NaiveDate>,
    pub last_submission_at: Option<DateTime<Utc>>,
}

impl RateLimitRecord {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            window_start: None,
            window_count: 0,
            pending_count: 0,
            daily_approved_count: 0,
            last_activity_date: None,
            last_submission_at: None,
        }
    }

    pub fn window_expired(&self, now: DateTime<Utc>, window: Duration) -> bool {
        match self.window_start {
            None => true,
            Some(start) => now - start > window,
        }
    }

    pub fn window_resets_at(&self, window: Duration) -> Option<DateTime<Utc>> {
        self.window_start.map(|start| start + window)
    }

    pub fn effective_pending(&self, now: DateTime<Utc>, stale_after: Duration) -> u32 {
        match self.last_submission_at {
            Some(submitted) if now - submitted <= stale_after => self.pending_count,
            _ => 0,
        }
    }

    pub fn effective_daily(&self, today: NaiveDate) -> u32 {
        if self.last_activity_date == Some(today) {
            self.daily_approved_count
        } else {
            0
        }
    }

    pub fn record_update_attempt(&mut self, now: DateTime<Utc>, window: Duration) {
        if self.window_expired(now, window) {
            self.window_start = Some(now);
            self.window_count = 1;
        } else {
            self.window_count = self.window_count.saturating_add(1);
        }
    }

    pub fn record_submission(
        &mut self,
        now: DateTime<Utc>,
        today: NaiveDate,
        stale_after: Duration,
    ) {
        self.pending_count = self.effective_pending(now, stale_after).saturating_add(1);
        self.daily_approved_count = self.effective_daily(today);
        self.last_activity_date = Some(today);
        self.last_submission_at = Some(now);
    }

    pub fn record_approval(&mut self, today: NaiveDate) {
        self.pending_count = self.pending_count.saturating_sub(1);
        self.daily_approved_count = self.effective_daily(today).saturating_add(1);
        self.last_activity_date = Some(today);
    }

    pub fn record_denial(&mut self) {
        self.pending_count = self.pending_count.saturating_sub(1);
    }
}
