//! Allow/deny rules for manual status updates and quote submissions.
//!
//! These functions only read a [`RateLimitRecord`]; advancing the counters is the
//! job of the store (see `RateLimitRecord::record_*`).

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::config::LimitsConfig;
use crate::domain::rate_limit::RateLimitRecord;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LimitPolicy {
    pub max_updates: u32,
    pub update_window: Duration,
    pub max_pending: u32,
    pub max_daily: u32,
    pub pending_stale_after: Duration,
}

impl Default for LimitPolicy {
    fn default() -> Self {
        Self {
            max_updates: 3,
            update_window: Duration::minutes(10),
            max_pending: 3,
            max_daily: 10,
            pending_stale_after: Duration::hours(24),
        }
    }
}

impl From<&LimitsConfig> for LimitPolicy {
    fn from(config: &LimitsConfig) -> Self {
        Self {
            max_updates: config.max_updates,
            update_window: Duration::minutes(i64::from(config.window_minutes)),
            max_pending: config.max_pending,
            max_daily: config.max_daily,
            pending_stale_after: Duration::hours(i64::from(config.pending_stale_hours)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DenialReason {
    UpdateWindow { used: u32, max: u32, wait_minutes: i64 },
    PendingQuota { pending: u32 },
    DailyQuota { approved: u32 },
}

impl std::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UpdateWindow { used, max, wait_minutes } => write!(
                f,
                "*Limit reached:* you've used {used}/{max} updates. Resets in {wait_minutes} min."
            ),
            Self::PendingQuota { pending } => write!(
                f,
                "*Limit reached:* you have {pending} pending quotes. Please wait for approval or denial before adding more."
            ),
            Self::DailyQuota { approved } => write!(
                f,
                "*Daily quota:* you've added {approved} approved quotes today. Try again tomorrow!"
            ),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LimitDecision {
    Allowed,
    Denied(DenialReason),
}

impl LimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    pub fn message(&self) -> Option<String> {
        match self {
            Self::Allowed => None,
            Self::Denied(reason) => Some(reason.to_string()),
        }
    }
}

/// An expired or never-started window allows the attempt without resetting it.
pub fn check_update(
    record: Option<&RateLimitRecord>,
    now: DateTime<Utc>,
    policy: &LimitPolicy,
) -> LimitDecision {
    let Some(record) = record else {
        return LimitDecision::Allowed;
    };

    if record.window_expired(now, policy.update_window) {
        return LimitDecision::Allowed;
    }

    if record.window_count < policy.max_updates {
        return LimitDecision::Allowed;
    }

    let remaining = record
        .window_resets_at(policy.update_window)
        .map(|reset_at| reset_at - now)
        .unwrap_or_else(Duration::zero);
    LimitDecision::Denied(DenialReason::UpdateWindow {
        used: record.window_count,
        max: policy.max_updates,
        wait_minutes: ceil_minutes(remaining),
    })
}

pub fn check_submission(
    record: Option<&RateLimitRecord>,
    now: DateTime<Utc>,
    today: NaiveDate,
    policy: &LimitPolicy,
) -> LimitDecision {
    let Some(record) = record else {
        return LimitDecision::Allowed;
    };

    let pending = record.effective_pending(now, policy.pending_stale_after);
    if pending >= policy.max_pending {
        return LimitDecision::Denied(DenialReason::PendingQuota { pending });
    }

    let approved = record.effective_daily(today);
    if approved >= policy.max_daily {
        return LimitDecision::Denied(DenialReason::DailyQuota { approved });
    }

    LimitDecision::Allowed
}

fn ceil_minutes(remaining: Duration) -> i64 {
    let seconds = remaining.num_seconds().max(0);
    ((seconds + 59) / 60).max(1)
}
