use std::sync::Arc;

use chrono::{DateTime, Days, NaiveTime, TimeZone};
use futures::stream::{self, StreamExt};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{error, info, warn};

use statusquo_core::clock::Clock;
use statusquo_core::domain::installation::Installation;
use statusquo_core::errors::ApplicationError;
use statusquo_db::repositories::InstallationRepository;

use crate::credentials::CredentialRefresher;
use crate::persistence;
use crate::status::{StatusUpdater, UpdateError};

const FALLBACK_WAIT: std::time::Duration = std::time::Duration::from_secs(24 * 60 * 60);

/// Wall-clock time of the daily run in the scheduler's timezone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DailySchedule {
    pub hour: u32,
    pub minute: u32,
}

impl DailySchedule {
    /// First occurrence strictly after `now`. Days where the time falls into a DST
    /// gap are skipped; an ambiguous time fires at its earlier instant.
    pub fn next_fire_after<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let time = NaiveTime::from_hms_opt(self.hour, self.minute, 0)?;
        let today = now.date_naive();
        (0..=2).find_map(|offset| {
            let day = today.checked_add_days(Days::new(offset))?;
            now.timezone()
                .from_local_datetime(&day.and_time(time))
                .earliest()
                .filter(|candidate| candidate > now)
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastSummary {
    pub processed: usize,
    pub updated: usize,
    pub failed: usize,
    pub refresh_failed: usize,
    pub skipped_no_token: usize,
    pub timed_out: usize,
}

impl BroadcastSummary {
    fn record(mut self, outcome: InstallationOutcome) -> Self {
        self.processed += 1;
        match outcome {
            InstallationOutcome::Updated => self.updated += 1,
            InstallationOutcome::Failed => self.failed += 1,
            InstallationOutcome::RefreshFailed => self.refresh_failed += 1,
            InstallationOutcome::SkippedNoToken => self.skipped_no_token += 1,
            InstallationOutcome::TimedOut => self.timed_out += 1,
        }
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum InstallationOutcome {
    Updated,
    Failed,
    RefreshFailed,
    SkippedNoToken,
    TimedOut,
}

/// Pushes a fresh quote to every installation.
///
/// Installations run on a bounded pool. Each one is isolated: a failed refresh or
/// push is counted and logged, and the rest of the run continues. Work still in
/// flight at the soft deadline is abandoned and counted as timed out.
#[derive(Clone)]
pub struct BroadcastScheduler {
    installations: Arc<dyn InstallationRepository>,
    credentials: CredentialRefresher,
    status: StatusUpdater,
    concurrency: usize,
    deadline: std::time::Duration,
}

impl BroadcastScheduler {
    pub fn new(
        installations: Arc<dyn InstallationRepository>,
        credentials: CredentialRefresher,
        status: StatusUpdater,
        concurrency: usize,
        deadline: std::time::Duration,
    ) -> Self {
        Self { installations, credentials, status, concurrency: concurrency.max(1), deadline }
    }

    pub async fn run(&self) -> Result<BroadcastSummary, ApplicationError> {
        let installations = self.installations.list_all().await.map_err(persistence)?;
        let deadline = Instant::now() + self.deadline;
        info!(
            event_name = "broadcast.started",
            installations = installations.len(),
            concurrency = self.concurrency,
            "broadcast started"
        );

        let summary = stream::iter(installations)
            .map(|installation| self.process_before(installation, deadline))
            .buffer_unordered(self.concurrency)
            .fold(BroadcastSummary::default(), |summary, outcome| async move {
                summary.record(outcome)
            })
            .await;

        info!(
            event_name = "broadcast.finished",
            processed = summary.processed,
            updated = summary.updated,
            failed = summary.failed,
            refresh_failed = summary.refresh_failed,
            skipped_no_token = summary.skipped_no_token,
            timed_out = summary.timed_out,
            "broadcast finished"
        );
        Ok(summary)
    }

    async fn process_before(
        &self,
        installation: Installation,
        deadline: Instant,
    ) -> InstallationOutcome {
        let tenant_id = installation.tenant_id.clone();
        let user_id = installation.user_id.clone();
        if Instant::now() >= deadline {
            warn!(
                event_name = "broadcast.installation.timed_out",
                tenant_id = %tenant_id,
                user_id = %user_id,
                started = false,
                "deadline passed before installation started"
            );
            return InstallationOutcome::TimedOut;
        }

        match tokio::time::timeout_at(deadline, self.process(installation)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    event_name = "broadcast.installation.timed_out",
                    tenant_id = %tenant_id,
                    user_id = %user_id,
                    started = true,
                    "installation abandoned at deadline"
                );
                InstallationOutcome::TimedOut
            }
        }
    }

    async fn process(&self, installation: Installation) -> InstallationOutcome {
        let tenant_id = installation.tenant_id.clone();
        let user_id = installation.user_id.clone();

        let installation = match self.credentials.ensure_fresh(installation).await {
            Ok(outcome) => outcome.into_installation(),
            Err(error) => {
                warn!(
                    event_name = "broadcast.installation.refresh_failed",
                    tenant_id = %tenant_id,
                    user_id = %user_id,
                    error = %error,
                    "token refresh failed; skipping this cycle"
                );
                return InstallationOutcome::RefreshFailed;
            }
        };

        match self.status.update_installation(&installation).await {
            Ok(applied) => {
                info!(
                    event_name = "broadcast.installation.updated",
                    tenant_id = %tenant_id,
                    user_id = %user_id,
                    emoji = %applied.emoji,
                    "status pushed"
                );
                InstallationOutcome::Updated
            }
            Err(UpdateError::NoToken) => {
                info!(
                    event_name = "broadcast.installation.skipped",
                    tenant_id = %tenant_id,
                    user_id = %user_id,
                    "no usable access token"
                );
                InstallationOutcome::SkippedNoToken
            }
            Err(error) => {
                error!(
                    event_name = "broadcast.installation.failed",
                    tenant_id = %tenant_id,
                    user_id = %user_id,
                    error = %error,
                    "status push failed"
                );
                InstallationOutcome::Failed
            }
        }
    }

    /// Runs `run` at every scheduled time until `shutdown` flips to true or its
    /// sender is dropped. Time is read from `clock` and interpreted in `timezone`.
    pub async fn run_forever<Tz>(
        &self,
        schedule: DailySchedule,
        timezone: Tz,
        clock: Arc<dyn Clock>,
        mut shutdown: watch::Receiver<bool>,
    ) where
        Tz: TimeZone + Send + Sync,
        Tz::Offset: Send + Sync,
    {
        let mut last_fired: Option<DateTime<Tz>> = None;
        loop {
            let now = clock.now().with_timezone(&timezone);
            let base = match &last_fired {
                Some(last) if *last > now => last.clone(),
                _ => now.clone(),
            };
            let next = schedule.next_fire_after(&base);
            let wait = match &next {
                Some(next) => (next.clone() - now).to_std().unwrap_or_default(),
                None => {
                    error!(
                        event_name = "broadcast.schedule_invalid",
                        hour = schedule.hour,
                        minute = schedule.minute,
                        "could not compute the next run; retrying in a day"
                    );
                    FALLBACK_WAIT
                }
            };
            info!(
                event_name = "broadcast.scheduled",
                wait_secs = wait.as_secs(),
                "next broadcast scheduled"
            );

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    if let Some(next) = next {
                        last_fired = Some(next);
                        if let Err(error) = self.run().await {
                            error!(
                                event_name = "broadcast.failed",
                                error = %error,
                                "broadcast could not list installations"
                            );
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(event_name = "broadcast.stopped", "scheduler stopped");
                        return;
                    }
                }
            }
        }
    }
}
