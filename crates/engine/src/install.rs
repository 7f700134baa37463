use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use thiserror::Error;
use tracing::{info, warn};

use statusquo_core::clock::Clock;
use statusquo_core::domain::installation::Installation;
use statusquo_db::repositories::{InstallationRepository, RepositoryError};
use statusquo_slack::api::{authorize_url, SlackApi, SlackApiError};

/// How long an issued `state` stays redeemable.
pub const STATE_TTL_MINUTES: i64 = 10;

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("install link expired or was already used")]
    UnknownState,
    #[error("slack did not complete the install: {0}")]
    Exchange(#[from] SlackApiError),
    #[error("installation could not be saved: {0}")]
    Persist(#[from] RepositoryError),
}

/// Outstanding install `state` values, shared by every clone of the context.
#[derive(Debug, Default)]
pub struct InstallStates {
    issued: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl InstallStates {
    fn issue(&self, now: DateTime<Utc>) -> String {
        let state = format!("{:032x}", rand::thread_rng().gen::<u128>());
        let mut issued = self.issued.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        issued.retain(|_, expires_at| *expires_at > now);
        issued.insert(state.clone(), now + Duration::minutes(STATE_TTL_MINUTES));
        state
    }

    /// One use per state.
    fn redeem(&self, state: &str, now: DateTime<Utc>) -> bool {
        let mut issued = self.issued.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        issued.remove(state).is_some_and(|expires_at| expires_at > now)
    }
}

/// The two legs of the user OAuth install: send the user to Slack, then store
/// the token Slack hands back.
#[derive(Clone)]
pub struct InstallFlow {
    installations: Arc<dyn InstallationRepository>,
    slack: Arc<dyn SlackApi>,
    clock: Arc<dyn Clock>,
    states: Arc<InstallStates>,
    client_id: String,
}

impl InstallFlow {
    pub fn new(
        installations: Arc<dyn InstallationRepository>,
        slack: Arc<dyn SlackApi>,
        clock: Arc<dyn Clock>,
        states: Arc<InstallStates>,
        client_id: String,
    ) -> Self {
        Self { installations, slack, clock, states, client_id }
    }

    /// The authorize URL carrying a fresh `state`.
    pub fn begin(&self) -> Result<String, InstallError> {
        let state = self.states.issue(self.clock.now());
        Ok(authorize_url(&self.client_id, &state)?)
    }

    pub async fn complete(&self, code: &str, state: &str) -> Result<Installation, InstallError> {
        if !self.states.redeem(state, self.clock.now()) {
            warn!(event_name = "install.unknown_state", "install redirect with unknown state");
            return Err(InstallError::UnknownState);
        }

        let authorization = self.slack.exchange_code(code).await?;
        let installation = Installation::from_authorization(authorization, self.clock.now());
        self.installations.save(installation.clone()).await?;

        info!(
            event_name = "install.completed",
            tenant_id = %installation.tenant_id,
            user_id = %installation.user_id,
            expires_at = ?installation.token_expires_at,
            "user installed StatusQuo"
        );
        Ok(installation)
    }
}
