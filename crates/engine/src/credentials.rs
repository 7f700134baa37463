use std::sync::Arc;

use chrono::Duration;
use thiserror::Error;
use tracing::{info, warn};

use statusquo_core::clock::Clock;
use statusquo_core::domain::installation::Installation;
use statusquo_db::repositories::{InstallationRepository, RepositoryError};
use statusquo_slack::api::{SlackApi, SlackApiError};

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("token is expiring but no refresh token is stored")]
    MissingRefreshToken,
    #[error("token exchange failed: {0}")]
    Exchange(#[from] SlackApiError),
    #[error("rotated token could not be saved: {0}")]
    Persist(#[from] RepositoryError),
}

#[derive(Clone, Debug)]
pub enum RefreshOutcome {
    Fresh(Installation),
    Refreshed(Installation),
}

impl RefreshOutcome {
    pub fn into_installation(self) -> Installation {
        match self {
            Self::Fresh(installation) | Self::Refreshed(installation) => installation,
        }
    }
}

/// Rotates an installation's tokens when they are inside the expiry margin.
#[derive(Clone)]
pub struct CredentialRefresher {
    installations: Arc<dyn InstallationRepository>,
    slack: Arc<dyn SlackApi>,
    clock: Arc<dyn Clock>,
    margin: Duration,
}

impl CredentialRefresher {
    pub fn new(
        installations: Arc<dyn InstallationRepository>,
        slack: Arc<dyn SlackApi>,
        clock: Arc<dyn Clock>,
        margin: Duration,
    ) -> Self {
        Self { installations, slack, clock, margin }
    }

    pub async fn ensure_fresh(
        &self,
        mut installation: Installation,
    ) -> Result<RefreshOutcome, RefreshError> {
        if !installation.needs_refresh(self.clock.now(), self.margin) {
            return Ok(RefreshOutcome::Fresh(installation));
        }

        let Some(refresh_token) = installation.refresh_token.clone() else {
            warn!(
                event_name = "credentials.refresh.missing_token",
                tenant_id = %installation.tenant_id,
                user_id = %installation.user_id,
                "token expiring without refresh token"
            );
            return Err(RefreshError::MissingRefreshToken);
        };

        let grant = self.slack.refresh_token(&refresh_token).await?;
        installation.apply_grant(grant, self.clock.now());
        self.installations.save(installation.clone()).await?;

        info!(
            event_name = "credentials.refresh.succeeded",
            tenant_id = %installation.tenant_id,
            user_id = %installation.user_id,
            expires_at = ?installation.token_expires_at,
            "access token rotated"
        );
        Ok(RefreshOutcome::Refreshed(installation))
    }
}
