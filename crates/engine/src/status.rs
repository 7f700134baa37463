use std::sync::Arc;

use secrecy::SecretString;
use thiserror::Error;
use tracing::{info, warn};

use statusquo_core::domain::installation::Installation;
use statusquo_core::status::{format_status, StatusUpdate};
use statusquo_slack::api::{SlackApi, SlackApiError};

use crate::selector::QuoteSelector;

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("installation has no usable access token")]
    NoToken,
    #[error("status push failed: {0}")]
    Push(#[from] SlackApiError),
}

/// Select, format and push one user's status.
#[derive(Clone)]
pub struct StatusUpdater {
    selector: QuoteSelector,
    slack: Arc<dyn SlackApi>,
    default_emoji: String,
}

impl StatusUpdater {
    pub fn new(selector: QuoteSelector, slack: Arc<dyn SlackApi>, default_emoji: String) -> Self {
        Self { selector, slack, default_emoji }
    }

    /// Returns the status that was actually applied. An emoji rejection is retried
    /// once with the default emoji and unchanged text.
    pub async fn push_status(
        &self,
        access_token: &SecretString,
        status: &StatusUpdate,
    ) -> Result<StatusUpdate, SlackApiError> {
        match self.slack.set_status(access_token, status).await {
            Ok(()) => Ok(status.clone()),
            Err(SlackApiError::InvalidEmoji) => {
                warn!(
                    event_name = "status.emoji_rejected",
                    emoji = %status.emoji,
                    fallback = %self.default_emoji,
                    "emoji rejected; retrying with default"
                );
                let fallback = status.with_emoji(self.default_emoji.clone());
                self.slack.set_status(access_token, &fallback).await?;
                Ok(fallback)
            }
            Err(error) => Err(error),
        }
    }

    pub async fn update_installation(
        &self,
        installation: &Installation,
    ) -> Result<StatusUpdate, UpdateError> {
        if !installation.has_usable_token() {
            return Err(UpdateError::NoToken);
        }
        let Some(access_token) = installation.access_token.as_ref() else {
            return Err(UpdateError::NoToken);
        };

        let quote = self.selector.select_quote(&installation.user_id).await;
        let status = format_status(&quote, &self.default_emoji);
        let applied = self.push_status(access_token, &status).await?;

        info!(
            event_name = "status.updated",
            tenant_id = %installation.tenant_id,
            user_id = %installation.user_id,
            quote_id = %quote.id,
            "status updated"
        );
        Ok(applied)
    }
}
