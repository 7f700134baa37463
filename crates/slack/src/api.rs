use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use statusquo_core::config::SlackConfig;
use statusquo_core::domain::installation::{TokenGrant, UserAuthorization};
use statusquo_core::domain::user::{TenantId, UserId};
use statusquo_core::status::StatusUpdate;

use crate::blocks::MessageTemplate;

pub const INVALID_EMOJI_ERROR: &str = "profile_status_set_failed_not_valid_emoji";
pub const AUTHORIZE_URL: &str = "https://slack.com/oauth/v2/authorize";
/// The only permission StatusQuo asks of a user.
pub const USER_SCOPE: &str = "users.profile:write";
const MAX_TOKEN_LIFETIME_SECS: i64 = 366 * 24 * 60 * 60;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SlackApiError {
    #[error("slack rejected the status emoji")]
    InvalidEmoji,
    #[error("slack api error `{code}`")]
    Api { code: String },
    #[error("slack transport error: {0}")]
    Transport(String),
    #[error("slack response decode error: {0}")]
    Decode(String),
}

impl SlackApiError {
    fn from_code(code: String) -> Self {
        if code == INVALID_EMOJI_ERROR {
            Self::InvalidEmoji
        } else {
            Self::Api { code }
        }
    }
}

/// Outbound calls to the chat platform.
#[async_trait]
pub trait SlackApi: Send + Sync {
    /// Sets the user's profile status with a user token. Never expires.
    async fn set_status(
        &self,
        access_token: &SecretString,
        status: &StatusUpdate,
    ) -> Result<(), SlackApiError>;

    async fn refresh_token(&self, refresh_token: &SecretString)
        -> Result<TokenGrant, SlackApiError>;

    /// Completes an install by trading the redirect's `code` for the user's token.
    async fn exchange_code(&self, code: &str) -> Result<UserAuthorization, SlackApiError>;

    /// Posts as the bot.
    async fn post_message(
        &self,
        channel: &str,
        message: &MessageTemplate,
    ) -> Result<(), SlackApiError>;
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OAuthAccessResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OAuthInstallResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    authed_user: Option<AuthedUser>,
    #[serde(default)]
    team: Option<InstalledTeam>,
}

#[derive(Debug, Deserialize)]
struct AuthedUser {
    id: String,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct InstalledTeam {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

/// Where a user is sent to grant `USER_SCOPE`. `state` comes back on the redirect.
pub fn authorize_url(client_id: &str, state: &str) -> Result<String, SlackApiError> {
    reqwest::Url::parse_with_params(
        AUTHORIZE_URL,
        &[("client_id", client_id), ("user_scope", USER_SCOPE), ("state", state)],
    )
    .map(String::from)
    .map_err(|error| SlackApiError::Decode(format!("authorize url: {error}")))
}

/// `expires_in` from a token response, bounded to a positive value under a year.
fn token_lifetime(expires_in: i64) -> Result<i64, SlackApiError> {
    if (1..=MAX_TOKEN_LIFETIME_SECS).contains(&expires_in) {
        Ok(expires_in)
    } else {
        Err(SlackApiError::Decode(format!("expires_in out of range: {expires_in}")))
    }
}

fn non_blank(token: Option<String>) -> Option<String> {
    token.filter(|token| !token.trim().is_empty())
}

fn authorization_from(response: OAuthInstallResponse) -> Result<UserAuthorization, SlackApiError> {
    if !response.ok {
        return Err(SlackApiError::from_code(
            response.error.unwrap_or_else(|| "unknown_error".to_owned()),
        ));
    }

    let user = response
        .authed_user
        .ok_or_else(|| SlackApiError::Decode("oauth response missing authed_user".into()))?;
    let team =
        response.team.ok_or_else(|| SlackApiError::Decode("oauth response missing team".into()))?;
    let access_token = non_blank(user.access_token)
        .ok_or_else(|| SlackApiError::Decode("oauth response missing user token".into()))?;
    let expires_in_secs = user.expires_in.map(token_lifetime).transpose()?;

    Ok(UserAuthorization {
        tenant_id: TenantId(team.id.clone()),
        user_id: UserId(user.id),
        team_name: team.name.filter(|name| !name.trim().is_empty()).unwrap_or(team.id),
        access_token: SecretString::from(access_token),
        refresh_token: non_blank(user.refresh_token).map(SecretString::from),
        expires_in_secs,
    })
}

#[derive(Clone)]
pub struct HttpSlackClient {
    http: reqwest::Client,
    base_url: String,
    bot_token: SecretString,
    client_id: String,
    client_secret: SecretString,
}

impl HttpSlackClient {
    pub fn from_config(config: &SlackConfig) -> Result<Self, SlackApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|error| SlackApiError::Transport(error.to_string()))?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_owned(),
            bot_token: config.bot_token.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    async fn send(
        &self,
        method: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, SlackApiError> {
        let response = request.send().await.map_err(|error| {
            error!(
                event_name = "slack.api.transport_failed",
                method,
                error = %error,
                "slack request failed"
            );
            SlackApiError::Transport(error.to_string())
        })?;

        if !response.status().is_success() {
            let status = response.status();
            warn!(
                event_name = "slack.api.http_status",
                method,
                status = %status,
                "slack returned non-success http status"
            );
            return Err(SlackApiError::Transport(format!("{method} returned HTTP {status}")));
        }

        Ok(response)
    }

    async fn expect_ok(
        &self,
        method: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<(), SlackApiError> {
        let envelope: ApiEnvelope = self
            .send(method, request)
            .await?
            .json()
            .await
            .map_err(|error| SlackApiError::Decode(error.to_string()))?;

        if envelope.ok {
            return Ok(());
        }
        let code = envelope.error.unwrap_or_else(|| "unknown_error".to_owned());
        warn!(event_name = "slack.api.rejected", method, code = %code, "slack api call rejected");
        Err(SlackApiError::from_code(code))
    }
}

#[async_trait]
impl SlackApi for HttpSlackClient {
    async fn set_status(
        &self,
        access_token: &SecretString,
        status: &StatusUpdate,
    ) -> Result<(), SlackApiError> {
        let body = json!({
            "profile": {
                "status_text": status.text,
                "status_emoji": status.emoji,
                "status_expiration": 0,
            }
        });
        let request = self
            .http
            .post(self.endpoint("users.profile.set"))
            .bearer_auth(access_token.expose_secret())
            .json(&body);

        self.expect_ok("users.profile.set", request).await
    }

    async fn refresh_token(
        &self,
        refresh_token: &SecretString,
    ) -> Result<TokenGrant, SlackApiError> {
        let request = self.http.post(self.endpoint("oauth.v2.access")).form(&[
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.expose_secret()),
        ]);

        let response: OAuthAccessResponse = self
            .send("oauth.v2.access", request)
            .await?
            .json()
            .await
            .map_err(|error| SlackApiError::Decode(error.to_string()))?;

        if !response.ok {
            return Err(SlackApiError::from_code(
                response.error.unwrap_or_else(|| "unknown_error".to_owned()),
            ));
        }

        let access_token = non_blank(response.access_token)
            .ok_or_else(|| SlackApiError::Decode("oauth response missing access_token".into()))?;
        let refresh_token = non_blank(response.refresh_token)
            .ok_or_else(|| SlackApiError::Decode("oauth response missing refresh_token".into()))?;
        let expires_in_secs = response
            .expires_in
            .ok_or_else(|| SlackApiError::Decode("oauth response missing expires_in".into()))
            .and_then(token_lifetime)?;

        Ok(TokenGrant {
            access_token: SecretString::from(access_token),
            refresh_token: SecretString::from(refresh_token),
            expires_in_secs,
        })
    }

    async fn exchange_code(&self, code: &str) -> Result<UserAuthorization, SlackApiError> {
        let request = self.http.post(self.endpoint("oauth.v2.access")).form(&[
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("code", code),
        ]);

        let response: OAuthInstallResponse = self
            .send("oauth.v2.access", request)
            .await?
            .json()
            .await
            .map_err(|error| SlackApiError::Decode(error.to_string()))?;

        authorization_from(response)
    }

    async fn post_message(
        &self,
        channel: &str,
        message: &MessageTemplate,
    ) -> Result<(), SlackApiError> {
        let body = json!({
            "channel": channel,
            "text": message.fallback_text,
            "blocks": message.blocks,
        });
        let request = self
            .http
            .post(self.endpoint("chat.postMessage"))
            .bearer_auth(self.bot_token.expose_secret())
            .json(&body);

        self.expect_ok("chat.postMessage", request).await
    }
}
