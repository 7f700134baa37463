use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use statusquo_core::domain::quote::{PendingQuote, QuoteId};
use statusquo_core::errors::{ApplicationError, FailureKind};
use statusquo_engine::install::InstallError;
use statusquo_engine::moderation::{ApprovalOutcome, DenialOutcome};
use statusquo_engine::StatusQuoService;
use statusquo_slack::blocks::{self, MessageTemplate};
use statusquo_slack::commands::SlashCommandPayload;
use statusquo_slack::events::{
    parse_interaction_payload, EventContext, EventDispatcher, HandlerResult, SlackEnvelope,
    SlackEvent,
};
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    service: StatusQuoService,
    dispatcher: Arc<EventDispatcher>,
    admin_token: Option<SecretString>,
}

impl AppState {
    pub fn new(service: StatusQuoService, admin_token: Option<SecretString>) -> Self {
        let dispatcher = Arc::new(service.dispatcher());
        Self { service, dispatcher, admin_token }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/slack/commands", post(slash_command))
        .route("/slack/actions", post(block_action))
        .route("/slack/install", get(install))
        .route("/slack/oauth_redirect", get(oauth_redirect))
        .route("/admin/pending", get(list_pending))
        .route("/admin/approve/{id}", post(approve_pending))
        .route("/admin/deny/{id}", post(deny_pending))
        .with_state(state)
}

/// Form body Slack sends for a slash command. Fields we do not use are ignored.
#[derive(Debug, Deserialize)]
pub struct SlashCommandForm {
    pub command: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub team_id: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct InteractionForm {
    pub payload: String,
}

#[derive(Debug, Serialize)]
struct SlackReply {
    response_type: &'static str,
    #[serde(flatten)]
    message: MessageTemplate,
}

#[derive(Clone, Debug, Serialize)]
pub struct AdminError {
    pub error: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct ModerationResponse {
    pub id: String,
    pub status: &'static str,
}

type AdminResult<T> = Result<Json<T>, (StatusCode, Json<AdminError>)>;

fn ephemeral(message: MessageTemplate) -> Response {
    (StatusCode::OK, Json(SlackReply { response_type: "ephemeral", message })).into_response()
}

async fn slash_command(
    State(state): State<AppState>,
    Form(form): Form<SlashCommandForm>,
) -> Response {
    let correlation_id = Uuid::new_v4().to_string();
    info!(
        event_name = "http.slack.command",
        correlation_id = %correlation_id,
        command = %form.command,
        user_id = %form.user_id,
        tenant_id = %form.team_id,
        "slash command received"
    );

    let payload = SlashCommandPayload {
        command: form.command,
        text: form.text,
        team_id: form.team_id,
        channel_id: form.channel_id,
        user_id: form.user_id,
        request_id: correlation_id.clone(),
    };
    let envelope = SlackEnvelope {
        envelope_id: correlation_id.clone(),
        event: SlackEvent::SlashCommand(payload),
    };
    let ctx = EventContext { correlation_id: correlation_id.clone() };

    match state.dispatcher.dispatch(&envelope, &ctx).await {
        Ok(HandlerResult::Responded(message)) => ephemeral(message),
        Ok(HandlerResult::Processed | HandlerResult::Ignored) => StatusCode::OK.into_response(),
        Err(dispatch_error) => {
            warn!(
                event_name = "http.slack.command_rejected",
                correlation_id = %correlation_id,
                error = %dispatch_error,
                "slash command could not be handled"
            );
            ephemeral(blocks::error_message(&dispatch_error.to_string(), &correlation_id))
        }
    }
}

/// Review buttons. The outcome is posted back into the channel the button lives in.
async fn block_action(
    State(state): State<AppState>,
    Form(form): Form<InteractionForm>,
) -> StatusCode {
    let events = match parse_interaction_payload(&form.payload) {
        Ok(events) => events,
        Err(parse_error) => {
            warn!(
                event_name = "http.slack.action_rejected",
                error = %parse_error,
                "interaction payload could not be parsed"
            );
            return StatusCode::BAD_REQUEST;
        }
    };

    for event in events {
        let correlation_id = Uuid::new_v4().to_string();
        let channel = event.channel_id.clone();
        let envelope = SlackEnvelope {
            envelope_id: correlation_id.clone(),
            event: SlackEvent::BlockAction(event),
        };
        let ctx = EventContext { correlation_id: correlation_id.clone() };

        match state.dispatcher.dispatch(&envelope, &ctx).await {
            Ok(HandlerResult::Responded(message)) => {
                let Some(channel) = channel else { continue };
                let slack = &state.service.context().slack;
                if let Err(post_error) = slack.post_message(&channel, &message).await {
                    warn!(
                        event_name = "http.slack.action_reply_failed",
                        correlation_id = %correlation_id,
                        channel = %channel,
                        error = %post_error,
                        "could not post review outcome"
                    );
                }
            }
            Ok(HandlerResult::Processed | HandlerResult::Ignored) => {}
            Err(dispatch_error) => warn!(
                event_name = "http.slack.action_failed",
                correlation_id = %correlation_id,
                error = %dispatch_error,
                "block action could not be handled"
            ),
        }
    }

    StatusCode::OK
}

/// Query Slack appends when it sends the user back.
#[derive(Debug, Deserialize)]
pub struct OAuthRedirectQuery {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

async fn install(State(state): State<AppState>) -> Response {
    match state.service.context().install_flow().begin() {
        Ok(url) => Redirect::to(&url).into_response(),
        Err(install_error) => {
            error!(
                event_name = "http.install.begin_failed",
                error = %install_error,
                "could not build authorize url"
            );
            (StatusCode::INTERNAL_SERVER_ERROR, "StatusQuo could not start the install.")
                .into_response()
        }
    }
}

async fn oauth_redirect(
    State(state): State<AppState>,
    Query(query): Query<OAuthRedirectQuery>,
) -> (StatusCode, String) {
    if let Some(denied) = query.error {
        info!(event_name = "http.install.declined", reason = %denied, "user declined install");
        return (StatusCode::BAD_REQUEST, "The install was cancelled in Slack.".to_owned());
    }
    let (Some(code), Some(install_state)) = (query.code, query.state) else {
        return (StatusCode::BAD_REQUEST, "The install link is missing its code.".to_owned());
    };

    match state.service.context().install_flow().complete(&code, &install_state).await {
        Ok(installation) => (
            StatusCode::OK,
            format!(
                "StatusQuo is installed for {}. Your status will change with the next daily quote.",
                installation.display_name
            ),
        ),
        Err(InstallError::UnknownState) => (
            StatusCode::BAD_REQUEST,
            "This install link expired. Start again from /slack/install.".to_owned(),
        ),
        Err(install_error) => {
            error!(
                event_name = "http.install.failed",
                error = %install_error,
                "install could not be completed"
            );
            let status = match install_error {
                InstallError::Exchange(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::SERVICE_UNAVAILABLE,
            };
            (status, "StatusQuo could not finish the install. Try again in a minute.".to_owned())
        }
    }
}

fn admin_error(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<AdminError>) {
    (status, Json(AdminError { error: message.into() }))
}

fn require_admin(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<(), (StatusCode, Json<AdminError>)> {
    let Some(expected) = state.admin_token.as_ref() else {
        return Err(admin_error(StatusCode::FORBIDDEN, "admin API is disabled"));
    };

    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    match presented {
        Some(token) if token == expected.expose_secret() => Ok(()),
        _ => Err(admin_error(StatusCode::UNAUTHORIZED, "missing or invalid admin token")),
    }
}

fn application_error(failure: ApplicationError) -> (StatusCode, Json<AdminError>) {
    let interface = failure.into_interface(Uuid::new_v4().to_string());
    let status = StatusCode::from_u16(interface.kind.http_status())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if interface.kind != FailureKind::Rejected {
        error!(
            event_name = "http.admin.failed",
            correlation_id = %interface.correlation_id,
            error = %interface.detail,
            "admin request failed"
        );
    }
    admin_error(status, interface.user_message())
}

async fn list_pending(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AdminResult<Vec<PendingQuote>> {
    require_admin(&state, &headers)?;
    let pending =
        state.service.context().moderation().list_pending().await.map_err(application_error)?;
    Ok(Json(pending))
}

async fn approve_pending(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AdminResult<ModerationResponse> {
    require_admin(&state, &headers)?;
    let outcome = state
        .service
        .context()
        .moderation()
        .approve(&QuoteId(id.clone()))
        .await
        .map_err(application_error)?;

    match outcome {
        ApprovalOutcome::Approved(_) => {
            info!(event_name = "http.admin.approved", quote_id = %id, "quote approved");
            Ok(Json(ModerationResponse { id, status: "approved" }))
        }
        ApprovalOutcome::NotFound => {
            Err(admin_error(StatusCode::NOT_FOUND, format!("no pending quote `{id}`")))
        }
    }
}

async fn deny_pending(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AdminResult<ModerationResponse> {
    require_admin(&state, &headers)?;
    let outcome = state
        .service
        .context()
        .moderation()
        .deny(&QuoteId(id.clone()))
        .await
        .map_err(application_error)?;

    match outcome {
        DenialOutcome::Denied(_) => {
            info!(event_name = "http.admin.denied", quote_id = %id, "quote denied");
            Ok(Json(ModerationResponse { id, status: "denied" }))
        }
        DenialOutcome::NotFound => {
            Err(admin_error(StatusCode::NOT_FOUND, format!("no pending quote `{id}`")))
        }
    }
}
