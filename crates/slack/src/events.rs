use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use statusquo_core::domain::quote::QuoteId;
use statusquo_core::domain::user::UserId;

use crate::{
    blocks::{self, MessageTemplate, APPROVE_ACTION_ID, DENY_ACTION_ID},
    commands::{
        normalize_command, CommandParseError, CommandRouteError, CommandRouter,
        SlashCommandPayload, StatusCommandService,
    },
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    SlashCommand(SlashCommandPayload),
    BlockAction(BlockActionEvent),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::SlashCommand(_) => SlackEventType::SlashCommand,
            Self::BlockAction(_) => SlackEventType::BlockAction,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    SlashCommand,
    BlockAction,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockActionEvent {
    pub team_id: Option<String>,
    pub channel_id: Option<String>,
    pub user_id: String,
    pub action_id: String,
    pub value: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(MessageTemplate),
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Parse(#[from] CommandParseError),
    #[error(transparent)]
    Route(#[from] CommandRouteError),
    #[error("review action failure: {0}")]
    Review(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InteractionParseError {
    #[error("interaction payload is not valid JSON: {0}")]
    Json(String),
    #[error("interaction payload has no user")]
    MissingUser,
}

#[derive(Debug, Deserialize)]
struct InteractionPayload {
    #[serde(rename = "type")]
    kind: String,
    user: Option<IdRef>,
    team: Option<IdRef>,
    channel: Option<IdRef>,
    #[serde(default)]
    actions: Vec<InteractionAction>,
}

#[derive(Debug, Deserialize)]
struct IdRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct InteractionAction {
    action_id: String,
    #[serde(default)]
    value: Option<String>,
}

/// Decodes the `payload` form field of an interactivity request. Anything other than
/// `block_actions` yields no events.
pub fn parse_interaction_payload(
    raw: &str,
) -> Result<Vec<BlockActionEvent>, InteractionParseError> {
    let payload: InteractionPayload =
        serde_json::from_str(raw).map_err(|error| InteractionParseError::Json(error.to_string()))?;
    if payload.kind != "block_actions" {
        return Ok(Vec::new());
    }

    let user_id = payload.user.map(|user| user.id).ok_or(InteractionParseError::MissingUser)?;
    let team_id = payload.team.map(|team| team.id);
    let channel_id = payload.channel.map(|channel| channel.id);

    Ok(payload
        .actions
        .into_iter()
        .map(|action| BlockActionEvent {
            team_id: team_id.clone(),
            channel_id: channel_id.clone(),
            user_id: user_id.clone(),
            action_id: action.action_id,
            value: action.value,
        })
        .collect())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReviewDecision {
    Approve,
    Deny,
}

impl ReviewDecision {
    pub fn from_action_id(action_id: &str) -> Option<Self> {
        match action_id {
            APPROVE_ACTION_ID => Some(Self::Approve),
            DENY_ACTION_ID => Some(Self::Deny),
            _ => None,
        }
    }
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

pub struct SlashCommandHandler<S> {
    router: CommandRouter<S>,
}

impl<S> SlashCommandHandler<S>
where
    S: StatusCommandService,
{
    pub fn new(service: S) -> Self {
        Self { router: CommandRouter::new(service) }
    }
}

#[async_trait]
impl<S> EventHandler for SlashCommandHandler<S>
where
    S: StatusCommandService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::SlashCommand
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::SlashCommand(payload) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let normalized = normalize_command(payload.clone())?;
        let message = self.router.route(normalized).await?;
        Ok(HandlerResult::Responded(message))
    }
}

/// Moderation entry points behind the review buttons.
#[async_trait]
pub trait ReviewActionService: Send + Sync {
    async fn review(
        &self,
        decision: ReviewDecision,
        quote_id: QuoteId,
        moderator: &UserId,
        ctx: &EventContext,
    ) -> Result<MessageTemplate, EventHandlerError>;
}

pub struct BlockActionHandler<S> {
    service: S,
}

impl<S> BlockActionHandler<S>
where
    S: ReviewActionService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for BlockActionHandler<S>
where
    S: ReviewActionService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::BlockAction
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::BlockAction(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        let Some(decision) = ReviewDecision::from_action_id(&event.action_id) else {
            return Ok(HandlerResult::Ignored);
        };
        let Some(quote_id) = event.value.as_deref().map(str::trim).filter(|v| !v.is_empty()) else {
            return Ok(HandlerResult::Responded(blocks::error_message(
                "That review button is missing its quote id.",
                &ctx.correlation_id,
            )));
        };

        let message = self
            .service
            .review(decision, QuoteId(quote_id.to_owned()), &UserId(event.user_id.clone()), ctx)
            .await?;
        Ok(HandlerResult::Responded(message))
    }
}
