use async_trait::async_trait;
use tracing::{error, info, warn};

use statusquo_core::domain::quote::{PendingQuote, QuoteId};
use statusquo_core::domain::user::UserId;
use statusquo_core::errors::{ApplicationError, FailureKind};
use statusquo_core::limits::LimitDecision;
use statusquo_core::submission::validate_search_query;
use statusquo_slack::blocks::{self, MessageTemplate};
use statusquo_slack::commands::{CommandEnvelope, CommandRouteError, StatusCommandService};
use statusquo_slack::events::{
    BlockActionHandler, EventContext, EventDispatcher, EventHandlerError, ReviewActionService,
    ReviewDecision, SlashCommandHandler,
};

use crate::context::BotContext;
use crate::credentials::RefreshError;
use crate::filters::FilterOutcome;
use crate::moderation::{ApprovalOutcome, DenialOutcome, SubmissionOutcome};
use crate::persistence;
use crate::status::UpdateError;

/// Matches shown for a contains-search before collapsing into "...and N more".
pub const SEARCH_PAGE_SIZE: usize = 3;

/// The engine behind every slash command and review button.
///
/// Failures are rendered as messages for the requesting user; nothing here returns a
/// raw error to Slack.
#[derive(Clone)]
pub struct StatusQuoService {
    context: BotContext,
}

impl StatusQuoService {
    pub fn new(context: BotContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &BotContext {
        &self.context
    }

    /// Dispatcher with the slash-command and review-button handlers registered.
    pub fn dispatcher(&self) -> EventDispatcher {
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(SlashCommandHandler::new(self.clone()));
        dispatcher.register(BlockActionHandler::new(self.clone()));
        dispatcher
    }

    fn failure(
        &self,
        operation: &'static str,
        failure: &ApplicationError,
        correlation_id: &str,
    ) -> MessageTemplate {
        let interface = failure.clone().into_interface(correlation_id);
        if interface.kind == FailureKind::Rejected {
            info!(
                event_name = "commands.rejected",
                operation,
                correlation_id,
                error = %failure,
                "request rejected"
            );
        } else {
            error!(
                event_name = "commands.failed",
                operation,
                correlation_id,
                error = %failure,
                "request failed"
            );
        }
        blocks::error_message(&interface.user_message(), &interface.correlation_id)
    }

    async fn post_for_review(&self, pending: &PendingQuote) {
        let Some(channel) = self.context.settings.review_channel.as_deref() else {
            return;
        };
        let message = blocks::pending_review_message(pending);
        if let Err(post_error) = self.context.slack.post_message(channel, &message).await {
            warn!(
                event_name = "commands.review_post_failed",
                quote_id = %pending.id,
                channel,
                error = %post_error,
                "could not post submission for review"
            );
        }
    }

    async fn force_update(
        &self,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, ApplicationError> {
        let ctx = &self.context;
        let limiter = ctx.rate_limiter();
        if let LimitDecision::Denied(reason) = limiter.check_update_limit(&envelope.user_id).await {
            let text = format!(":hourglass: {reason}");
            return Ok(blocks::notice_message("status.limited.v1", &text));
        }

        let installation = ctx
            .stores
            .installations
            .find(&envelope.tenant_id, Some(&envelope.user_id))
            .await
            .map_err(persistence)?;
        let Some(installation) = installation.filter(|record| record.has_usable_token()) else {
            return Ok(blocks::authorize_message(&ctx.settings.install_url));
        };

        limiter.log_update_attempt(&envelope.user_id).await?;

        let installation = match ctx.credentials().ensure_fresh(installation).await {
            Ok(outcome) => outcome.into_installation(),
            Err(RefreshError::Persist(store_error)) => return Err(persistence(store_error)),
            Err(refresh_error) => {
                warn!(
                    event_name = "commands.update.refresh_failed",
                    tenant_id = %envelope.tenant_id,
                    user_id = %envelope.user_id,
                    error = %refresh_error,
                    "token refresh failed; asking user to re-authorize"
                );
                return Ok(blocks::authorize_message(&ctx.settings.install_url));
            }
        };

        match ctx.status_updater().update_installation(&installation).await {
            Ok(applied) => Ok(blocks::status_updated_message(&applied.text, &applied.emoji)),
            Err(UpdateError::NoToken) => Ok(blocks::authorize_message(&ctx.settings.install_url)),
            Err(UpdateError::Push(push_error)) => {
                Err(ApplicationError::Integration(push_error.to_string()))
            }
        }
    }
}

#[async_trait]
impl StatusCommandService for StatusQuoService {
    async fn add_quote(
        &self,
        raw: String,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let outcome = self.context.moderation().submit(&envelope.user_id, &raw).await;
        Ok(match outcome {
            Ok(SubmissionOutcome::Accepted(pending)) => {
                self.post_for_review(&pending).await;
                blocks::submission_received_message(&pending.text, &pending.author)
            }
            Ok(SubmissionOutcome::RateLimited(reason)) => {
                blocks::notice_message("submission.limited.v1", &format!(":hourglass: {reason}"))
            }
            Ok(SubmissionOutcome::Duplicate { existing_author }) => {
                blocks::duplicate_quote_message(&existing_author)
            }
            Err(failure) => self.failure("add_quote", &failure, &envelope.request_id),
        })
    }

    async fn search_exact(
        &self,
        text: String,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        Ok(match self.context.stores.quotes.find_by_text(&text).await {
            Ok(found) => blocks::exact_search_message(&text, found.as_ref()),
            Err(store_error) => {
                self.failure("search_exact", &persistence(store_error), &envelope.request_id)
            }
        })
    }

    async fn search_contains(
        &self,
        query: String,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let query = match validate_search_query(&query) {
            Ok(query) => query,
            Err(invalid) => {
                let invalid = ApplicationError::from(invalid);
                return Ok(self.failure("search_contains", &invalid, &envelope.request_id));
            }
        };

        Ok(match self.context.stores.quotes.find_by_text_containing(&query).await {
            Ok(matches) => {
                let shown = &matches[..matches.len().min(SEARCH_PAGE_SIZE)];
                blocks::search_results_message(&query, shown, matches.len())
            }
            Err(store_error) => {
                self.failure("search_contains", &persistence(store_error), &envelope.request_id)
            }
        })
    }

    async fn update_status(
        &self,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        Ok(match self.force_update(envelope).await {
            Ok(message) => message,
            Err(failure) => self.failure("update_status", &failure, &envelope.request_id),
        })
    }

    async fn set_filter(
        &self,
        author: String,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        Ok(match self.context.filters().set_filter(&envelope.user_id, &author).await {
            Ok(FilterOutcome::Saved { author_filter, matching }) => blocks::notice_message(
                "filter.saved.v1",
                &format!(
                    ":white_check_mark: Filter set to *{author_filter}* ({matching} matching quotes)."
                ),
            ),
            Ok(FilterOutcome::NoMatches) => blocks::notice_message(
                "filter.no_matches.v1",
                &format!(":mag: No quotes found for author *{author}*. Filter not changed."),
            ),
            Err(failure) => self.failure("set_filter", &failure, &envelope.request_id),
        })
    }

    async fn show_filter(
        &self,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        Ok(match self.context.filters().current_filter(&envelope.user_id).await {
            Ok(Some(author_filter)) => blocks::notice_message(
                "filter.current.v1",
                &format!("Your current filter: *{author_filter}*"),
            ),
            Ok(None) => blocks::notice_message(
                "filter.current.v1",
                "You have no filter set. Quotes are picked from everyone.",
            ),
            Err(failure) => self.failure("show_filter", &failure, &envelope.request_id),
        })
    }

    async fn clear_filter(
        &self,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        Ok(match self.context.filters().clear_filter(&envelope.user_id).await {
            Ok(()) => blocks::notice_message("filter.cleared.v1", ":broom: Filter cleared."),
            Err(failure) => self.failure("clear_filter", &failure, &envelope.request_id),
        })
    }
}

#[async_trait]
impl ReviewActionService for StatusQuoService {
    async fn review(
        &self,
        decision: ReviewDecision,
        quote_id: QuoteId,
        moderator: &UserId,
        ctx: &EventContext,
    ) -> Result<MessageTemplate, EventHandlerError> {
        let moderation = self.context.moderation();
        let outcome = match decision {
            ReviewDecision::Approve => moderation.approve(&quote_id).await.map(|outcome| {
                matches!(outcome, ApprovalOutcome::Approved(_)).then_some("approved")
            }),
            ReviewDecision::Deny => moderation
                .deny(&quote_id)
                .await
                .map(|outcome| matches!(outcome, DenialOutcome::Denied(_)).then_some("denied")),
        };

        Ok(match outcome {
            Ok(Some(verb)) => {
                info!(
                    event_name = "commands.reviewed",
                    quote_id = %quote_id,
                    moderator = %moderator,
                    outcome = verb,
                    correlation_id = %ctx.correlation_id,
                    "review recorded"
                );
                blocks::moderation_result_message(&quote_id.0, verb, &moderator.0)
            }
            Ok(None) => blocks::notice_message(
                "moderation.result.missing.v1",
                &format!("Quote `{quote_id}` is no longer pending."),
            ),
            Err(failure) => self.failure("review", &failure, &ctx.correlation_id),
        })
    }
}
