use async_trait::async_trait;
use thiserror::Error;

use statusquo_core::domain::user::{TenantId, UserId};
use statusquo_core::errors::DomainError;
use statusquo_core::submission::Submission;

use crate::blocks::{self, MessageTemplate};

pub const SUPPORTED_COMMANDS: [&str; 6] =
    ["/quo-add", "/quo-search", "/quo-find", "/quo-update", "/quo-filter", "/quo-help"];

const MARKDOWN_MARKERS: [char; 4] = ['*', '_', '~', '`'];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlashCommandPayload {
    pub command: String,
    pub text: String,
    pub team_id: String,
    pub channel_id: String,
    pub user_id: String,
    pub request_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandEnvelope {
    pub command: String,
    pub args: String,
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub channel_id: String,
    pub request_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FilterCommand {
    Set { author: String },
    List,
    Flush,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatusCommand {
    Add { raw: String },
    Search { text: String },
    Find { query: String },
    Update,
    Filter(FilterCommand),
    Help,
    Usage { hint: &'static str },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("unsupported slash command: {0}")]
    UnsupportedCommand(String),
    #[error("missing {0} in slash command payload")]
    MissingField(&'static str),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandRouteError {
    #[error("command service failed: {0}")]
    Service(String),
}

pub fn normalize_command(
    payload: SlashCommandPayload,
) -> Result<CommandEnvelope, CommandParseError> {
    let command = payload.command.trim().to_ascii_lowercase();
    if !SUPPORTED_COMMANDS.contains(&command.as_str()) {
        return Err(CommandParseError::UnsupportedCommand(payload.command));
    }
    if payload.user_id.trim().is_empty() {
        return Err(CommandParseError::MissingField("user_id"));
    }
    if payload.team_id.trim().is_empty() {
        return Err(CommandParseError::MissingField("team_id"));
    }

    Ok(CommandEnvelope {
        command: command.trim_start_matches('/').to_owned(),
        args: payload.text.trim().to_owned(),
        tenant_id: TenantId(payload.team_id),
        user_id: UserId(payload.user_id),
        channel_id: payload.channel_id,
        request_id: payload.request_id,
    })
}

/// `command` is the name without the leading slash, e.g. `quo-add`.
pub fn parse_status_command(command: &str, args: &str) -> StatusCommand {
    let args = args.trim();
    match command {
        "quo-add" if args.is_empty() => {
            StatusCommand::Usage { hint: "Format: `/quo-add Quote | Author | :emoji:`" }
        }
        "quo-add" => StatusCommand::Add { raw: args.to_owned() },
        "quo-search" => match strip_quotes(args) {
            text if text.is_empty() => StatusCommand::Usage { hint: "Usage: `/quo-search \"Quote Text\"`" },
            text => StatusCommand::Search { text },
        },
        "quo-find" if args.is_empty() => StatusCommand::Usage { hint: "Usage: `/quo-find <text>`" },
        "quo-find" => StatusCommand::Find { query: args.to_owned() },
        "quo-update" => StatusCommand::Update,
        "quo-filter" => parse_filter_args(args),
        _ => StatusCommand::Help,
    }
}

fn parse_filter_args(args: &str) -> StatusCommand {
    if args.eq_ignore_ascii_case("flush") {
        return StatusCommand::Filter(FilterCommand::Flush);
    }
    if args.eq_ignore_ascii_case("list") {
        return StatusCommand::Filter(FilterCommand::List);
    }
    match strip_quotes(args) {
        author if author.is_empty() => StatusCommand::Usage {
            hint: "Usage: `/quo-filter <Author>`, `/quo-filter list`, or `/quo-filter flush`",
        },
        author => StatusCommand::Filter(FilterCommand::Set { author }),
    }
}

pub fn strip_quotes(input: &str) -> String {
    input.replace(['"', '\''], "").trim().to_owned()
}

/// Removes Slack inline markup so stored text renders the same everywhere.
pub fn clean_markdown(input: Option<&str>) -> String {
    input.map(|text| text.replace(MARKDOWN_MARKERS, "").trim().to_owned()).unwrap_or_default()
}

/// Parses `Quote | Author | :emoji:` into a validated submission.
pub fn parse_submission(raw: &str) -> Result<Submission, DomainError> {
    let parts: Vec<&str> = raw.split('|').collect();
    let [text, author, emoji] = parts.as_slice() else {
        return Err(DomainError::InvalidSubmissionFormat);
    };

    let text = clean_markdown(Some(text.trim().trim_matches('"')));
    Submission::new(text, author, emoji)
}

pub struct CommandRouter<S> {
    service: S,
}

impl<S> CommandRouter<S>
where
    S: StatusCommandService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub async fn route(
        &self,
        envelope: CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        match parse_status_command(&envelope.command, &envelope.args) {
            StatusCommand::Add { raw } => self.service.add_quote(raw, &envelope).await,
            StatusCommand::Search { text } => self.service.search_exact(text, &envelope).await,
            StatusCommand::Find { query } => self.service.search_contains(query, &envelope).await,
            StatusCommand::Update => self.service.update_status(&envelope).await,
            StatusCommand::Filter(FilterCommand::Set { author }) => {
                self.service.set_filter(author, &envelope).await
            }
            StatusCommand::Filter(FilterCommand::List) => self.service.show_filter(&envelope).await,
            StatusCommand::Filter(FilterCommand::Flush) => {
                self.service.clear_filter(&envelope).await
            }
            StatusCommand::Help => Ok(blocks::help_message()),
            StatusCommand::Usage { hint } => {
                Ok(blocks::notice_message("status.usage.v1", &format!(":warning: {hint}")))
            }
        }
    }
}

#[async_trait]
pub trait StatusCommandService: Send + Sync {
    async fn add_quote(
        &self,
        raw: String,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError>;

    async fn search_exact(
        &self,
        text: String,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError>;

    async fn search_contains(
        &self,
        query: String,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError>;

    async fn update_status(
        &self,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError>;

    async fn set_filter(
        &self,
        author: String,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError>;

    async fn show_filter(
        &self,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError>;

    async fn clear_filter(
        &self,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError>;
}
