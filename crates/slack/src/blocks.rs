use serde::Serialize;

use statusquo_core::domain::quote::{PendingQuote, Quote};

pub const APPROVE_ACTION_ID: &str = "moderation.approve.v1";
pub const DENY_ACTION_ID: &str = "moderation.deny.v1";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
    Danger,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ButtonElement {
    #[serde(rename = "type")]
    pub element_type: &'static str,
    pub action_id: String,
    pub text: TextObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<ButtonStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ButtonElement {
    pub fn new(action_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            element_type: "button",
            action_id: action_id.into(),
            text: TextObject::plain(label),
            style: None,
            value: None,
            url: None,
        }
    }

    pub fn style(mut self, style: ButtonStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section { block_id: String, text: TextObject },
    Actions { block_id: String, elements: Vec<ButtonElement> },
    Context { block_id: String, elements: Vec<TextObject> },
}

/// Serializes straight into a Slack message body (`text` + `blocks`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    #[serde(rename = "text")]
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Section { block_id: block_id.into(), text: builder.build() });
        self
    }

    pub fn actions<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ActionsBuilder),
    {
        let mut builder = ActionsBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Actions { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> TextObject {
        self.text.unwrap_or_else(|| TextObject::plain(""))
    }
}

#[derive(Default)]
pub struct ActionsBuilder {
    elements: Vec<ButtonElement>,
}

impl ActionsBuilder {
    pub fn button(&mut self, button: ButtonElement) -> &mut Self {
        self.elements.push(button);
        self
    }

    fn build(self) -> Vec<ButtonElement> {
        self.elements
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

/// One markdown section; used for confirmations and limit explanations.
pub fn notice_message(block_id: &str, text: &str) -> MessageTemplate {
    MessageBuilder::new(text.to_owned())
        .section(block_id.to_owned(), |section| {
            section.mrkdwn(text.to_owned());
        })
        .build()
}

pub fn status_updated_message(status_text: &str, emoji: &str) -> MessageTemplate {
    MessageBuilder::new(format!("Status updated: {status_text}"))
        .section("status.updated.v1", |section| {
            section.mrkdwn(format!("{emoji} *Status updated:* {status_text}"));
        })
        .build()
}

pub fn authorize_message(install_url: &str) -> MessageTemplate {
    MessageBuilder::new("Authorize StatusQuo to update your status")
        .section("status.authorize.v1", |section| {
            section.mrkdwn(
                "I don't have permission to update your status yet. Authorize me first, then try again.",
            );
        })
        .actions("status.authorize.actions.v1", |actions| {
            actions.button(
                ButtonElement::new("status.authorize.v1", "Authorize")
                    .style(ButtonStyle::Primary)
                    .url(install_url),
            );
        })
        .build()
}

pub fn submission_received_message(text: &str, author: &str) -> MessageTemplate {
    MessageBuilder::new(format!("Submitted \"{text}\" by {author} for review"))
        .section("submission.received.v1", |section| {
            section.mrkdwn(format!(
                ":inbox_tray: *Submitted for review:*\n> {text}\n> -- {author}"
            ));
        })
        .context("submission.received.context.v1", |context| {
            context.plain("A moderator will approve or deny it shortly.");
        })
        .build()
}

pub fn duplicate_quote_message(existing_author: &str) -> MessageTemplate {
    notice_message(
        "submission.duplicate.v1",
        &format!(":no_entry: That quote already exists (by *{existing_author}*)."),
    )
}

pub fn pending_review_message(pending: &PendingQuote) -> MessageTemplate {
    let id = pending.id.0.as_str();
    MessageBuilder::new(format!("New quote awaiting review: \"{}\" by {}", pending.text, pending.author))
        .section("moderation.review.summary.v1", |section| {
            section.mrkdwn(format!(
                "*New quote proposed by <@{}>*\n> {} {}\n> -- {}",
                pending.proposer, pending.emoji, pending.text, pending.author
            ));
        })
        .actions("moderation.review.actions.v1", |actions| {
            actions
                .button(
                    ButtonElement::new(APPROVE_ACTION_ID, "Approve")
                        .style(ButtonStyle::Primary)
                        .value(id),
                )
                .button(
                    ButtonElement::new(DENY_ACTION_ID, "Deny").style(ButtonStyle::Danger).value(id),
                );
        })
        .build()
}

pub fn moderation_result_message(quote_id: &str, outcome: &str, moderator: &str) -> MessageTemplate {
    MessageBuilder::new(format!("Quote {quote_id} {outcome}"))
        .section("moderation.result.v1", |section| {
            section.mrkdwn(format!("Quote `{quote_id}` *{outcome}* by <@{moderator}>."));
        })
        .build()
}

pub fn exact_search_message(query: &str, found: Option<&Quote>) -> MessageTemplate {
    match found {
        Some(quote) => MessageBuilder::new(format!("Found \"{}\" by {}", quote.text, quote.author))
            .section("search.exact.found.v1", |section| {
                section.mrkdwn(format!(
                    ":mag: {} *\"{}\"* -- {}",
                    quote.emoji, quote.text, quote.author
                ));
            })
            .build(),
        None => notice_message(
            "search.exact.missing.v1",
            &format!(":mag: No quote matches \"{query}\" exactly."),
        ),
    }
}

/// `shown` is the already-truncated page; `total` the full match count.
pub fn search_results_message(query: &str, shown: &[Quote], total: usize) -> MessageTemplate {
    if shown.is_empty() {
        return notice_message(
            "search.contains.empty.v1",
            &format!(":mag: No quotes contain \"{query}\"."),
        );
    }

    let lines = shown
        .iter()
        .map(|quote| format!("• {} \"{}\" -- {}", quote.emoji, quote.text, quote.author))
        .collect::<Vec<_>>()
        .join("\n");
    let remaining = total.saturating_sub(shown.len());

    let builder = MessageBuilder::new(format!("{total} quotes match \"{query}\""))
        .section("search.contains.results.v1", |section| {
            section.mrkdwn(format!("*Quotes containing \"{query}\"*\n{lines}"));
        });
    if remaining == 0 {
        return builder.build();
    }
    builder
        .context("search.contains.more.v1", |context| {
            context.plain(format!("...and {remaining} more"));
        })
        .build()
}

pub fn error_message(summary: &str, correlation_id: &str) -> MessageTemplate {
    MessageBuilder::new(summary.to_owned())
        .section("status.error.summary.v1", |section| {
            section.mrkdwn(format!(":warning: {summary}"));
        })
        .context("status.error.context.v1", |context| {
            context.plain(format!("Correlation ID: {correlation_id}"));
        })
        .build()
}

pub fn help_message() -> MessageTemplate {
    MessageBuilder::new("StatusQuo command help")
        .section("status.help.summary.v1", |section| {
            section.mrkdwn(
                "*Available commands*\n• `/quo-add Quote | Author | :emoji:` propose a quote\n• `/quo-search \"exact text\"` look up one quote\n• `/quo-find <text>` quotes containing text\n• `/quo-filter <author>` only show quotes by that author\n• `/quo-filter list` show your filter\n• `/quo-filter flush` remove your filter\n• `/quo-update` refresh your status now\n• `/quo-help`",
            );
        })
        .build()
}
