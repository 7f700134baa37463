//! Rendering of a quote into a Slack profile status.

use serde::{Deserialize, Serialize};

use crate::domain::quote::Quote;

/// Slack rejects profile statuses longer than this.
pub const STATUS_TEXT_LIMIT: usize = 100;
pub const DEFAULT_STATUS_EMOJI: &str = ":speech_balloon:";

const ELLIPSIS: &str = "...";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub text: String,
    pub emoji: String,
}

impl StatusUpdate {
    pub fn with_emoji(&self, emoji: impl Into<String>) -> Self {
        Self { text: self.text.clone(), emoji: emoji.into() }
    }
}

pub fn format_status(quote: &Quote, default_emoji: &str) -> StatusUpdate {
    StatusUpdate {
        text: truncate_status_text(&render_status_text(quote)),
        emoji: sanitize_emoji(&quote.emoji, default_emoji),
    }
}

/// The stored author is rendered as-is; only an empty one becomes `Anonymous`.
pub fn render_status_text(quote: &Quote) -> String {
    let author = if quote.author.is_empty() { "Anonymous" } else { quote.author.as_str() };
    format!("\"{}.\" --{author}", quote.text)
}

/// Cuts to 97 characters plus `...` when over the limit; shorter text is untouched,
/// so applying it twice is the same as applying it once.
pub fn truncate_status_text(text: &str) -> String {
    if text.chars().count() <= STATUS_TEXT_LIMIT {
        return text.to_string();
    }

    let mut truncated: String = text.chars().take(STATUS_TEXT_LIMIT - ELLIPSIS.len()).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}

pub fn is_colon_wrapped(emoji: &str) -> bool {
    emoji.chars().count() >= 2 && emoji.starts_with(':') && emoji.ends_with(':')
}

/// Pre-flight check only: anything wrapped in colons passes through, even if Slack
/// later rejects it.
pub fn sanitize_emoji(raw: &str, default_emoji: &str) -> String {
    let trimmed = raw.trim();
    if is_colon_wrapped(trimmed) {
        trimmed.to_string()
    } else {
        default_emoji.to_string()
    }
}
