use crate::errors::DomainError;
use crate::status::is_colon_wrapped;

pub const MAX_TEXT_CHARS: usize = 80;
pub const MAX_AUTHOR_CHARS: usize = 20;
pub const MIN_SEARCH_CHARS: usize = 3;

/// A validated quote proposal, not yet persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Submission {
    pub text: String,
    pub author: String,
    pub emoji: String,
}

impl Submission {
    pub fn new(
        text: impl AsRef<str>,
        author: impl AsRef<str>,
        emoji: impl AsRef<str>,
    ) -> Result<Self, DomainError> {
        let text = text.as_ref().trim();
        let author = author.as_ref().trim();
        let emoji = emoji.as_ref().trim();

        if !is_colon_wrapped(emoji) {
            return Err(DomainError::InvalidEmoji(emoji.to_string()));
        }
        if text.is_empty() {
            return Err(DomainError::EmptyField { field: "quote text" });
        }
        if text.chars().count() > MAX_TEXT_CHARS {
            return Err(DomainError::FieldTooLong { field: "quote text", max: MAX_TEXT_CHARS });
        }
        if author.is_empty() {
            return Err(DomainError::EmptyField { field: "author" });
        }
        if author.chars().count() > MAX_AUTHOR_CHARS {
            return Err(DomainError::FieldTooLong { field: "author", max: MAX_AUTHOR_CHARS });
        }

        Ok(Self { text: text.to_string(), author: author.to_string(), emoji: emoji.to_string() })
    }
}

pub fn validate_search_query(query: &str) -> Result<String, DomainError> {
    let trimmed = query.trim();
    if trimmed.chars().count() < MIN_SEARCH_CHARS {
        return Err(DomainError::QueryTooShort { min: MIN_SEARCH_CHARS });
    }
    Ok(trimmed.to_string())
}
