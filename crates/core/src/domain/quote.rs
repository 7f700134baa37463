use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::user::UserId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteId(pub String);

impl QuoteId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for QuoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A live, approved quote in the shared pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub text: String,
    pub author: String,
    pub emoji: String,
}

impl Quote {
    /// Returned by selection when the pool is empty.
    pub fn placeholder() -> Self {
        Self {
            id: QuoteId("placeholder".to_string()),
            text: "No quotes available".to_string(),
            author: "System".to_string(),
            emoji: ":x:".to_string(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.id.0 == "placeholder"
    }

    pub fn author_contains(&self, needle: &str) -> bool {
        self.author.contains(needle)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModerationStatus {
    Pending,
    Approved,
    Denied,
}

impl ModerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Denied => "DENIED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(Self::Pending),
            "APPROVED" => Some(Self::Approved),
            "DENIED" => Some(Self::Denied),
            _ => None,
        }
    }
}

/// A submitted quote awaiting a moderator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingQuote {
    pub id: QuoteId,
    pub text: String,
    pub author: String,
    pub emoji: String,
    pub proposer: UserId,
    pub status: ModerationStatus,
    pub created_at: DateTime<Utc>,
}

impl PendingQuote {
    pub fn propose(
        text: impl Into<String>,
        author: impl Into<String>,
        emoji: impl Into<String>,
        proposer: UserId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: QuoteId::generate(),
            text: text.into(),
            author: author.into(),
            emoji: emoji.into(),
            proposer,
            status: ModerationStatus::Pending,
            created_at,
        }
    }

    pub fn can_transition_to(&self, next: ModerationStatus) -> bool {
        matches!(
            (self.status, next),
            (ModerationStatus::Pending, ModerationStatus::Approved)
                | (ModerationStatus::Pending, ModerationStatus::Denied)
        )
    }

    pub fn transition_to(&mut self, next: ModerationStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidModerationTransition { from: self.status, to: next })
    }

    /// The live copy keeps the pending id so a replayed approval overwrites itself.
    pub fn to_quote(&self) -> Quote {
        Quote {
            id: self.id.clone(),
            text: self.text.clone(),
            author: self.author.clone(),
            emoji: self.emoji.clone(),
        }
    }
}
