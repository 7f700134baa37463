use std::fmt;

use thiserror::Error;

use crate::domain::quote::ModerationStatus;

/// Rule violations. These are shown to the user as written.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid moderation transition from {from:?} to {to:?}")]
    InvalidModerationTransition { from: ModerationStatus, to: ModerationStatus },
    #[error("invalid emoji `{0}`: must use colons, e.g. :wave:")]
    InvalidEmoji(String),
    #[error("submission must look like `Quote | Author | :emoji:`")]
    InvalidSubmissionFormat,
    #[error("{field} is required")]
    EmptyField { field: &'static str },
    #[error("{field} must be at most {max} characters")]
    FieldTooLong { field: &'static str, max: usize },
    #[error("search query must be at least {min} characters")]
    QueryTooShort { min: usize },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// The request broke a rule; retrying unchanged will fail again.
    Rejected,
    /// Storage or Slack did not answer.
    Unavailable,
    Internal,
}

impl FailureKind {
    pub fn http_status(self) -> u16 {
        match self {
            Self::Rejected => 409,
            Self::Unavailable => 503,
            Self::Internal => 500,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rejected => "rejected",
            Self::Unavailable => "unavailable",
            Self::Internal => "internal",
        })
    }
}

/// A failed request as the caller sees it, tagged with the id found in the logs.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{kind} ({correlation_id}): {detail}")]
pub struct InterfaceError {
    pub kind: FailureKind,
    pub detail: String,
    pub correlation_id: String,
}

impl InterfaceError {
    /// Rejections keep their explanation; anything else hides internals.
    pub fn user_message(&self) -> String {
        match self.kind {
            FailureKind::Rejected => self.detail.clone(),
            FailureKind::Unavailable => {
                "StatusQuo could not reach its storage or Slack. Try again in a minute.".to_owned()
            }
            FailureKind::Internal => "Something went wrong on our side.".to_owned(),
        }
    }
}

impl ApplicationError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Domain(_) => FailureKind::Rejected,
            Self::Persistence(_) | Self::Integration(_) => FailureKind::Unavailable,
            Self::Configuration(_) => FailureKind::Internal,
        }
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        InterfaceError {
            kind: self.kind(),
            detail: self.to_string(),
            correlation_id: correlation_id.into(),
        }
    }
}
