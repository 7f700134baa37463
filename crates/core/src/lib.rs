pub mod clock;
pub mod config;
pub mod domain;
pub mod errors;
pub mod limits;
pub mod status;
pub mod submission;

pub use clock::{Clock, ManualClock, SystemClock};
pub use domain::installation::{Installation, TokenGrant, UserAuthorization};
pub use domain::quote::{ModerationStatus, PendingQuote, Quote, QuoteId};
pub use domain::rate_limit::RateLimitRecord;
pub use domain::user::{TenantId, UserFilter, UserId};
pub use errors::{ApplicationError, DomainError, FailureKind, InterfaceError};
pub use limits::{DenialReason, LimitDecision, LimitPolicy};
pub use status::{format_status, StatusUpdate, DEFAULT_STATUS_EMOJI};
pub use submission::Submission;
