//! StatusQuo engine
//!
//! The services behind every user action and the daily broadcast. Each service
//! owns `Arc` handles to the stores it touches; [`BotContext`] builds them from one
//! set of stores, one clock and one Slack client.

pub mod broadcast;
pub mod commands;
pub mod context;
pub mod credentials;
pub mod dedup;
pub mod filters;
pub mod install;
pub mod moderation;
pub mod rate_limiter;
pub mod selector;
pub mod status;

#[cfg(test)]
pub(crate) mod testing;

pub use broadcast::{BroadcastScheduler, BroadcastSummary};
pub use commands::StatusQuoService;
pub use context::{BotContext, EngineSettings, Stores};

use statusquo_core::errors::ApplicationError;
use statusquo_db::RepositoryError;

pub(crate) fn persistence(error: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}
