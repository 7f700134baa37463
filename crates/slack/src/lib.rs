//! Slack integration for StatusQuo
//!
//! - **Web API** (`api`) - `users.profile.set`, token rotation, `chat.postMessage`
//! - **Slash Commands** (`commands`) - `/quo-add`, `/quo-search`, `/quo-filter`, ...
//! - **Events** (`events`) - review button interactions and the dispatcher
//! - **Block Kit** (`blocks`) - message builders and templates
//!
//! # Architecture
//!
//! ```text
//! HTTP form post → EventDispatcher → Handlers → statusquo-engine services
//!                        ↓
//!                  Block Kit reply ← MessageTemplate
//! ```

pub mod api;
pub mod blocks;
pub mod commands;
pub mod events;

pub use api::{HttpSlackClient, SlackApi, SlackApiError};
pub use blocks::MessageTemplate;
