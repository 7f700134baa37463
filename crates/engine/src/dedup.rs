use std::sync::Arc;

use tracing::warn;

use statusquo_core::domain::quote::Quote;
use statusquo_db::repositories::QuoteRepository;

/// Exact-text lookup against the live pool.
#[derive(Clone)]
pub struct Deduplicator {
    quotes: Arc<dyn QuoteRepository>,
}

impl Deduplicator {
    pub fn new(quotes: Arc<dyn QuoteRepository>) -> Self {
        Self { quotes }
    }

    /// Returns the live quote with exactly this text. A store failure reads as "not
    /// found" so a submission is never blocked by it.
    pub async fn check_exists(&self, text: &str) -> Option<Quote> {
        match self.quotes.find_by_text(text).await {
            Ok(found) => found,
            Err(error) => {
                warn!(
                    event_name = "dedup.lookup_failed",
                    error = %error,
                    "duplicate check failed; treating as new"
                );
                None
            }
        }
    }
}
