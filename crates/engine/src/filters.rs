use std::sync::Arc;

use tracing::info;

use statusquo_core::domain::user::{UserFilter, UserId};
use statusquo_core::errors::ApplicationError;
use statusquo_db::repositories::{FilterRepository, QuoteRepository};

use crate::persistence;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FilterOutcome {
    Saved { author_filter: String, matching: usize },
    /// No live quote's author contains the text; nothing was stored.
    NoMatches,
}

#[derive(Clone)]
pub struct FilterService {
    filters: Arc<dyn FilterRepository>,
    quotes: Arc<dyn QuoteRepository>,
}

impl FilterService {
    pub fn new(filters: Arc<dyn FilterRepository>, quotes: Arc<dyn QuoteRepository>) -> Self {
        Self { filters, quotes }
    }

    pub async fn set_filter(
        &self,
        user_id: &UserId,
        author_filter: &str,
    ) -> Result<FilterOutcome, ApplicationError> {
        let author_filter = author_filter.trim();
        let matching =
            self.quotes.find_by_author_containing(author_filter).await.map_err(persistence)?;
        if matching.is_empty() {
            return Ok(FilterOutcome::NoMatches);
        }

        self.filters
            .save(UserFilter { user_id: user_id.clone(), author_filter: author_filter.to_owned() })
            .await
            .map_err(persistence)?;
        info!(
            event_name = "filters.saved",
            user_id = %user_id,
            author_filter,
            matching = matching.len(),
            "author filter saved"
        );
        Ok(FilterOutcome::Saved { author_filter: author_filter.to_owned(), matching: matching.len() })
    }

    pub async fn current_filter(&self, user_id: &UserId) -> Result<Option<String>, ApplicationError> {
        let filter = self.filters.find(user_id).await.map_err(persistence)?;
        Ok(filter.map(|filter| filter.author_filter))
    }

    /// Clearing an absent filter succeeds.
    pub async fn clear_filter(&self, user_id: &UserId) -> Result<(), ApplicationError> {
        let removed = self.filters.clear(user_id).await.map_err(persistence)?;
        info!(event_name = "filters.cleared", user_id = %user_id, removed, "author filter cleared");
        Ok(())
    }
}
