use std::sync::Arc;

use rand::seq::SliceRandom;
use tracing::{error, warn};

use statusquo_core::domain::quote::Quote;
use statusquo_core::domain::user::UserId;
use statusquo_db::repositories::{FilterRepository, QuoteRepository};

/// Picks the quote for a user: filtered match, then the whole pool, then the
/// placeholder.
#[derive(Clone)]
pub struct QuoteSelector {
    quotes: Arc<dyn QuoteRepository>,
    filters: Arc<dyn FilterRepository>,
}

impl QuoteSelector {
    pub fn new(quotes: Arc<dyn QuoteRepository>, filters: Arc<dyn FilterRepository>) -> Self {
        Self { quotes, filters }
    }

    /// Never fails: an unreadable pool selects the placeholder.
    pub async fn select_quote(&self, user_id: &UserId) -> Quote {
        if let Some(author_filter) = self.author_filter(user_id).await {
            match self.quotes.find_by_author_containing(&author_filter).await {
                Ok(matches) => {
                    if let Some(quote) = pick(&matches) {
                        return quote;
                    }
                }
                Err(error) => warn!(
                    event_name = "selector.filtered_lookup_failed",
                    user_id = %user_id,
                    error = %error,
                    "filtered lookup failed; falling back to the full pool"
                ),
            }
        }

        match self.quotes.list_all().await {
            Ok(all) => pick(&all).unwrap_or_else(Quote::placeholder),
            Err(error) => {
                error!(
                    event_name = "selector.pool_read_failed",
                    user_id = %user_id,
                    error = %error,
                    "quote pool unreadable; using placeholder"
                );
                Quote::placeholder()
            }
        }
    }

    async fn author_filter(&self, user_id: &UserId) -> Option<String> {
        match self.filters.find(user_id).await {
            Ok(filter) => filter.map(|filter| filter.author_filter),
            Err(error) => {
                warn!(
                    event_name = "selector.filter_read_failed",
                    user_id = %user_id,
                    error = %error,
                    "filter lookup failed; selecting without filter"
                );
                None
            }
        }
    }
}

fn pick(quotes: &[Quote]) -> Option<Quote> {
    quotes.choose(&mut rand::thread_rng()).cloned()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use statusquo_core::domain::user::{UserFilter, UserId};
    use statusquo_db::repositories::{
        FilterRepository, InMemoryFilterRepository, InMemoryQuoteRepository, QuoteRepository,
    };

    use super::QuoteSelector;
    use crate::testing::{quote, FailingStore};

    async fn seeded() -> (QuoteSelector, Arc<InMemoryFilterRepository>) {
        let quotes = Arc::new(InMemoryQuoteRepository::default());
        for (id, text, author) in [
            ("q-1", "Do or do not", "Yoda"),
            ("q-2", "Size matters not", "Master Yoda"),
            ("q-3", "Hello there", "Obi-Wan"),
        ] {
            quotes.insert(quote(id, text, author)).await.expect("insert");
        }
        let filters = Arc::new(InMemoryFilterRepository::default());
        (QuoteSelector::new(quotes, filters.clone()), filters)
    }

    fn user() -> UserId {
        UserId("U1".to_owned())
    }

    #[tokio::test]
    async fn empty_pool_returns_placeholder() {
        let selector = QuoteSelector::new(
            Arc::new(InMemoryQuoteRepository::default()),
            Arc::new(InMemoryFilterRepository::default()),
        );
        let selected = selector.select_quote(&user()).await;
        assert!(selected.is_placeholder());
        assert_eq!(selected.text, "No quotes available");
    }

    #[tokio::test]
    async fn filtered_selection_only_returns_matching_authors() {
        let (selector, filters) = seeded().await;
        filters
            .save(UserFilter { user_id: user(), author_filter: "Yoda".to_owned() })
            .await
            .expect("save");

        for _ in 0..50 {
            let selected = selector.select_quote(&user()).await;
            assert!(selected.author.contains("Yoda"), "{}", selected.author);
        }
    }

    #[tokio::test]
    async fn unmatched_filter_falls_back_to_whole_pool() {
        let (selector, filters) = seeded().await;
        filters
            .save(UserFilter { user_id: user(), author_filter: "yoda".to_owned() })
            .await
            .expect("save");

        let mut seen = HashSet::new();
        for _ in 0..200 {
            let selected = selector.select_quote(&user()).await;
            assert!(!selected.is_placeholder());
            seen.insert(selected.id.0);
        }
        assert_eq!(seen.len(), 3);
    }

    #[tokio::test]
    async fn unreadable_filter_store_still_selects() {
        let quotes = Arc::new(InMemoryQuoteRepository::default());
        quotes.insert(quote("q-1", "Hi", "Bob")).await.expect("insert");
        let selector = QuoteSelector::new(quotes, Arc::new(FailingStore));

        let selected = selector.select_quote(&user()).await;
        assert_eq!(selected.text, "Hi");
    }

    #[tokio::test]
    async fn unreadable_pool_selects_placeholder() {
        let selector =
            QuoteSelector::new(Arc::new(FailingStore), Arc::new(InMemoryFilterRepository::default()));
        let selected = selector.select_quote(&user()).await;
        assert!(selected.is_placeholder());
        assert_eq!((selected.author.as_str(), selected.emoji.as_str()), ("System", ":x:"));
    }
}
