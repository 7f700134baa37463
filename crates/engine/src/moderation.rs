use std::sync::Arc;

use tracing::{error, info, warn};

use statusquo_core::clock::Clock;
use statusquo_core::domain::quote::{ModerationStatus, PendingQuote, Quote, QuoteId};
use statusquo_core::domain::user::UserId;
use statusquo_core::errors::ApplicationError;
use statusquo_core::limits::{DenialReason, LimitDecision};
use statusquo_db::repositories::{PendingQuoteRepository, QuoteRepository};
use statusquo_slack::commands::parse_submission;

use crate::dedup::Deduplicator;
use crate::persistence;
use crate::rate_limiter::RateLimiter;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Accepted(PendingQuote),
    RateLimited(DenialReason),
    Duplicate { existing_author: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApprovalOutcome {
    Approved(Quote),
    NotFound,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DenialOutcome {
    Denied(PendingQuote),
    NotFound,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub scanned: usize,
    pub resolved: usize,
}

/// PENDING → APPROVED | DENIED.
///
/// A decision first claims the pending row, so only one moderator can win it.
/// Approval then writes the live copy under the pending id and deletes the row.
/// Whoever deletes the row books the counters; `reconcile` finishes claimed rows
/// that an interruption left behind.
#[derive(Clone)]
pub struct ModerationWorkflow {
    pending: Arc<dyn PendingQuoteRepository>,
    quotes: Arc<dyn QuoteRepository>,
    limiter: RateLimiter,
    dedup: Deduplicator,
    clock: Arc<dyn Clock>,
}

impl ModerationWorkflow {
    pub fn new(
        pending: Arc<dyn PendingQuoteRepository>,
        quotes: Arc<dyn QuoteRepository>,
        limiter: RateLimiter,
        dedup: Deduplicator,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { pending, quotes, limiter, dedup, clock }
    }

    /// `raw` is the `Quote | Author | :emoji:` text. The quota gate runs before any
    /// parsing; validation failures come back as `ApplicationError::Domain`.
    pub async fn submit(
        &self,
        proposer: &UserId,
        raw: &str,
    ) -> Result<SubmissionOutcome, ApplicationError> {
        if let LimitDecision::Denied(reason) = self.submission_gate(proposer).await {
            info!(
                event_name = "moderation.submit.rate_limited",
                user_id = %proposer,
                reason = %reason,
                "submission blocked by quota"
            );
            return Ok(SubmissionOutcome::RateLimited(reason));
        }

        let submission = parse_submission(raw)?;
        if let Some(existing) = self.dedup.check_exists(&submission.text).await {
            return Ok(SubmissionOutcome::Duplicate { existing_author: existing.author });
        }

        let pending = PendingQuote::propose(
            submission.text,
            submission.author,
            submission.emoji,
            proposer.clone(),
            self.clock.now(),
        );
        self.pending.insert(pending.clone()).await.map_err(persistence)?;
        let counted = self.limiter.increment_pending(proposer).await;
        self.record_counter("increment_pending", proposer, counted);

        info!(
            event_name = "moderation.submitted",
            user_id = %proposer,
            quote_id = %pending.id,
            "quote submitted for review"
        );
        Ok(SubmissionOutcome::Accepted(pending))
    }

    /// A pending-quota denial is checked against the rows actually waiting for
    /// review before it is returned; the counter can drift above them.
    async fn submission_gate(&self, proposer: &UserId) -> LimitDecision {
        let decision = self.limiter.check_add_limit(proposer).await;
        let LimitDecision::Denied(DenialReason::PendingQuota { pending: counted }) = &decision
        else {
            return decision;
        };
        let counted = *counted;

        match self.pending.count_by_proposer(proposer).await {
            Ok(rows) if rows < counted => {
                warn!(
                    event_name = "moderation.pending_counter_drift",
                    user_id = %proposer,
                    counted,
                    rows,
                    "pending counter ahead of pending rows; using row count"
                );
                self.limiter.check_add_limit_with_pending(proposer, rows).await
            }
            Ok(_) => decision,
            Err(error) => {
                warn!(
                    event_name = "moderation.pending_count_failed",
                    user_id = %proposer,
                    error = %error,
                    "pending row count failed; keeping counter decision"
                );
                decision
            }
        }
    }

    pub async fn approve(&self, id: &QuoteId) -> Result<ApprovalOutcome, ApplicationError> {
        let Some(mut pending) = self.claim(id, ModerationStatus::Approved).await? else {
            return Ok(ApprovalOutcome::NotFound);
        };
        pending.transition_to(ModerationStatus::Approved)?;

        let live = pending.to_quote();
        self.quotes.insert(live.clone()).await.map_err(persistence)?;
        self.finish(&pending).await?;

        info!(
            event_name = "moderation.approved",
            quote_id = %id,
            user_id = %pending.proposer,
            "quote approved"
        );
        Ok(ApprovalOutcome::Approved(live))
    }

    pub async fn deny(&self, id: &QuoteId) -> Result<DenialOutcome, ApplicationError> {
        let Some(mut pending) = self.claim(id, ModerationStatus::Denied).await? else {
            return Ok(DenialOutcome::NotFound);
        };
        pending.transition_to(ModerationStatus::Denied)?;
        self.finish(&pending).await?;

        info!(
            event_name = "moderation.denied",
            quote_id = %id,
            user_id = %pending.proposer,
            "quote denied"
        );
        Ok(DenialOutcome::Denied(pending))
    }

    /// The row as it was before the claim, or `None` when it is gone or another
    /// decision got there first.
    async fn claim(
        &self,
        id: &QuoteId,
        decision: ModerationStatus,
    ) -> Result<Option<PendingQuote>, ApplicationError> {
        let found = self.pending.find_by_id(id).await.map_err(persistence)?;
        let claimed = match &found {
            Some(row) if row.can_transition_to(decision) => {
                self.pending.claim(id, decision).await.map_err(persistence)?
            }
            _ => false,
        };
        if !claimed {
            info!(
                event_name = "moderation.already_decided",
                quote_id = %id,
                decision = decision.as_str(),
                "nothing left to decide"
            );
            return Ok(None);
        }
        Ok(found)
    }

    /// Deletes the claimed row and books the decision if this call removed it.
    async fn finish(&self, decided: &PendingQuote) -> Result<bool, ApplicationError> {
        if !self.pending.delete(&decided.id).await.map_err(persistence)? {
            return Ok(false);
        }
        let (operation, result) = match decided.status {
            ModerationStatus::Approved => {
                ("process_approval", self.limiter.process_approval(&decided.proposer).await)
            }
            _ => ("process_denial", self.limiter.process_denial(&decided.proposer).await),
        };
        self.record_counter(operation, &decided.proposer, result);
        Ok(true)
    }

    pub async fn list_pending(&self) -> Result<Vec<PendingQuote>, ApplicationError> {
        self.pending.list_pending().await.map_err(persistence)
    }

    /// Finishes decisions that were claimed but never completed. Approved rows get
    /// their live copy (an upsert, so a copy already written is harmless).
    pub async fn reconcile(&self) -> Result<ReconcileReport, ApplicationError> {
        let decided = self.pending.list_decided().await.map_err(persistence)?;
        let mut report = ReconcileReport { scanned: decided.len(), resolved: 0 };

        for row in decided {
            if row.status == ModerationStatus::Approved {
                self.quotes.insert(row.to_quote()).await.map_err(persistence)?;
            }
            if self.finish(&row).await? {
                report.resolved += 1;
                info!(
                    event_name = "moderation.reconciled",
                    quote_id = %row.id,
                    user_id = %row.proposer,
                    decision = row.status.as_str(),
                    "finished interrupted decision"
                );
            }
        }

        Ok(report)
    }

    /// Counter writes trail the row writes; a failure here is logged, not returned.
    fn record_counter(
        &self,
        operation: &'static str,
        user_id: &UserId,
        result: Result<(), ApplicationError>,
    ) {
        if let Err(failure) = result {
            error!(
                event_name = "moderation.counter_update_failed",
                operation,
                user_id = %user_id,
                error = %failure,
                "rate limit counter not updated"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Barrier;

    use statusquo_core::clock::Clock;
    use statusquo_core::domain::quote::{ModerationStatus, PendingQuote, QuoteId};
    use statusquo_core::domain::user::UserId;
    use statusquo_core::errors::{ApplicationError, DomainError};
    use statusquo_core::limits::DenialReason;
    use statusquo_db::repositories::{
        InMemoryPendingQuoteRepository, PendingQuoteRepository, QuoteRepository,
        RateLimitRepository, RepositoryError,
    };

    use super::{ApprovalOutcome, DenialOutcome, SubmissionOutcome};
    use crate::context::Stores;
    use crate::testing::{harness, harness_with, FailingStore};

    fn alice() -> UserId {
        UserId("U-alice".to_owned())
    }

    #[tokio::test]
    async fn submit_then_approve_moves_quote_with_same_id() {
        let harness = harness();
        let workflow = harness.context.moderation();

        let SubmissionOutcome::Accepted(pending) =
            workflow.submit(&alice(), "Hi | Bob | :wave:").await.expect("submit")
        else {
            panic!("expected acceptance");
        };
        assert_eq!(pending.status, ModerationStatus::Pending);
        let counters = harness.context.stores.rate_limits.find(&alice()).await.expect("read");
        assert_eq!(counters.map(|c| c.pending_count), Some(1));

        let outcome = workflow.approve(&pending.id).await.expect("approve");
        let ApprovalOutcome::Approved(live) = outcome else {
            panic!("expected approval");
        };
        assert_eq!(live.id, pending.id);
        assert_eq!(live.text, "Hi");
        let leftover = harness.context.stores.pending.find_by_id(&pending.id).await.expect("read");
        assert!(leftover.is_none());

        let counters =
            harness.context.stores.rate_limits.find(&alice()).await.expect("read").expect("row");
        assert_eq!((counters.pending_count, counters.daily_approved_count), (0, 1));
    }

    #[tokio::test]
    async fn duplicate_text_is_rejected_with_original_author() {
        let harness = harness();
        let workflow = harness.context.moderation();

        let SubmissionOutcome::Accepted(first) =
            workflow.submit(&alice(), "Hi | Bob | :wave:").await.expect("submit")
        else {
            panic!("expected acceptance");
        };
        workflow.approve(&first.id).await.expect("approve");

        let second = workflow.submit(&UserId("U-bob".to_owned()), "Hi | Carol | :star:").await;
        assert_eq!(
            second.expect("submit"),
            SubmissionOutcome::Duplicate { existing_author: "Bob".to_owned() }
        );
        assert!(workflow.list_pending().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn quota_gate_runs_before_validation() {
        let harness = harness();
        let workflow = harness.context.moderation();

        for n in 0..3 {
            workflow.submit(&alice(), &format!("Quote {n} | Bob | :wave:")).await.expect("submit");
        }
        let outcome = workflow.submit(&alice(), "not even well formed").await.expect("submit");
        assert_eq!(
            outcome,
            SubmissionOutcome::RateLimited(DenialReason::PendingQuota { pending: 3 })
        );
    }

    #[tokio::test]
    async fn invalid_input_creates_nothing() {
        let harness = harness();
        let workflow = harness.context.moderation();

        let error = workflow.submit(&alice(), "Hi | Bob | wave").await.expect_err("bad emoji");
        assert!(matches!(error, ApplicationError::Domain(DomainError::InvalidEmoji(_))));
        let error = workflow.submit(&alice(), "Hi | Bob").await.expect_err("bad format");
        assert_eq!(error, ApplicationError::Domain(DomainError::InvalidSubmissionFormat));

        assert!(workflow.list_pending().await.expect("list").is_empty());
        assert!(harness.context.stores.rate_limits.find(&alice()).await.expect("read").is_none());
    }

    #[tokio::test]
    async fn deny_discards_and_decrements() {
        let harness = harness();
        let workflow = harness.context.moderation();

        let SubmissionOutcome::Accepted(pending) =
            workflow.submit(&alice(), "Hi | Bob | :wave:").await.expect("submit")
        else {
            panic!("expected acceptance");
        };
        let denied = workflow.deny(&pending.id).await.expect("deny");
        assert!(matches!(denied, DenialOutcome::Denied(_)));
        assert_eq!(workflow.deny(&pending.id).await.expect("deny again"), DenialOutcome::NotFound);
        assert_eq!(
            workflow.approve(&pending.id).await.expect("approve missing"),
            ApprovalOutcome::NotFound
        );

        let counters =
            harness.context.stores.rate_limits.find(&alice()).await.expect("read").expect("row");
        assert_eq!(counters.pending_count, 0);
        assert!(harness.context.stores.quotes.list_all().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn reconcile_finishes_interrupted_decisions() {
        let harness = harness();
        let workflow = harness.context.moderation();
        let pending_store = harness.context.stores.pending.clone();

        let mut ids = Vec::new();
        for text in ["Hi", "Bye"] {
            let raw = format!("{text} | Bob | :wave:");
            let SubmissionOutcome::Accepted(pending) =
                workflow.submit(&alice(), &raw).await.expect("submit")
            else {
                panic!("expected acceptance");
            };
            ids.push(pending.id);
        }
        assert!(pending_store.claim(&ids[0], ModerationStatus::Approved).await.expect("claim"));
        assert!(pending_store.claim(&ids[1], ModerationStatus::Denied).await.expect("claim"));
        assert!(workflow.list_pending().await.expect("list").is_empty());

        let report = workflow.reconcile().await.expect("reconcile");
        assert_eq!((report.scanned, report.resolved), (2, 2));
        let live = harness.context.stores.quotes.list_all().await.expect("list");
        assert_eq!(live.iter().map(|q| q.id.clone()).collect::<Vec<_>>(), vec![ids[0].clone()]);
        assert!(pending_store.list_decided().await.expect("decided").is_empty());

        let counters =
            harness.context.stores.rate_limits.find(&alice()).await.expect("read").expect("row");
        assert_eq!((counters.pending_count, counters.daily_approved_count), (0, 1));

        let again = workflow.reconcile().await.expect("reconcile");
        assert_eq!((again.scanned, again.resolved), (0, 0));
    }

    #[tokio::test]
    async fn racing_approvals_decide_a_quote_once() {
        let mut stores = Stores::in_memory();
        stores.pending = Arc::new(Lockstep::default());
        let harness = harness_with(stores, Default::default());
        let workflow = harness.context.moderation();

        let mut ids = Vec::new();
        for text in ["Hi", "Bye"] {
            let raw = format!("{text} | Bob | :wave:");
            let SubmissionOutcome::Accepted(pending) =
                workflow.submit(&alice(), &raw).await.expect("submit")
            else {
                panic!("expected acceptance");
            };
            ids.push(pending.id);
        }

        let (first, second) = tokio::join!(workflow.approve(&ids[0]), workflow.approve(&ids[0]));
        let outcomes = [first.expect("approve"), second.expect("approve")];
        let approved =
            outcomes.iter().filter(|o| matches!(o, ApprovalOutcome::Approved(_))).count();
        assert_eq!(approved, 1, "outcomes: {outcomes:?}");
        assert!(outcomes.contains(&ApprovalOutcome::NotFound));

        assert_eq!(harness.context.stores.quotes.list_all().await.expect("list").len(), 1);
        let counters =
            harness.context.stores.rate_limits.find(&alice()).await.expect("read").expect("row");
        assert_eq!((counters.pending_count, counters.daily_approved_count), (1, 1));
    }

    #[tokio::test]
    async fn approve_and_deny_together_leave_one_decision() {
        let mut stores = Stores::in_memory();
        stores.pending = Arc::new(Lockstep::default());
        let harness = harness_with(stores, Default::default());
        let workflow = harness.context.moderation();

        let SubmissionOutcome::Accepted(pending) =
            workflow.submit(&alice(), "Hi | Bob | :wave:").await.expect("submit")
        else {
            panic!("expected acceptance");
        };

        let (approved, denied) =
            tokio::join!(workflow.approve(&pending.id), workflow.deny(&pending.id));
        let approved = matches!(approved.expect("approve"), ApprovalOutcome::Approved(_));
        let denied = matches!(denied.expect("deny"), DenialOutcome::Denied(_));
        assert!(approved ^ denied, "approved={approved} denied={denied}");

        let live = harness.context.stores.quotes.list_all().await.expect("list");
        assert_eq!(live.len(), usize::from(approved));
        let counters =
            harness.context.stores.rate_limits.find(&alice()).await.expect("read").expect("row");
        assert_eq!(counters.pending_count, 0);
        assert_eq!(counters.daily_approved_count, u32::from(approved));
    }

    #[tokio::test]
    async fn drifted_pending_counter_defers_to_pending_rows() {
        let harness = harness();
        let workflow = harness.context.moderation();
        let counters = harness.context.stores.rate_limits.clone();

        for _ in 0..3 {
            counters
                .increment_pending(
                    &alice(),
                    harness.clock.now(),
                    harness.clock.today(),
                    chrono::Duration::hours(24),
                )
                .await
                .expect("bump");
        }

        let outcome = workflow.submit(&alice(), "Hi | Bob | :wave:").await.expect("submit");
        assert!(matches!(outcome, SubmissionOutcome::Accepted(_)), "got {outcome:?}");

        for n in 0..2 {
            workflow.submit(&alice(), &format!("Quote {n} | Bob | :wave:")).await.expect("submit");
        }
        let outcome = workflow.submit(&alice(), "One more | Bob | :wave:").await.expect("submit");
        assert!(
            matches!(outcome, SubmissionOutcome::RateLimited(DenialReason::PendingQuota { .. })),
            "got {outcome:?}"
        );
    }

    #[tokio::test]
    async fn write_failure_propagates_and_creates_nothing() {
        let mut stores = Stores::in_memory();
        stores.pending = Arc::new(FailingStore);
        let harness = harness_with(stores, Default::default());
        let workflow = harness.context.moderation();

        assert!(matches!(
            workflow.submit(&alice(), "Hi | Bob | :wave:").await,
            Err(ApplicationError::Persistence(_))
        ));
        assert!(harness.context.stores.rate_limits.find(&alice()).await.expect("read").is_none());
        assert!(workflow.approve(&QuoteId("q-1".to_owned())).await.is_err());
    }

    /// Holds every `find_by_id` until two callers have read the row.
    struct Lockstep {
        inner: InMemoryPendingQuoteRepository,
        readers: Barrier,
    }

    impl Default for Lockstep {
        fn default() -> Self {
            Self { inner: InMemoryPendingQuoteRepository::default(), readers: Barrier::new(2) }
        }
    }

    #[async_trait]
    impl PendingQuoteRepository for Lockstep {
        async fn insert(&self, pending: PendingQuote) -> Result<(), RepositoryError> {
            self.inner.insert(pending).await
        }
        async fn find_by_id(
            &self,
            id: &QuoteId,
        ) -> Result<Option<PendingQuote>, RepositoryError> {
            let found = self.inner.find_by_id(id).await;
            self.readers.wait().await;
            found
        }
        async fn claim(
            &self,
            id: &QuoteId,
            decision: ModerationStatus,
        ) -> Result<bool, RepositoryError> {
            self.inner.claim(id, decision).await
        }
        async fn delete(&self, id: &QuoteId) -> Result<bool, RepositoryError> {
            self.inner.delete(id).await
        }
        async fn list_pending(&self) -> Result<Vec<PendingQuote>, RepositoryError> {
            self.inner.list_pending().await
        }
        async fn list_decided(&self) -> Result<Vec<PendingQuote>, RepositoryError> {
            self.inner.list_decided().await
        }
        async fn count_by_proposer(&self, proposer: &UserId) -> Result<u32, RepositoryError> {
            self.inner.count_by_proposer(proposer).await
        }
    }
}
