//! A/B test coordination: start, arbitrate, and stop variant comparisons.
//!
//! Starting a test atomically creates the test row and flips both variants
//! to `ab_testing`; a concurrent reader can never observe only one arm
//! flipped. Stopping a test captures the evaluation window once, scores both
//! arms from the outcome log, promotes the winner to `production`, demotes
//! the loser to `testing`, and stamps the test terminal. On exact accuracy
//! equality the first variant wins, a deliberate and stable tie-break.

use crate::error::Result;
use crate::ledger::apply_active_status;
use crate::outcome::OutcomeLog;
use crate::store::MemoryStore;
use crate::types::{AbTest, StatusTag, TestId, VariantId};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Result of stopping a test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopSummary {
    /// Human-readable status message.
    pub message: String,
    /// Accuracy summary for both variants.
    pub summary: String,
}

/// Orchestrates the lifecycle of two-variant comparisons.
#[derive(Clone)]
pub struct AbTestCoordinator {
    store: Arc<MemoryStore>,
    log: OutcomeLog,
}

impl AbTestCoordinator {
    /// Create a coordinator over a store.
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self {
            log: OutcomeLog::new(store.clone()),
            store,
        }
    }

    /// Start a comparison between two variants.
    ///
    /// One transaction creates the test row and makes `ab_testing` the
    /// active status of both variants; on any failure the whole operation
    /// aborts with nothing applied.
    pub async fn start_test(
        &self,
        variant_1: VariantId,
        variant_2: VariantId,
        created_by: &str,
    ) -> Result<AbTest> {
        // Fail fast with typed errors before any write.
        self.store.variant(variant_1).await?;
        self.store.variant(variant_2).await?;

        let test = AbTest {
            id: TestId::new(),
            variant_1,
            variant_2,
            created_by: created_by.to_string(),
            created_at: Utc::now(),
            ended_at: None,
            summary: None,
        };

        let inserted = test.clone();
        self.store
            .transaction(move |txn| {
                txn.insert_test(inserted)?;
                apply_active_status(txn, variant_1, StatusTag::AbTesting, created_by)?;
                apply_active_status(txn, variant_2, StatusTag::AbTesting, created_by)?;
                Ok(())
            })
            .await?;

        crate::observability::record_ab_test_started();
        info!(test = %test.id, %variant_1, %variant_2, created_by, "A/B test started");
        Ok(test)
    }

    /// Stop a comparison and arbitrate the winner.
    ///
    /// Idempotent: stopping an already-finished test replays its stored
    /// summary without recomputing anything. Otherwise the evaluation window
    /// `(created_at, now)` is captured once, both arms are scored from the
    /// outcome log (a zero-traffic arm fails with
    /// [`crate::error::ArbiterError::InsufficientData`]), and the status flips plus the
    /// terminal stamp are applied in one transaction. Any failure leaves
    /// the test running so a retry recomputes from scratch.
    pub async fn stop_test(&self, id: TestId, actor: &str) -> Result<StopSummary> {
        let test = self.store.test(id).await?;

        if test.ended_at.is_some() {
            return Ok(StopSummary {
                message: "A/B test already finished".to_string(),
                summary: test.summary.unwrap_or_default(),
            });
        }

        // The window's upper bound is fixed here, once, and used as a strict
        // bound everywhere below.
        let ended_at = Utc::now();

        let score_1 = self
            .log
            .score_in_window(test.variant_1, test.created_at, ended_at)
            .await?;
        let score_2 = self
            .log
            .score_in_window(test.variant_2, test.created_at, ended_at)
            .await?;

        let accuracy_1 = score_1.accuracy();
        let accuracy_2 = score_2.accuracy();

        // The first variant wins ties: only a strictly better second variant
        // swaps the promotion order.
        let (winner, loser) = if accuracy_2 > accuracy_1 {
            (test.variant_2, test.variant_1)
        } else {
            (test.variant_1, test.variant_2)
        };

        let summary = format!(
            "Variant #1 accuracy: {}, Variant #2 accuracy: {}",
            accuracy_1, accuracy_2
        );

        let stamped = summary.clone();
        let actor_owned = actor.to_string();
        self.store
            .transaction(move |txn| {
                apply_active_status(txn, winner, StatusTag::Production, &actor_owned)?;
                apply_active_status(txn, loser, StatusTag::Testing, &actor_owned)?;
                txn.finalize_test(id, ended_at, &stamped)
            })
            .await?;

        crate::observability::record_ab_test_finished();
        info!(
            test = %id,
            %winner,
            %loser,
            accuracy_1,
            accuracy_2,
            "A/B test finished"
        );

        Ok(StopSummary {
            message: "A/B test finished".to_string(),
            summary,
        })
    }

    /// Look up one test.
    pub async fn get(&self, id: TestId) -> Result<AbTest> {
        self.store.test(id).await
    }

    /// All tests in creation order.
    pub async fn list(&self) -> Vec<AbTest> {
        self.store.list_tests().await
    }
}
