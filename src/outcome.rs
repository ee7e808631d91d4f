//! Outcome log: append-only record of every prediction made.
//!
//! Each routed request produces one [`OutcomeRecord`] carrying the raw input,
//! the full structured outcome, and the short derived response label. Ground
//! truth arrives later through [`OutcomeLog::attach_feedback`], the record's
//! sole mutation path, and the log is then the evidence base for accuracy
//! scoring in A/B test arbitration.

use crate::error::{ArbiterError, Result};
use crate::predict::Outcome;
use crate::store::{MemoryStore, OutcomeFilter};
use crate::types::{OutcomeId, OutcomeRecord, VariantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Accuracy evidence for one variant within an evaluation window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VariantScore {
    /// All outcomes logged for the variant in the window.
    pub total: u64,
    /// Outcomes whose response label equals the feedback label.
    pub correct: u64,
}

impl VariantScore {
    /// Fraction of correct outcomes. Only defined when `total > 0`; the log
    /// refuses to produce a score with a zero denominator.
    pub fn accuracy(&self) -> f64 {
        self.correct as f64 / self.total as f64
    }
}

/// Append-only prediction log over the store.
#[derive(Clone)]
pub struct OutcomeLog {
    store: Arc<MemoryStore>,
}

impl OutcomeLog {
    /// Create a log over a store.
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    /// Persist one outcome against a variant. The record is created with
    /// empty feedback; the full outcome envelope is stored as logged, without
    /// the record id that is attached to the returned copy afterwards.
    pub async fn record(
        &self,
        variant: VariantId,
        input: Value,
        outcome: &Outcome,
    ) -> Result<OutcomeRecord> {
        let record = OutcomeRecord {
            id: OutcomeId::new(),
            variant,
            input,
            full_response: serde_json::to_value(outcome)?,
            response: outcome.label().to_string(),
            feedback: None,
            created_at: Utc::now(),
        };
        self.store.insert_outcome(record.clone()).await?;
        debug!(%variant, outcome = %record.id, label = %record.response, "Outcome logged");
        Ok(record)
    }

    /// Attach a ground-truth label to a logged outcome.
    pub async fn attach_feedback(&self, id: OutcomeId, feedback: &str) -> Result<OutcomeRecord> {
        self.store.set_feedback(id, feedback).await
    }

    /// Look up one record.
    pub async fn get(&self, id: OutcomeId) -> Result<OutcomeRecord> {
        self.store.outcome(id).await
    }

    /// All records in creation order.
    pub async fn list(&self) -> Vec<OutcomeRecord> {
        self.store.list_outcomes().await
    }

    /// A variant's records within the half-open window `(after, before)`.
    pub async fn in_window(
        &self,
        variant: VariantId,
        after: DateTime<Utc>,
        before: DateTime<Utc>,
    ) -> Vec<OutcomeRecord> {
        let filter = OutcomeFilter::new()
            .for_variant(variant)
            .after(after)
            .before(before);
        self.store.filter_outcomes(&filter).await
    }

    /// Score a variant within the window `(after, before)`, both bounds
    /// strict. A variant with zero logged outcomes in the window cannot be
    /// scored and yields [`ArbiterError::InsufficientData`], never a silent
    /// zero.
    pub async fn score_in_window(
        &self,
        variant: VariantId,
        after: DateTime<Utc>,
        before: DateTime<Utc>,
    ) -> Result<VariantScore> {
        let base = OutcomeFilter::new()
            .for_variant(variant)
            .after(after)
            .before(before);
        let total = self.store.count_outcomes(&base).await;
        if total == 0 {
            return Err(ArbiterError::InsufficientData(format!(
                "variant {} has no outcomes in the evaluation window",
                variant
            )));
        }
        let correct = self.store.count_outcomes(&base.correct_only()).await;
        Ok(VariantScore { total, correct })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predict::{Outcome, Prediction};
    use crate::types::ModelVariant;
    use serde_json::json;

    async fn seeded() -> (Arc<MemoryStore>, OutcomeLog, VariantId) {
        let store = Arc::new(MemoryStore::new());
        let variant = ModelVariant {
            id: VariantId::new(),
            endpoint: "income".to_string(),
            name: "baseline".to_string(),
            version: "0.1.0".to_string(),
            owner: "tester".to_string(),
            description: String::new(),
            source_ref: String::new(),
            created_at: Utc::now(),
        };
        let id = variant.id;
        store
            .transaction(|txn| {
                txn.create_endpoint_if_absent("income");
                txn.insert_variant(variant)
            })
            .await
            .unwrap();
        (store.clone(), OutcomeLog::new(store), id)
    }

    fn ok_outcome(label: &str) -> Outcome {
        Outcome::from_result(Ok(Prediction {
            label: label.to_string(),
            probability: Some(0.7),
        }))
    }

    #[tokio::test]
    async fn test_record_stores_envelope_without_request_id() {
        let (_, log, variant) = seeded().await;
        let record = log
            .record(variant, json!({"age": 30}), &ok_outcome(">50K"))
            .await
            .unwrap();

        assert_eq!(record.response, ">50K");
        assert!(record.feedback.is_none());
        assert_eq!(record.full_response["status"], "ok");
        assert!(record.full_response.get("request_id").is_none());
    }

    #[tokio::test]
    async fn test_error_outcome_logged_with_sentinel_label() {
        let (_, log, variant) = seeded().await;
        let record = log
            .record(variant, json!({}), &Outcome::error("model exploded"))
            .await
            .unwrap();
        assert_eq!(record.response, "error");
        assert_eq!(record.full_response["status"], "error");
    }

    #[tokio::test]
    async fn test_feedback_drives_score() {
        let (_, log, variant) = seeded().await;
        let start = Utc::now();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;

        for expected in [">50K", ">50K", "<=50K", ">50K"] {
            let record = log
                .record(variant, json!({}), &ok_outcome(">50K"))
                .await
                .unwrap();
            log.attach_feedback(record.id, expected).await.unwrap();
        }

        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let score = log
            .score_in_window(variant, start, Utc::now())
            .await
            .unwrap();
        assert_eq!(score.total, 4);
        assert_eq!(score.correct, 3);
        assert!((score.accuracy() - 0.75).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_unattached_feedback_never_counts_correct() {
        let (_, log, variant) = seeded().await;
        let start = Utc::now();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;

        log.record(variant, json!({}), &ok_outcome(">50K"))
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let score = log
            .score_in_window(variant, start, Utc::now())
            .await
            .unwrap();
        assert_eq!(score.total, 1);
        assert_eq!(score.correct, 0);
    }

    #[tokio::test]
    async fn test_zero_traffic_is_insufficient_data() {
        let (_, log, variant) = seeded().await;
        let err = log
            .score_in_window(variant, Utc::now() - chrono::Duration::hours(1), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ArbiterError::InsufficientData(_)));
    }

    #[tokio::test]
    async fn test_window_excludes_outside_records() {
        let (_, log, variant) = seeded().await;

        log.record(variant, json!({}), &ok_outcome(">50K"))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;

        let window_start = Utc::now();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        log.record(variant, json!({}), &ok_outcome(">50K"))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let window_end = Utc::now();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        log.record(variant, json!({}), &ok_outcome(">50K"))
            .await
            .unwrap();

        let score = log
            .score_in_window(variant, window_start, window_end)
            .await
            .unwrap();
        assert_eq!(score.total, 1);
        assert_eq!(log.in_window(variant, window_start, window_end).await.len(), 1);
    }
}
