//! Transport-agnostic service facade.
//!
//! [`ArbiterService`] composes the store, registry, status ledger, router,
//! outcome log, and A/B test coordinator behind the operation surface the
//! gateway (or any other transport) exposes: predict, administrative status
//! changes, A/B test start/stop, feedback attachment, and read-only listings.

use crate::abtest::{AbTestCoordinator, StopSummary};
use crate::error::Result;
use crate::ledger::StatusLedger;
use crate::outcome::OutcomeLog;
use crate::predict::{Outcome, PredictorSet};
use crate::registry::VariantRegistry;
use crate::router::{RandomSource, RouteQuery, Router};
use crate::store::MemoryStore;
use crate::types::{
    AbTest, Endpoint, ModelVariant, OutcomeId, OutcomeRecord, StatusRecord, StatusTag, TestId,
    VariantId,
};
use serde_json::Value;
use std::sync::Arc;

/// The arbiter's full operation surface.
pub struct ArbiterService {
    store: Arc<MemoryStore>,
    registry: VariantRegistry,
    ledger: StatusLedger,
    router: Router,
    coordinator: AbTestCoordinator,
    log: OutcomeLog,
}

impl ArbiterService {
    /// Assemble the service from its shared store, the frozen predictor set,
    /// and the router's random source.
    pub fn new(
        store: Arc<MemoryStore>,
        predictors: Arc<PredictorSet>,
        random: Arc<dyn RandomSource>,
    ) -> Self {
        Self {
            registry: VariantRegistry::new(store.clone()),
            ledger: StatusLedger::new(store.clone()),
            router: Router::new(store.clone(), predictors, random),
            coordinator: AbTestCoordinator::new(store.clone()),
            log: OutcomeLog::new(store.clone()),
            store,
        }
    }

    /// Route one inference request and log its outcome.
    pub async fn predict(
        &self,
        endpoint: &str,
        query: &RouteQuery,
        body: Value,
    ) -> Result<Outcome> {
        self.router.route(endpoint, query, body).await
    }

    /// Administratively assign a variant's active status.
    pub async fn create_status(
        &self,
        variant: VariantId,
        status: StatusTag,
        created_by: &str,
    ) -> Result<StatusRecord> {
        self.ledger.set_active_status(variant, status, created_by).await
    }

    /// Start an A/B test between two variants.
    pub async fn start_ab_test(
        &self,
        variant_1: VariantId,
        variant_2: VariantId,
        created_by: &str,
    ) -> Result<AbTest> {
        self.coordinator.start_test(variant_1, variant_2, created_by).await
    }

    /// Stop an A/B test and arbitrate the winner.
    pub async fn stop_ab_test(&self, id: TestId, actor: &str) -> Result<StopSummary> {
        self.coordinator.stop_test(id, actor).await
    }

    /// Attach a ground-truth label to a logged outcome.
    pub async fn attach_feedback(&self, id: OutcomeId, feedback: &str) -> Result<OutcomeRecord> {
        self.log.attach_feedback(id, feedback).await
    }

    // ---- read-only listings and lookups ----

    pub async fn endpoints(&self) -> Vec<Endpoint> {
        self.registry.endpoints().await
    }

    pub async fn endpoint(&self, name: &str) -> Result<Endpoint> {
        self.store.endpoint(name).await
    }

    pub async fn variants(&self) -> Vec<ModelVariant> {
        self.registry.variants().await
    }

    pub async fn variant(&self, id: VariantId) -> Result<ModelVariant> {
        self.registry.variant(id).await
    }

    pub async fn statuses(&self) -> Vec<StatusRecord> {
        self.store.list_statuses().await
    }

    pub async fn active_status(&self, variant: VariantId) -> Option<StatusRecord> {
        self.ledger.active_status(variant).await
    }

    pub async fn outcomes(&self) -> Vec<OutcomeRecord> {
        self.log.list().await
    }

    pub async fn outcome(&self, id: OutcomeId) -> Result<OutcomeRecord> {
        self.log.get(id).await
    }

    pub async fn ab_tests(&self) -> Vec<AbTest> {
        self.coordinator.list().await
    }

    pub async fn ab_test(&self, id: TestId) -> Result<AbTest> {
        self.coordinator.get(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predict::{FixedLabelPredictor, PredictorSetBuilder};
    use crate::registry::VariantSpec;
    use crate::router::ThreadRngSource;

    #[tokio::test]
    async fn test_predict_and_feedback_round_trip() {
        let store = Arc::new(MemoryStore::new());
        let registry = VariantRegistry::new(store.clone());
        let mut builder = PredictorSetBuilder::new();

        registry
            .register(
                VariantSpec {
                    endpoint: "income".to_string(),
                    name: "baseline".to_string(),
                    version: "0.1.0".to_string(),
                    owner: "tester".to_string(),
                    description: String::new(),
                    source_ref: String::new(),
                    status: StatusTag::Production,
                },
                Arc::new(FixedLabelPredictor::new(">50K", 0.8)),
                &mut builder,
            )
            .await
            .unwrap();

        let service = ArbiterService::new(
            store,
            Arc::new(builder.build()),
            Arc::new(ThreadRngSource),
        );

        let outcome = service
            .predict("income", &RouteQuery::default(), serde_json::json!({"age": 40}))
            .await
            .unwrap();
        let id = outcome.request_id().unwrap();

        let record = service.attach_feedback(id, ">50K").await.unwrap();
        assert!(record.is_correct());
        assert_eq!(service.outcomes().await.len(), 1);
    }
}
