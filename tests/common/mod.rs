// Shared fixtures for integration tests

use arbiter::outcome::OutcomeLog;
use arbiter::predict::{Outcome, Prediction, Predictor, PredictorSetBuilder};
use arbiter::registry::{VariantRegistry, VariantSpec};
use arbiter::router::RandomSource;
use arbiter::service::ArbiterService;
use arbiter::store::MemoryStore;
use arbiter::types::{StatusTag, VariantId};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Builds a service with a chosen set of variants and predictors.
pub struct ServiceBuilder {
    store: Arc<MemoryStore>,
    registry: VariantRegistry,
    predictors: PredictorSetBuilder,
}

impl ServiceBuilder {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            registry: VariantRegistry::new(store.clone()),
            store,
            predictors: PredictorSetBuilder::new(),
        }
    }

    /// Register a variant at version 0.1.0.
    pub async fn add_variant(
        &mut self,
        endpoint: &str,
        name: &str,
        status: StatusTag,
        predictor: Arc<dyn Predictor>,
    ) -> VariantId {
        self.add_variant_version(endpoint, name, "0.1.0", status, predictor)
            .await
    }

    /// Register a variant at an explicit version.
    pub async fn add_variant_version(
        &mut self,
        endpoint: &str,
        name: &str,
        version: &str,
        status: StatusTag,
        predictor: Arc<dyn Predictor>,
    ) -> VariantId {
        self.registry
            .register(
                VariantSpec {
                    endpoint: endpoint.to_string(),
                    name: name.to_string(),
                    version: version.to_string(),
                    owner: "fixtures".to_string(),
                    description: String::new(),
                    source_ref: String::new(),
                    status,
                },
                predictor,
                &mut self.predictors,
            )
            .await
            .expect("variant registration failed")
    }

    /// Freeze the predictor set and assemble the service.
    pub fn build(self, random: Arc<dyn RandomSource>) -> (Arc<MemoryStore>, Arc<ArbiterService>) {
        let service = ArbiterService::new(
            self.store.clone(),
            Arc::new(self.predictors.build()),
            random,
        );
        (self.store, Arc::new(service))
    }
}

/// A successful outcome with the given label.
pub fn ok_outcome(label: &str) -> Outcome {
    Outcome::from_result(Ok(Prediction {
        label: label.to_string(),
        probability: Some(0.7),
    }))
}

/// Log `correct + incorrect` outcomes for a variant with feedback attached:
/// the first group matches its feedback, the second does not.
pub async fn log_scored_outcomes(
    store: &Arc<MemoryStore>,
    variant: VariantId,
    correct: usize,
    incorrect: usize,
) {
    let log = OutcomeLog::new(store.clone());
    for _ in 0..correct {
        let record = log
            .record(variant, json!({}), &ok_outcome(">50K"))
            .await
            .expect("outcome insert failed");
        log.attach_feedback(record.id, ">50K")
            .await
            .expect("feedback attach failed");
    }
    for _ in 0..incorrect {
        let record = log
            .record(variant, json!({}), &ok_outcome(">50K"))
            .await
            .expect("outcome insert failed");
        log.attach_feedback(record.id, "<=50K")
            .await
            .expect("feedback attach failed");
    }
}

/// Sleep long enough for `Utc::now()` to move past the strict window bounds.
pub async fn step_clock() {
    tokio::time::sleep(Duration::from_millis(3)).await;
}
