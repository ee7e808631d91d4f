//! Request routing: variant selection, dispatch, and outcome logging.
//!
//! Given an endpoint name, a desired status, and an optional version, the
//! router selects the eligible model variant, dispatches its predictor, and
//! logs the result. Under `ab_testing` two variants are eligible and traffic
//! is split by an unbiased coin: every request is an independent
//! Bernoulli(0.5) trial with no session affinity.
//!
//! The coin comes from an injectable [`RandomSource`] so that routing is
//! deterministic under test; production wiring uses [`ThreadRngSource`].

use crate::error::{ArbiterError, Result};
use crate::observability;
use crate::outcome::OutcomeLog;
use crate::predict::{Outcome, PredictorSet};
use crate::store::MemoryStore;
use crate::types::{ModelVariant, StatusTag};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Source of unbiased coin flips for the `ab_testing` branch.
pub trait RandomSource: Send + Sync {
    /// Flip an unbiased coin; `true` selects the first experiment arm.
    fn coin(&self) -> bool;
}

/// Thread-local RNG source used in production wiring.
pub struct ThreadRngSource;

impl RandomSource for ThreadRngSource {
    fn coin(&self) -> bool {
        rand::random::<f64>() < 0.5
    }
}

/// Deterministic seeded source for reproducible tests.
pub struct SeededRandomSource {
    rng: Mutex<StdRng>,
}

impl SeededRandomSource {
    /// Create a source with a fixed seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandomSource {
    fn coin(&self) -> bool {
        self.rng
            .lock()
            .expect("random source lock poisoned")
            .gen_bool(0.5)
    }
}

/// Variant selection parameters of a routed request.
#[derive(Debug, Clone)]
pub struct RouteQuery {
    /// Desired variant status; defaults to `production`.
    pub status: StatusTag,
    /// Exact version to select, when the status alone is ambiguous.
    pub version: Option<String>,
}

impl Default for RouteQuery {
    fn default() -> Self {
        Self {
            status: StatusTag::Production,
            version: None,
        }
    }
}

impl RouteQuery {
    /// Build a query from raw request parameters. An unknown status tag is a
    /// caller error.
    pub fn from_params(status: Option<&str>, version: Option<String>) -> Result<Self> {
        let status = match status {
            Some(raw) => raw
                .parse::<StatusTag>()
                .map_err(ArbiterError::InvalidArgument)?,
            None => StatusTag::Production,
        };
        Ok(Self { status, version })
    }

    /// Select a specific status.
    pub fn with_status(mut self, status: StatusTag) -> Self {
        self.status = status;
        self
    }

    /// Select a specific version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

/// Routes inference requests to registered model variants.
pub struct Router {
    store: Arc<MemoryStore>,
    log: OutcomeLog,
    predictors: Arc<PredictorSet>,
    random: Arc<dyn RandomSource>,
}

impl Router {
    /// Create a router over a store, an immutable predictor set, and a
    /// random source for experiment-traffic splitting.
    pub fn new(
        store: Arc<MemoryStore>,
        predictors: Arc<PredictorSet>,
        random: Arc<dyn RandomSource>,
    ) -> Self {
        Self {
            log: OutcomeLog::new(store.clone()),
            store,
            predictors,
            random,
        }
    }

    /// Route one inference request.
    ///
    /// Selects the eligible variant for `endpoint_name` under the query's
    /// status and version filters, dispatches its predictor, logs one
    /// [`crate::types::OutcomeRecord`], and returns the outcome with the
    /// record's id attached. Predictor failure is captured as an error
    /// outcome and logged like any other; selection failures
    /// ([`ArbiterError::NotAvailable`], [`ArbiterError::AmbiguousSelection`])
    /// are raised before any write.
    pub async fn route(
        &self,
        endpoint_name: &str,
        query: &RouteQuery,
        input: serde_json::Value,
    ) -> Result<Outcome> {
        let chosen = self.select(endpoint_name, query).await?;
        debug!(
            endpoint = endpoint_name,
            variant = %chosen.id,
            version = %chosen.version,
            status = %query.status,
            "Dispatching prediction"
        );

        let mut outcome = match self.predictors.get(chosen.id) {
            Some(predictor) => Outcome::from_result(predictor.compute_prediction(&input)),
            None => Outcome::error(format!("no predictor loaded for variant {}", chosen.id)),
        };

        let record = self.log.record(chosen.id, input, &outcome).await?;
        outcome.set_request_id(record.id);

        observability::record_route(endpoint_name, outcome.is_error());
        Ok(outcome)
    }

    /// Select the variant eligible to serve a request.
    async fn select(&self, endpoint_name: &str, query: &RouteQuery) -> Result<ModelVariant> {
        let mut candidates = Vec::new();
        for variant in self.store.variants_for_endpoint(endpoint_name).await {
            match self.store.active_status(variant.id).await {
                Some(active) if active.status == query.status => candidates.push(variant),
                _ => {}
            }
        }

        if let Some(version) = &query.version {
            candidates.retain(|v| &v.version == version);
        }

        if candidates.is_empty() {
            return Err(ArbiterError::NotAvailable(format!(
                "no {} variant for endpoint {}",
                query.status, endpoint_name
            )));
        }

        if candidates.len() != 1 && query.status != StatusTag::AbTesting {
            return Err(ArbiterError::AmbiguousSelection(format!(
                "{} {} variants match endpoint {}; specify a version",
                candidates.len(),
                query.status,
                endpoint_name
            )));
        }

        // Under ab_testing, split traffic between the two arms with an
        // independent unbiased coin per request.
        let index = if query.status == StatusTag::AbTesting && candidates.len() > 1 {
            if self.random.coin() {
                0
            } else {
                1
            }
        } else {
            0
        };

        Ok(candidates.swap_remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::StatusLedger;
    use crate::predict::{FailingPredictor, FixedLabelPredictor, PredictorSetBuilder};
    use crate::types::{ModelVariant, VariantId};
    use chrono::Utc;
    use serde_json::json;

    /// Source that always picks the given arm.
    struct FixedCoin(bool);

    impl RandomSource for FixedCoin {
        fn coin(&self) -> bool {
            self.0
        }
    }

    struct Harness {
        store: Arc<MemoryStore>,
        ledger: StatusLedger,
        builder: PredictorSetBuilder,
    }

    impl Harness {
        fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            Self {
                ledger: StatusLedger::new(store.clone()),
                store,
                builder: PredictorSetBuilder::new(),
            }
        }

        async fn add_variant(
            &mut self,
            endpoint: &str,
            name: &str,
            version: &str,
            status: StatusTag,
            label: &str,
        ) -> VariantId {
            let variant = ModelVariant {
                id: VariantId::new(),
                endpoint: endpoint.to_string(),
                name: name.to_string(),
                version: version.to_string(),
                owner: "tester".to_string(),
                description: String::new(),
                source_ref: String::new(),
                created_at: Utc::now(),
            };
            let id = variant.id;
            self.store
                .transaction(|txn| {
                    txn.create_endpoint_if_absent(endpoint);
                    txn.insert_variant(variant)
                })
                .await
                .unwrap();
            self.ledger
                .set_active_status(id, status, "tester")
                .await
                .unwrap();
            self.builder
                .insert(id, Arc::new(FixedLabelPredictor::new(label, 0.9)));
            id
        }

        fn router(self, random: Arc<dyn RandomSource>) -> Router {
            Router::new(self.store, Arc::new(self.builder.build()), random)
        }
    }

    #[tokio::test]
    async fn test_single_production_variant_is_deterministic() {
        let mut harness = Harness::new();
        harness
            .add_variant("income", "baseline", "0.1.0", StatusTag::Production, ">50K")
            .await;
        let router = harness.router(Arc::new(ThreadRngSource));

        for _ in 0..20 {
            let outcome = router
                .route("income", &RouteQuery::default(), json!({"age": 30}))
                .await
                .unwrap();
            assert_eq!(outcome.label(), ">50K");
            assert!(outcome.request_id().is_some());
        }
    }

    #[tokio::test]
    async fn test_no_candidate_is_not_available() {
        let mut harness = Harness::new();
        harness
            .add_variant("income", "baseline", "0.1.0", StatusTag::Testing, ">50K")
            .await;
        let store = harness.store.clone();
        let router = harness.router(Arc::new(ThreadRngSource));

        let err = router
            .route("income", &RouteQuery::default(), json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ArbiterError::NotAvailable(_)));

        let err = router
            .route("unknown", &RouteQuery::default(), json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ArbiterError::NotAvailable(_)));

        // Selection failures never log an outcome.
        assert!(store.list_outcomes().await.is_empty());
    }

    #[tokio::test]
    async fn test_two_production_variants_are_ambiguous() {
        let mut harness = Harness::new();
        harness
            .add_variant("income", "baseline", "0.1.0", StatusTag::Production, "a")
            .await;
        harness
            .add_variant("income", "tuned", "0.2.0", StatusTag::Production, "b")
            .await;
        let router = harness.router(Arc::new(ThreadRngSource));

        let err = router
            .route("income", &RouteQuery::default(), json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ArbiterError::AmbiguousSelection(_)));

        // Disambiguating by version succeeds.
        let outcome = router
            .route(
                "income",
                &RouteQuery::default().with_version("0.2.0"),
                json!({}),
            )
            .await
            .unwrap();
        assert_eq!(outcome.label(), "b");
    }

    #[tokio::test]
    async fn test_ab_testing_coin_selects_arm() {
        let mut harness = Harness::new();
        harness
            .add_variant("income", "baseline", "0.1.0", StatusTag::AbTesting, "first")
            .await;
        harness
            .add_variant("income", "tuned", "0.2.0", StatusTag::AbTesting, "second")
            .await;
        let store = harness.store.clone();
        let builder = harness.builder;
        let predictors = Arc::new(builder.build());

        let heads = Router::new(store.clone(), predictors.clone(), Arc::new(FixedCoin(true)));
        let query = RouteQuery::default().with_status(StatusTag::AbTesting);
        let outcome = heads.route("income", &query, json!({})).await.unwrap();
        assert_eq!(outcome.label(), "first");

        let tails = Router::new(store, predictors, Arc::new(FixedCoin(false)));
        let outcome = tails.route("income", &query, json!({})).await.unwrap();
        assert_eq!(outcome.label(), "second");
    }

    #[tokio::test]
    async fn test_predictor_failure_is_logged_not_raised() {
        let mut harness = Harness::new();
        let id = harness
            .add_variant("income", "baseline", "0.1.0", StatusTag::Production, "x")
            .await;
        harness
            .builder
            .insert(id, Arc::new(FailingPredictor::new("weights corrupted")));
        let store = harness.store.clone();
        let router = harness.router(Arc::new(ThreadRngSource));

        let outcome = router
            .route("income", &RouteQuery::default(), json!({}))
            .await
            .unwrap();
        assert!(outcome.is_error());
        assert_eq!(outcome.label(), "error");
        assert!(outcome.request_id().is_some());

        let records = store.list_outcomes().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].response, "error");
    }

    #[tokio::test]
    async fn test_route_query_from_params() {
        let query = RouteQuery::from_params(Some("ab_testing"), None).unwrap();
        assert_eq!(query.status, StatusTag::AbTesting);

        let query = RouteQuery::from_params(None, Some("0.1.0".to_string())).unwrap();
        assert_eq!(query.status, StatusTag::Production);
        assert_eq!(query.version.as_deref(), Some("0.1.0"));

        assert!(RouteQuery::from_params(Some("staging"), None).is_err());
    }
}
