//! Variant registry: model variants grouped by algorithm family.
//!
//! Registration happens once at process start (the predictor set is frozen
//! afterwards): each call creates the endpoint on first use, the variant row,
//! and the variant's initial active status, all in one transaction, and adds
//! the predictor to the set builder. Re-registering the same
//! (endpoint, name, version) triple is idempotent: the existing variant id
//! is returned and its status history is left untouched.

use crate::error::Result;
use crate::ledger::apply_active_status;
use crate::predict::{Predictor, PredictorSetBuilder};
use crate::store::MemoryStore;
use crate::types::{Endpoint, ModelVariant, StatusTag, VariantId};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

/// Everything needed to register one model variant.
#[derive(Debug, Clone)]
pub struct VariantSpec {
    /// Owning endpoint name; created on first use.
    pub endpoint: String,
    /// Human-readable variant name.
    pub name: String,
    /// Version string.
    pub version: String,
    /// Owner identity; also records the initial status assignment.
    pub owner: String,
    /// Free-text description.
    pub description: String,
    /// Serialized source reference.
    pub source_ref: String,
    /// Initial lifecycle status.
    pub status: StatusTag,
}

/// The set of registered model variants, grouped by endpoint.
#[derive(Clone)]
pub struct VariantRegistry {
    store: Arc<MemoryStore>,
}

impl VariantRegistry {
    /// Create a registry over a store.
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    /// Register a model variant and its predictor.
    ///
    /// Endpoint creation, the variant row, and the initial active status are
    /// applied in one transaction. If an identical (endpoint, name, version)
    /// triple is already registered, the existing id is returned and only
    /// the predictor binding is refreshed.
    pub async fn register(
        &self,
        spec: VariantSpec,
        predictor: Arc<dyn Predictor>,
        predictors: &mut PredictorSetBuilder,
    ) -> Result<VariantId> {
        let (endpoint, name) = (spec.endpoint.clone(), spec.name.clone());

        let id = self
            .store
            .transaction(move |txn| {
                if let Some(existing) = txn.find_variant(&spec.endpoint, &spec.name, &spec.version)
                {
                    return Ok(existing);
                }

                txn.create_endpoint_if_absent(&spec.endpoint);
                let variant = ModelVariant {
                    id: VariantId::new(),
                    endpoint: spec.endpoint,
                    name: spec.name,
                    version: spec.version,
                    owner: spec.owner.clone(),
                    description: spec.description,
                    source_ref: spec.source_ref,
                    created_at: Utc::now(),
                };
                let id = variant.id;
                txn.insert_variant(variant)?;
                apply_active_status(txn, id, spec.status, &spec.owner)?;
                Ok(id)
            })
            .await?;

        predictors.insert(id, predictor);
        info!(%id, endpoint = %endpoint, variant = %name, "Model variant registered");
        Ok(id)
    }

    /// All endpoints in creation order.
    pub async fn endpoints(&self) -> Vec<Endpoint> {
        self.store.list_endpoints().await
    }

    /// All variants in registration order.
    pub async fn variants(&self) -> Vec<ModelVariant> {
        self.store.list_variants().await
    }

    /// One endpoint's variants in registration order.
    pub async fn variants_for_endpoint(&self, endpoint: &str) -> Vec<ModelVariant> {
        self.store.variants_for_endpoint(endpoint).await
    }

    /// Look up one variant.
    pub async fn variant(&self, id: VariantId) -> Result<ModelVariant> {
        self.store.variant(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predict::FixedLabelPredictor;

    fn spec(endpoint: &str, name: &str, status: StatusTag) -> VariantSpec {
        VariantSpec {
            endpoint: endpoint.to_string(),
            name: name.to_string(),
            version: "0.1.0".to_string(),
            owner: "tester".to_string(),
            description: "a test variant".to_string(),
            source_ref: "tests".to_string(),
            status,
        }
    }

    #[tokio::test]
    async fn test_register_creates_endpoint_variant_and_status() {
        let store = Arc::new(MemoryStore::new());
        let registry = VariantRegistry::new(store.clone());
        let mut builder = PredictorSetBuilder::new();

        let id = registry
            .register(
                spec("income", "baseline", StatusTag::Production),
                Arc::new(FixedLabelPredictor::new(">50K", 0.8)),
                &mut builder,
            )
            .await
            .unwrap();

        assert_eq!(registry.endpoints().await.len(), 1);
        assert_eq!(registry.variants_for_endpoint("income").await.len(), 1);
        let active = store.active_status(id).await.unwrap();
        assert_eq!(active.status, StatusTag::Production);
        assert_eq!(active.created_by, "tester");
        assert!(builder.build().contains(id));
    }

    #[tokio::test]
    async fn test_second_variant_reuses_endpoint() {
        let store = Arc::new(MemoryStore::new());
        let registry = VariantRegistry::new(store);
        let mut builder = PredictorSetBuilder::new();

        registry
            .register(
                spec("income", "baseline", StatusTag::Production),
                Arc::new(FixedLabelPredictor::new("a", 0.5)),
                &mut builder,
            )
            .await
            .unwrap();
        registry
            .register(
                spec("income", "tuned", StatusTag::Testing),
                Arc::new(FixedLabelPredictor::new("b", 0.5)),
                &mut builder,
            )
            .await
            .unwrap();

        assert_eq!(registry.endpoints().await.len(), 1);
        assert_eq!(registry.variants_for_endpoint("income").await.len(), 2);
    }

    #[tokio::test]
    async fn test_reregistration_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let registry = VariantRegistry::new(store.clone());
        let mut builder = PredictorSetBuilder::new();

        let first = registry
            .register(
                spec("income", "baseline", StatusTag::Production),
                Arc::new(FixedLabelPredictor::new("a", 0.5)),
                &mut builder,
            )
            .await
            .unwrap();
        let second = registry
            .register(
                spec("income", "baseline", StatusTag::Testing),
                Arc::new(FixedLabelPredictor::new("a", 0.5)),
                &mut builder,
            )
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(registry.variants().await.len(), 1);
        // The original status assignment is untouched.
        let active = store.active_status(first).await.unwrap();
        assert_eq!(active.status, StatusTag::Production);
        assert_eq!(store.statuses_for_variant(first).await.len(), 1);
    }
}
