//! In-memory transactional datastore backing the registry, ledger, outcome
//! log, and A/B test coordinator.
//!
//! The store keeps relational-shaped tables for endpoints, model variants,
//! status records, outcome records, and A/B tests behind a single
//! `tokio::sync::RwLock`. Multi-row mutations run through [`MemoryStore::transaction`],
//! which restores a pre-transaction snapshot on failure, giving all-or-nothing
//! semantics. The write lock also serializes concurrent writers, so ordering
//! invariants (one active status record per variant) hold under races.
//! Readers share the read lock and never block one another.
//!
//! Status history and outcome records are append-only: rows are never
//! deleted, preserving the full audit trail.

use crate::error::{ArbiterError, Result};
use crate::types::{
    AbTest, Endpoint, ModelVariant, OutcomeId, OutcomeRecord, StatusRecord, StatusRecordId,
    StatusTag, TestId, VariantId,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Filter over outcome records, in the spirit of a relational `WHERE` clause.
///
/// Time bounds are strict on both sides: `after < created_at < before`.
#[derive(Debug, Clone, Default)]
pub struct OutcomeFilter {
    /// Restrict to one variant.
    pub variant: Option<VariantId>,
    /// Strict lower bound on creation time.
    pub after: Option<DateTime<Utc>>,
    /// Strict upper bound on creation time.
    pub before: Option<DateTime<Utc>>,
    /// Only records whose response label equals the feedback label.
    pub correct_only: bool,
}

impl OutcomeFilter {
    /// Create an empty filter matching every record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to one variant.
    pub fn for_variant(mut self, variant: VariantId) -> Self {
        self.variant = Some(variant);
        self
    }

    /// Strict lower bound on creation time.
    pub fn after(mut self, instant: DateTime<Utc>) -> Self {
        self.after = Some(instant);
        self
    }

    /// Strict upper bound on creation time.
    pub fn before(mut self, instant: DateTime<Utc>) -> Self {
        self.before = Some(instant);
        self
    }

    /// Only records where the response label equals the feedback label.
    pub fn correct_only(mut self) -> Self {
        self.correct_only = true;
        self
    }

    /// Check whether a record matches this filter.
    pub fn matches(&self, record: &OutcomeRecord) -> bool {
        if let Some(variant) = self.variant {
            if record.variant != variant {
                return false;
            }
        }
        if let Some(after) = self.after {
            if record.created_at <= after {
                return false;
            }
        }
        if let Some(before) = self.before {
            if record.created_at >= before {
                return false;
            }
        }
        if self.correct_only && !record.is_correct() {
            return false;
        }
        true
    }
}

/// The tables held by the store. Cloned to snapshot before a transaction.
#[derive(Debug, Clone, Default)]
struct Tables {
    endpoints: Vec<Endpoint>,
    variants: HashMap<VariantId, ModelVariant>,
    variant_order: Vec<VariantId>,
    statuses: Vec<StatusRecord>,
    next_status_id: StatusRecordId,
    outcomes: Vec<OutcomeRecord>,
    tests: HashMap<TestId, AbTest>,
    test_order: Vec<TestId>,
}

/// Mutable transaction view over the store's tables.
///
/// Obtained through [`MemoryStore::transaction`]; every mutation either
/// commits with the whole transaction or is rolled back with it.
pub struct Txn<'a> {
    tables: &'a mut Tables,
}

impl Txn<'_> {
    /// Create an endpoint row unless one with the same name exists.
    /// Returns `true` if a row was created.
    pub fn create_endpoint_if_absent(&mut self, name: &str) -> bool {
        if self.tables.endpoints.iter().any(|e| e.name == name) {
            return false;
        }
        self.tables.endpoints.push(Endpoint {
            name: name.to_string(),
            created_at: Utc::now(),
        });
        true
    }

    /// Look up a variant by its natural key within an endpoint.
    pub fn find_variant(&self, endpoint: &str, name: &str, version: &str) -> Option<VariantId> {
        self.tables
            .variants
            .values()
            .find(|v| v.endpoint == endpoint && v.name == name && v.version == version)
            .map(|v| v.id)
    }

    /// Insert a new variant row.
    pub fn insert_variant(&mut self, variant: ModelVariant) -> Result<()> {
        if self.tables.variants.contains_key(&variant.id) {
            return Err(ArbiterError::AlreadyExists(format!(
                "variant {}",
                variant.id
            )));
        }
        self.tables.variant_order.push(variant.id);
        self.tables.variants.insert(variant.id, variant);
        Ok(())
    }

    /// Insert a new active status record for a variant. The caller is
    /// responsible for deactivating older records in the same transaction.
    pub fn insert_status(
        &mut self,
        variant: VariantId,
        status: StatusTag,
        created_by: &str,
    ) -> Result<StatusRecord> {
        if !self.tables.variants.contains_key(&variant) {
            return Err(ArbiterError::NotFound(format!("variant {}", variant)));
        }
        let record = StatusRecord {
            id: self.tables.next_status_id,
            variant,
            status,
            created_by: created_by.to_string(),
            created_at: Utc::now(),
            active: true,
        };
        self.tables.next_status_id += 1;
        self.tables.statuses.push(record.clone());
        Ok(record)
    }

    /// Bulk-deactivate every active status record of `variant` created
    /// strictly before `before`. Returns the number of flipped rows.
    pub fn deactivate_statuses_before(
        &mut self,
        variant: VariantId,
        before: StatusRecordId,
    ) -> usize {
        let mut flipped = 0;
        for record in &mut self.tables.statuses {
            if record.variant == variant && record.active && record.id < before {
                record.active = false;
                flipped += 1;
            }
        }
        flipped
    }

    /// Insert a new A/B test row.
    pub fn insert_test(&mut self, test: AbTest) -> Result<()> {
        if self.tables.tests.contains_key(&test.id) {
            return Err(ArbiterError::AlreadyExists(format!("A/B test {}", test.id)));
        }
        self.tables.test_order.push(test.id);
        self.tables.tests.insert(test.id, test);
        Ok(())
    }

    /// Stamp a running test with its end instant and summary.
    pub fn finalize_test(
        &mut self,
        id: TestId,
        ended_at: DateTime<Utc>,
        summary: &str,
    ) -> Result<()> {
        let test = self
            .tables
            .tests
            .get_mut(&id)
            .ok_or_else(|| ArbiterError::NotFound(format!("A/B test {}", id)))?;
        if test.ended_at.is_some() {
            return Err(ArbiterError::AlreadyExists(format!(
                "A/B test {} already finished",
                id
            )));
        }
        test.ended_at = Some(ended_at);
        test.summary = Some(summary.to_string());
        Ok(())
    }
}

/// In-memory datastore with snapshot-rollback transactions.
pub struct MemoryStore {
    inner: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Tables::default())),
        }
    }

    /// Run a multi-row mutation atomically.
    ///
    /// The closure runs under the single write lock. If it returns an error,
    /// the pre-transaction snapshot is restored and the failure surfaces as
    /// [`ArbiterError::TransactionFailure`]; no partial application is ever
    /// observable. Validation that should surface a typed client error must
    /// happen before entering the transaction.
    pub async fn transaction<T>(&self, f: impl FnOnce(&mut Txn<'_>) -> Result<T>) -> Result<T> {
        let mut inner = self.inner.write().await;
        let snapshot = (*inner).clone();
        match f(&mut Txn {
            tables: &mut *inner,
        }) {
            Ok(value) => Ok(value),
            Err(e) => {
                *inner = snapshot;
                Err(ArbiterError::TransactionFailure(e.to_string()))
            }
        }
    }

    // ---- endpoints ----

    /// Look up an endpoint by name.
    pub async fn endpoint(&self, name: &str) -> Result<Endpoint> {
        let inner = self.inner.read().await;
        inner
            .endpoints
            .iter()
            .find(|e| e.name == name)
            .cloned()
            .ok_or_else(|| ArbiterError::NotFound(format!("endpoint {}", name)))
    }

    /// List all endpoints in creation order.
    pub async fn list_endpoints(&self) -> Vec<Endpoint> {
        self.inner.read().await.endpoints.clone()
    }

    // ---- variants ----

    /// Look up a variant by id.
    pub async fn variant(&self, id: VariantId) -> Result<ModelVariant> {
        let inner = self.inner.read().await;
        inner
            .variants
            .get(&id)
            .cloned()
            .ok_or_else(|| ArbiterError::NotFound(format!("variant {}", id)))
    }

    /// List all variants in registration order.
    pub async fn list_variants(&self) -> Vec<ModelVariant> {
        let inner = self.inner.read().await;
        inner
            .variant_order
            .iter()
            .filter_map(|id| inner.variants.get(id).cloned())
            .collect()
    }

    /// List the variants of one endpoint in registration order.
    pub async fn variants_for_endpoint(&self, endpoint: &str) -> Vec<ModelVariant> {
        let inner = self.inner.read().await;
        inner
            .variant_order
            .iter()
            .filter_map(|id| inner.variants.get(id))
            .filter(|v| v.endpoint == endpoint)
            .cloned()
            .collect()
    }

    // ---- status records ----

    /// The currently-active status record of a variant, if any.
    pub async fn active_status(&self, variant: VariantId) -> Option<StatusRecord> {
        let inner = self.inner.read().await;
        inner
            .statuses
            .iter()
            .rev()
            .find(|s| s.variant == variant && s.active)
            .cloned()
    }

    /// Full status history of a variant in creation order.
    pub async fn statuses_for_variant(&self, variant: VariantId) -> Vec<StatusRecord> {
        let inner = self.inner.read().await;
        inner
            .statuses
            .iter()
            .filter(|s| s.variant == variant)
            .cloned()
            .collect()
    }

    /// All status records in creation order.
    pub async fn list_statuses(&self) -> Vec<StatusRecord> {
        self.inner.read().await.statuses.clone()
    }

    // ---- outcome records ----

    /// Append an outcome record. Single-row insertion; no transaction needed.
    pub async fn insert_outcome(&self, record: OutcomeRecord) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.variants.contains_key(&record.variant) {
            return Err(ArbiterError::NotFound(format!(
                "variant {}",
                record.variant
            )));
        }
        inner.outcomes.push(record);
        Ok(())
    }

    /// Look up an outcome record by id.
    pub async fn outcome(&self, id: OutcomeId) -> Result<OutcomeRecord> {
        let inner = self.inner.read().await;
        inner
            .outcomes
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| ArbiterError::NotFound(format!("outcome {}", id)))
    }

    /// Attach a feedback label to an outcome record. This is the record's
    /// sole mutation path.
    pub async fn set_feedback(&self, id: OutcomeId, feedback: &str) -> Result<OutcomeRecord> {
        let mut inner = self.inner.write().await;
        let record = inner
            .outcomes
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| ArbiterError::NotFound(format!("outcome {}", id)))?;
        record.feedback = Some(feedback.to_string());
        Ok(record.clone())
    }

    /// Records matching a filter, in creation order.
    pub async fn filter_outcomes(&self, filter: &OutcomeFilter) -> Vec<OutcomeRecord> {
        let inner = self.inner.read().await;
        inner
            .outcomes
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect()
    }

    /// Count of records matching a filter.
    pub async fn count_outcomes(&self, filter: &OutcomeFilter) -> u64 {
        let inner = self.inner.read().await;
        inner.outcomes.iter().filter(|r| filter.matches(r)).count() as u64
    }

    /// All outcome records in creation order.
    pub async fn list_outcomes(&self) -> Vec<OutcomeRecord> {
        self.inner.read().await.outcomes.clone()
    }

    // ---- A/B tests ----

    /// Look up an A/B test by id.
    pub async fn test(&self, id: TestId) -> Result<AbTest> {
        let inner = self.inner.read().await;
        inner
            .tests
            .get(&id)
            .cloned()
            .ok_or_else(|| ArbiterError::NotFound(format!("A/B test {}", id)))
    }

    /// List all A/B tests in creation order.
    pub async fn list_tests(&self) -> Vec<AbTest> {
        let inner = self.inner.read().await;
        inner
            .test_order
            .iter()
            .filter_map(|id| inner.tests.get(id).cloned())
            .collect()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}
