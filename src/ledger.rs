//! Status ledger: per-variant status history with a single active record.
//!
//! Every status change appends a new [`StatusRecord`] and, in the same
//! transaction, deactivates all older active records of the same variant.
//! History is never deleted, so the ledger doubles as the audit trail of a
//! variant's lifecycle.

use crate::error::{ArbiterError, Result};
use crate::store::{MemoryStore, Txn};
use crate::types::{StatusRecord, StatusTag, VariantId};
use std::sync::Arc;
use tracing::info;

/// Apply an active status change inside an existing transaction: insert the
/// new active record, then bulk-deactivate every active record created
/// strictly before it.
///
/// The A/B test coordinator reuses this inside its own larger transactions,
/// so a test start or stop flips statuses and writes its own rows in one
/// atomic step.
pub(crate) fn apply_active_status(
    txn: &mut Txn<'_>,
    variant: VariantId,
    status: StatusTag,
    created_by: &str,
) -> Result<StatusRecord> {
    let record = txn.insert_status(variant, status, created_by)?;
    txn.deactivate_statuses_before(variant, record.id);
    Ok(record)
}

/// Tracks the time-ordered status assignments of every model variant.
#[derive(Clone)]
pub struct StatusLedger {
    store: Arc<MemoryStore>,
}

impl StatusLedger {
    /// Create a ledger over a store.
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    /// Atomically make `status` the variant's active status.
    ///
    /// Creates a new active record and deactivates all prior active records
    /// for the same variant in one transaction; on failure nothing is
    /// applied, so no variant is ever left with two active records or an
    /// orphaned activation.
    pub async fn set_active_status(
        &self,
        variant: VariantId,
        status: StatusTag,
        created_by: &str,
    ) -> Result<StatusRecord> {
        // Fail fast with a typed error before any write.
        if self.store.variant(variant).await.is_err() {
            return Err(ArbiterError::NotFound(format!("variant {}", variant)));
        }

        let record = self
            .store
            .transaction(|txn| apply_active_status(txn, variant, status, created_by))
            .await?;

        crate::observability::record_status_change(status.as_str());
        info!(%variant, status = %status, created_by, "Variant status changed");
        Ok(record)
    }

    /// The variant's currently-active status record, if any.
    pub async fn active_status(&self, variant: VariantId) -> Option<StatusRecord> {
        self.store.active_status(variant).await
    }

    /// Full status history of a variant in creation order.
    pub async fn history(&self, variant: VariantId) -> Vec<StatusRecord> {
        self.store.statuses_for_variant(variant).await
    }
}
