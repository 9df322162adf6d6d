//! Reconciliation counters and the persisted per-entity breakdown.

use serde::{Deserialize, Serialize};

/// Outcome counts of one reconciliation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReconcileStats {
    /// Records that did not exist locally and were inserted.
    pub created: u32,
    /// Records that already existed and were overwritten.
    pub updated: u32,
    /// Records that failed individually and were skipped.
    pub errors: u32,
}

impl ReconcileStats {
    /// Records successfully written (created + updated).
    #[must_use]
    pub const fn processed(&self) -> u32 {
        self.created + self.updated
    }

    /// Total records seen, including failures.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.created + self.updated + self.errors
    }
}

impl std::ops::AddAssign for ReconcileStats {
    fn add_assign(&mut self, rhs: Self) {
        self.created += rhs.created;
        self.updated += rhs.updated;
        self.errors += rhs.errors;
    }
}

/// Per-entity results of a full sync.
///
/// This is the JSON document stored in a sync job's metadata column; its
/// shape (`customers`/`products`/`orders`, each `{created, updated, errors}`)
/// is read by external reporting tools and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncBreakdown {
    pub customers: ReconcileStats,
    pub products: ReconcileStats,
    pub orders: ReconcileStats,
}

impl SyncBreakdown {
    /// Records written across all entity types.
    #[must_use]
    pub const fn processed(&self) -> u32 {
        self.customers.processed() + self.products.processed() + self.orders.processed()
    }

    /// Per-record failures across all entity types.
    #[must_use]
    pub const fn errors(&self) -> u32 {
        self.customers.errors + self.products.errors + self.orders.errors
    }

    /// Serialize to the persisted metadata string.
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` if serialization fails.
    pub fn to_metadata(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
