//! # Sale Store
//!
//! The narrow interface the orchestrator and compensator drive. Every
//! mutating method is one atomic unit: it either commits in full or
//! leaves the store untouched.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   SaleEngine ──► dyn SaleStore                                          │
//! │                     │                                                   │
//! │                     ├── Database (SQLite, production)                  │
//! │                     └── test doubles (fault injection)                 │
//! │                                                                         │
//! │   read_item_status        → Option<status>                             │
//! │   atomic_transition       → CommittedSale | Conflict | failure         │
//! │   atomic_batch_transition → CommittedBatch | Conflict | failure        │
//! │   read_last_log_entry     → Option<DeductionLogEntry>                  │
//! │   atomic_restore          → RestoredItem | Conflict | AlreadyReverted  │
//! │   count_live_sales        → non-reverted sales of an item              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;

use phonedesk_core::{DeductionLogEntry, InventoryItem, InventoryStatus, Sale};
use phonedesk_db::{
    BatchTransitionRequest, CommittedBatch, CommittedSale, Database, DbResult, RestoreRequest,
    RestoredItem, SaleUpdate, TransitionRequest,
};

/// Backing store for sale transitions.
///
/// Implementations must apply the conditional status write and every
/// row that goes with it in one transaction.
#[async_trait]
pub trait SaleStore: Send + Sync {
    /// Current status, or `None` for an unknown item.
    async fn read_item_status(&self, item_id: &str) -> DbResult<Option<InventoryStatus>>;

    /// The requested items that exist, in no particular order.
    async fn read_items(&self, item_ids: &[String]) -> DbResult<Vec<InventoryItem>>;

    /// Flips one item to SOLD if it still has `expected_status`, writing
    /// the sale, its allocations and one deduction log entry.
    ///
    /// ## Returns
    /// * `Err(DbError::Conflict)` - the item moved since it was read
    /// * `Err(DbError::NotFound)` - the item no longer exists
    async fn atomic_transition(&self, request: &TransitionRequest) -> DbResult<CommittedSale>;

    /// [`atomic_transition`](Self::atomic_transition) for several items,
    /// all or nothing.
    async fn atomic_batch_transition(&self, request: &BatchTransitionRequest) -> DbResult<CommittedBatch>;

    /// Most recent deduction log entry for a sale.
    async fn read_last_log_entry(&self, sale_id: &str) -> DbResult<Option<DeductionLogEntry>>;

    /// Marks the sale reverted and moves the item back, appending a
    /// restoration log entry.
    async fn atomic_restore(&self, request: &RestoreRequest) -> DbResult<RestoredItem>;

    /// Non-reverted sales that still reference the item.
    async fn count_live_sales(&self, item_id: &str) -> DbResult<i64>;

    /// Conditional status change outside a sale.
    async fn set_item_status_if(
        &self,
        item_id: &str,
        expected: InventoryStatus,
        to: InventoryStatus,
    ) -> DbResult<()>;

    /// Corrects metadata on a live sale.
    async fn update_sale_metadata(&self, sale_id: &str, update: &SaleUpdate) -> DbResult<Sale>;
}

#[async_trait]
impl SaleStore for Database {
    async fn read_item_status(&self, item_id: &str) -> DbResult<Option<InventoryStatus>> {
        self.inventory().read_status(item_id).await
    }

    async fn read_items(&self, item_ids: &[String]) -> DbResult<Vec<InventoryItem>> {
        self.inventory().get_many(item_ids).await
    }

    async fn atomic_transition(&self, request: &TransitionRequest) -> DbResult<CommittedSale> {
        self.transitions().sell(request).await
    }

    async fn atomic_batch_transition(&self, request: &BatchTransitionRequest) -> DbResult<CommittedBatch> {
        self.transitions().sell_batch(request).await
    }

    async fn read_last_log_entry(&self, sale_id: &str) -> DbResult<Option<DeductionLogEntry>> {
        self.deduction_logs().last_for_sale(sale_id).await
    }

    async fn atomic_restore(&self, request: &RestoreRequest) -> DbResult<RestoredItem> {
        self.transitions().restore(request).await
    }

    async fn count_live_sales(&self, item_id: &str) -> DbResult<i64> {
        self.sales().count_live_for_item(item_id).await
    }

    async fn set_item_status_if(
        &self,
        item_id: &str,
        expected: InventoryStatus,
        to: InventoryStatus,
    ) -> DbResult<()> {
        self.inventory().set_status_if(item_id, expected, to).await
    }

    async fn update_sale_metadata(&self, sale_id: &str, update: &SaleUpdate) -> DbResult<Sale> {
        self.sales().update_metadata(sale_id, update).await
    }
}
