//! # Reversal
//!
//! Undoes a committed sale with a forward, compensating transition.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  revert_sale(sale_id)                                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  read_last_log_entry(sale_id)                                          │
//! │       ├── none                 ──► RevertResult{SaleNotFound}          │
//! │       ├── kind = restoration   ──► RevertResult{AlreadyReverted}       │
//! │       └── deduction: previous → new                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  atomic_restore(expect new, restore previous)                          │
//! │       ├── AlreadyReverted      ──► RevertResult{AlreadyReverted}       │
//! │       ├── Conflict             ──► RevertResult{ConflictingState}      │
//! │       └── committed: sale.reverted_at set, restoration log appended    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! An item that moved since the sale (for example reserved by hand) is
//! never overwritten.

use chrono::Utc;
use tracing::{debug, info, warn};

use phonedesk_core::validation::{normalize_optional_text, validate_id, MAX_ID_LEN, MAX_NOTES_LEN};
use phonedesk_core::{InventoryStatus, LogKind};
use phonedesk_db::{DbError, RestoreRequest};

use crate::dto::RevertResult;
use crate::error::{EngineError, EngineResult, SaleFailure};
use crate::events::SaleEvent;
use crate::orchestrator::SaleEngine;
use crate::store::SaleStore;

impl<S: SaleStore> SaleEngine<S> {
    /// Reverts a sale, recording the configured default actor.
    pub async fn revert_sale(&self, sale_id: &str) -> EngineResult<RevertResult> {
        self.revert_sale_with(sale_id, None, None).await
    }

    /// Reverts a sale with an explicit actor and reason.
    pub async fn revert_sale_with(
        &self,
        sale_id: &str,
        actor: Option<&str>,
        note: Option<&str>,
    ) -> EngineResult<RevertResult> {
        let sale_id = sale_id.trim();
        validate_id("sale_id", sale_id)?;
        let actor = normalize_optional_text("actor", actor, MAX_ID_LEN)?
            .unwrap_or_else(|| self.policy().default_actor.clone());
        let note = normalize_optional_text("notes", note, MAX_NOTES_LEN)?;

        let Some(last) = self.store().read_last_log_entry(sale_id).await? else {
            debug!(sale_id = %sale_id, "Revert refused: no deduction recorded");
            return Ok(RevertResult::failed(
                sale_id,
                None,
                SaleFailure::SaleNotFound { sale_id: sale_id.to_string() },
            ));
        };

        if last.kind == LogKind::Restoration {
            debug!(sale_id = %sale_id, "Revert refused: already reverted");
            return Ok(RevertResult::failed(
                sale_id,
                Some(&last.item_id),
                SaleFailure::AlreadyReverted { sale_id: sale_id.to_string() },
            ));
        }

        let request = RestoreRequest {
            sale_id: sale_id.to_string(),
            item_id: last.item_id.clone(),
            expected_status: last.new_status,
            restore_to: last.previous_status,
            actor: Some(actor),
            note,
        };

        let restored = match self.store().atomic_restore(&request).await {
            Ok(restored) => restored,
            Err(DbError::AlreadyReverted { .. }) => {
                return Ok(RevertResult::failed(
                    sale_id,
                    Some(&last.item_id),
                    SaleFailure::AlreadyReverted { sale_id: sale_id.to_string() },
                ));
            }
            Err(DbError::Conflict { actual, .. }) => {
                warn!(
                    sale_id = %sale_id,
                    item_id = %last.item_id,
                    expected = %last.new_status,
                    actual = ?actual,
                    "Revert refused: item changed since the sale"
                );
                return Ok(RevertResult::failed(
                    sale_id,
                    Some(&last.item_id),
                    SaleFailure::ConflictingState {
                        item_id: last.item_id.clone(),
                        expected: last.new_status,
                        actual,
                    },
                ));
            }
            Err(DbError::NotFound { .. }) => {
                warn!(sale_id = %sale_id, item_id = %last.item_id, "Revert refused: item no longer exists");
                return Ok(RevertResult::failed(
                    sale_id,
                    Some(&last.item_id),
                    SaleFailure::ConflictingState {
                        item_id: last.item_id.clone(),
                        expected: last.new_status,
                        actual: None,
                    },
                ));
            }
            Err(e) => {
                warn!(sale_id = %sale_id, error = %e, "Revert transaction aborted");
                return Err(EngineError::PersistenceFailure(e));
            }
        };

        info!(
            sale_id = %sale_id,
            item_id = %restored.item_id,
            from = %restored.log_entry.previous_status,
            to = %restored.log_entry.new_status,
            "Sale reverted"
        );

        let warning = self.other_live_sales_warning(&restored.item_id, restored.log_entry.new_status).await;

        self.events().publish(SaleEvent::Reverted {
            sale_id: sale_id.to_string(),
            item_id: restored.item_id.clone(),
            restored_status: restored.log_entry.new_status,
            occurred_at: Utc::now(),
        });

        Ok(RevertResult {
            success: true,
            sale_id: sale_id.to_string(),
            item_id: Some(restored.item_id),
            previous_status: Some(restored.log_entry.previous_status),
            new_status: Some(restored.log_entry.new_status),
            inventory_restored: true,
            warning,
            error: None,
        })
    }

    /// Reports live sales left behind when an oversold item is no longer SOLD.
    ///
    /// The revert is already committed, so a failed lookup is only logged.
    async fn other_live_sales_warning(&self, item_id: &str, restored_to: InventoryStatus) -> Option<String> {
        if restored_to == InventoryStatus::Sold {
            return None;
        }

        match self.store().count_live_sales(item_id).await {
            Ok(0) => None,
            Ok(live) => {
                warn!(
                    item_id = %item_id,
                    status = %restored_to,
                    live_sales = live,
                    "Reverted item still has live sales"
                );
                Some(format!(
                    "Item {item_id} is now {restored_to} but {live} other sale(s) of it are still recorded"
                ))
            }
            Err(e) => {
                warn!(item_id = %item_id, error = %e, "Could not count live sales after revert");
                None
            }
        }
    }
}
