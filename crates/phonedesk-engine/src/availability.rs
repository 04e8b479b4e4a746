//! # Availability Checker
//!
//! Pre-flight for the sale screen: reports, without writing anything,
//! whether each requested item could be sold right now.
//!
//! The verdict is advisory. The status can change before the sale is
//! submitted; only the conditional write in the orchestrator decides.

use tracing::debug;

use phonedesk_core::availability::{evaluate, AvailabilityReport};
use phonedesk_core::validation::validate_batch_items;

use crate::error::EngineResult;
use crate::orchestrator::SaleEngine;
use crate::store::SaleStore;

impl<S: SaleStore> SaleEngine<S> {
    /// Per-item verdicts plus `allAvailable` / `hasWarnings`.
    ///
    /// Unknown ids get a per-item error; the others are still evaluated.
    pub async fn check_availability(&self, item_ids: &[String]) -> EngineResult<AvailabilityReport> {
        validate_batch_items(item_ids.iter().map(String::as_str))?;

        let ids: Vec<String> = item_ids.iter().map(|id| id.trim().to_string()).collect();
        let found = self.store().read_items(&ids).await?;

        let report = evaluate(&ids, &found, self.policy().allow_oversell);
        debug!(
            requested = ids.len(),
            all_available = report.all_available,
            warnings = report.warnings.len(),
            "Availability checked"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use phonedesk_core::{InventoryStatus, Money};
    use phonedesk_db::{Database, DbConfig, NewInventoryItem};

    use crate::error::ErrorCode;
    use crate::orchestrator::{SaleEngine, SalePolicy};

    async fn setup(allow_oversell: bool) -> SaleEngine {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        for id in ["a", "b"] {
            db.inventory()
                .insert(&NewInventoryItem::new(id, "Moto G", Money::from_units(90), Money::from_units(150)))
                .await
                .unwrap();
        }
        db.inventory()
            .set_status_if("b", InventoryStatus::Available, InventoryStatus::Reserved)
            .await
            .unwrap();
        SaleEngine::new(db, SalePolicy::default().with_oversell(allow_oversell))
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_reports_each_item() {
        let engine = setup(false).await;

        let report = engine.check_availability(&ids(&["a", "b", "zz"])).await.unwrap();

        assert!(!report.all_available);
        assert!(report.has_warnings);
        assert!(!report.allow_oversell);
        assert!(report.items[0].available);
        assert_eq!(report.items[1].status, Some(InventoryStatus::Reserved));
        assert!(report.items[2].error.is_some());
        assert_eq!(report.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_oversell_flag_is_reported_not_applied() {
        let engine = setup(true).await;

        let report = engine.check_availability(&ids(&["b"])).await.unwrap();
        assert!(report.allow_oversell);
        assert!(!report.items[0].available);
        assert!(report.warnings[0].message.contains("oversell is allowed"));
    }

    #[tokio::test]
    async fn test_empty_request_is_rejected() {
        let engine = setup(false).await;
        let err = engine.check_availability(&[]).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }
}
