//! # Sale Transaction Orchestrator
//!
//! Drives the per-item state machine for single and batch sales.
//!
//! ## Sale Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  CompleteSaleRequest                                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  1. Validate + normalize (ids, price, buyer, notes)   ──► Err(Validation)
//! │  2. PaymentPlan::build(lines, price)        ──► Err(InvalidPaymentAllocation)
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  3. read_item_status                                                   │
//! │       ├── missing                      ──► SaleResult{ItemNotFound}    │
//! │       ├── not AVAILABLE, no oversell   ──► SaleResult{ItemNotAvailable}│
//! │       └── otherwise: expected = observed status                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  4. atomic_transition(expected → SOLD, sale, payments, log)            │
//! │       ├── Conflict (lost race)         ──► SaleResult{ItemNotAvailable}│
//! │       ├── other store error            ──► Err(PersistenceFailure)     │
//! │       └── committed                                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  5. publish SaleEvent::Completed                                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The read in step 3 only decides what to report. The write in step 4
//! is conditional on the status observed there, so two callers racing
//! for the same item cannot both win.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use phonedesk_core::availability::unavailable_message;
use phonedesk_core::validation::{
    normalize_buyer, normalize_optional_text, validate_batch_items, validate_id, validate_price,
    MAX_ID_LEN, MAX_NOTES_LEN,
};
use phonedesk_core::{BuyerInfo, InventoryStatus, PaymentPlan, Sale};
use phonedesk_db::{
    BatchTransitionRequest, CommittedSale, Database, DbError, SaleUpdate, SaleWrite,
    TransitionRequest,
};

use crate::config::{EngineConfig, SalesSettings};
use crate::dto::{
    BatchSaleLine, BatchSaleRequest, BatchSaleResult, BatchWarning, CompleteSaleRequest,
    SaleCorrection, SaleResult,
};
use crate::error::{EngineError, EngineResult, SaleFailure};
use crate::events::{EventBus, SaleEvent};
use crate::store::SaleStore;

// =============================================================================
// Policy
// =============================================================================

/// Deployment-level sale policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalePolicy {
    /// Sell non-AVAILABLE items with a warning instead of refusing.
    pub allow_oversell: bool,
    pub default_actor: String,
    pub default_location_id: Option<String>,
}

impl Default for SalePolicy {
    fn default() -> Self {
        SalePolicy::from(&SalesSettings::default())
    }
}

impl From<&SalesSettings> for SalePolicy {
    fn from(settings: &SalesSettings) -> Self {
        SalePolicy {
            allow_oversell: settings.allow_oversell,
            default_actor: settings.default_actor.clone(),
            default_location_id: settings.default_location_id.clone(),
        }
    }
}

impl SalePolicy {
    pub fn with_oversell(mut self, allow: bool) -> Self {
        self.allow_oversell = allow;
        self
    }
}

// =============================================================================
// Engine
// =============================================================================

/// The sale engine.
///
/// Cheap to clone; clones share the store and the event channel.
///
/// ## Usage
/// ```rust,ignore
/// let engine = SaleEngine::new(db, SalePolicy::default());
/// let result = engine
///     .complete_sale(CompleteSaleRequest::new("ip15-0001", today, Money::from_units(999)))
///     .await?;
/// if !result.success {
///     // result.error says why
/// }
/// ```
#[derive(Debug)]
pub struct SaleEngine<S = Database> {
    store: Arc<S>,
    policy: SalePolicy,
    events: EventBus,
}

impl<S> Clone for SaleEngine<S> {
    fn clone(&self) -> Self {
        SaleEngine {
            store: Arc::clone(&self.store),
            policy: self.policy.clone(),
            events: self.events.clone(),
        }
    }
}

/// A batch line after validation, before the store is consulted.
struct PreparedLine {
    item_id: String,
    sale_price: phonedesk_core::Money,
    notes: Option<String>,
}

impl<S: SaleStore> SaleEngine<S> {
    pub fn new(store: S, policy: SalePolicy) -> Self {
        SaleEngine {
            store: Arc::new(store),
            policy,
            events: EventBus::new(256),
        }
    }

    /// Engine with policy and channel size taken from the config.
    pub fn from_config(store: S, config: &EngineConfig) -> Self {
        SaleEngine {
            store: Arc::new(store),
            policy: SalePolicy::from(&config.sales),
            events: EventBus::new(config.events.channel_capacity),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn policy(&self) -> &SalePolicy {
        &self.policy
    }

    /// Receives every sale and revert committed after this call.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SaleEvent> {
        self.events.subscribe()
    }

    pub(crate) fn events(&self) -> &EventBus {
        &self.events
    }

    // =========================================================================
    // Single Sale
    // =========================================================================

    /// Sells one item.
    ///
    /// ## Returns
    /// * `Ok(SaleResult { success: true, .. })` - sale, payments, SOLD status
    ///   and log entry committed together
    /// * `Ok(SaleResult { success: false, error, .. })` - item unknown or not
    ///   sellable; nothing was written
    /// * `Err(EngineError)` - invalid input, or the store aborted the unit
    pub async fn complete_sale(&self, request: CompleteSaleRequest) -> EngineResult<SaleResult> {
        let item_id = request.item_id.trim().to_string();
        validate_id("item_id", &item_id)?;
        validate_price(request.sale_price)?;
        let buyer = normalize_buyer(&request.buyer)?;
        let notes = normalize_optional_text("notes", request.notes.as_deref(), MAX_NOTES_LEN)?;
        let location_id = self.resolve_location(request.location_id.as_deref())?;
        let actor = self.resolve_actor(request.actor.as_deref())?;
        let payments = PaymentPlan::build(&request.payments, request.sale_price)?;

        debug!(item_id = %item_id, price = %request.sale_price, "Completing sale");

        let Some(observed) = self.store.read_item_status(&item_id).await? else {
            debug!(item_id = %item_id, "Sale refused: item not found");
            return Ok(SaleResult::failed(
                &item_id,
                None,
                SaleFailure::ItemNotFound { item_id: item_id.clone() },
            ));
        };

        let warning = match self.check_sellable(&item_id, &item_id, observed) {
            Ok(warning) => warning,
            Err(failure) => {
                debug!(item_id = %item_id, status = %observed, "Sale refused: item not available");
                return Ok(SaleResult::failed(&item_id, Some(observed), failure));
            }
        };

        let transition = TransitionRequest {
            sale: SaleWrite {
                sale_id: Uuid::new_v4().to_string(),
                item_id: item_id.clone(),
                expected_status: observed,
                sale_date: request.sale_date,
                sale_price: request.sale_price,
                buyer,
                notes,
                location_id,
            },
            payments,
            actor: Some(actor),
            note: warning.clone(),
        };

        let committed = match self.store.atomic_transition(&transition).await {
            Ok(committed) => committed,
            Err(DbError::Conflict { actual, .. }) => {
                info!(item_id = %item_id, expected = %observed, "Lost race for item");
                return Ok(SaleResult::failed(
                    &item_id,
                    actual,
                    SaleFailure::from_lost_race(&item_id, actual),
                ));
            }
            Err(DbError::NotFound { .. }) => {
                return Ok(SaleResult::failed(
                    &item_id,
                    None,
                    SaleFailure::ItemNotFound { item_id: item_id.clone() },
                ));
            }
            Err(e) => {
                warn!(item_id = %item_id, error = %e, "Sale transaction aborted");
                return Err(EngineError::PersistenceFailure(e));
            }
        };

        let CommittedSale { sale, log_entry, .. } = committed;

        info!(
            sale_id = %sale.id,
            item_id = %item_id,
            previous = %log_entry.previous_status,
            price = %sale.sale_price,
            "Sale completed"
        );

        self.events.publish(completed_event(&sale));

        Ok(SaleResult {
            success: true,
            sale_id: Some(sale.id.clone()),
            item_id,
            previous_status: Some(log_entry.previous_status),
            new_status: Some(log_entry.new_status),
            warning,
            inventory_deducted: true,
            error: None,
            sale: Some(sale),
        })
    }

    // =========================================================================
    // Batch Sale
    // =========================================================================

    /// Sells several items as one all-or-nothing unit.
    ///
    /// If any item is blocked, nothing is written; `failures` names the
    /// blockers and `warnings` names the items that would have sold.
    pub async fn complete_batch_sale(&self, request: BatchSaleRequest) -> EngineResult<BatchSaleResult> {
        validate_batch_items(request.items.iter().map(|item| item.item_id.as_str()))?;

        let batch_notes = normalize_optional_text("notes", request.notes.as_deref(), MAX_NOTES_LEN)?;
        let mut lines = Vec::with_capacity(request.items.len());
        for item in &request.items {
            validate_price(item.sale_price)?;
            let notes = normalize_optional_text("notes", item.notes.as_deref(), MAX_NOTES_LEN)?;
            lines.push(PreparedLine {
                item_id: item.item_id.trim().to_string(),
                sale_price: item.sale_price,
                notes: notes.or_else(|| batch_notes.clone()),
            });
        }

        let buyer = normalize_buyer(&request.buyer)?;
        let location_id = self.resolve_location(request.location_id.as_deref())?;
        let actor = self.resolve_actor(request.actor.as_deref())?;
        let payments = PaymentPlan::build(&request.payments, request.total_due())?;

        let total_items = lines.len();
        let ids: Vec<String> = lines.iter().map(|line| line.item_id.clone()).collect();

        debug!(items = total_items, total = %request.total_due(), "Completing batch sale");

        let found = self.store.read_items(&ids).await?;

        let mut failures = Vec::new();
        let mut warnings = Vec::new();
        let mut ready = Vec::with_capacity(total_items);

        for line in &lines {
            let Some(item) = found.iter().find(|item| item.id == line.item_id) else {
                failures.push(SaleFailure::ItemNotFound {
                    item_id: line.item_id.clone(),
                });
                continue;
            };

            match self.check_sellable(&item.id, &item.model, item.status) {
                Ok(warning) => {
                    if let Some(message) = warning {
                        warnings.push(BatchWarning {
                            item_id: item.id.clone(),
                            message,
                        });
                    }
                    ready.push((line, item.status, item.model.as_str()));
                }
                Err(failure) => failures.push(failure),
            }
        }

        if !failures.is_empty() {
            info!(
                items = total_items,
                blocked = failures.len(),
                "Batch sale aborted before any write"
            );
            warnings.extend(ready.iter().map(|(line, _, model)| would_have_sold(&line.item_id, model)));
            return Ok(batch_failed(total_items, warnings, failures));
        }

        let batch_id = Uuid::new_v4().to_string();
        let transition = BatchTransitionRequest {
            batch_id: batch_id.clone(),
            sales: ready
                .iter()
                .map(|(line, status, _)| SaleWrite {
                    sale_id: Uuid::new_v4().to_string(),
                    item_id: line.item_id.clone(),
                    expected_status: *status,
                    sale_date: request.sale_date,
                    sale_price: line.sale_price,
                    buyer: buyer.clone(),
                    notes: line.notes.clone(),
                    location_id: location_id.clone(),
                })
                .collect(),
            payments,
            actor: Some(actor),
            note: None,
        };

        let committed = match self.store.atomic_batch_transition(&transition).await {
            Ok(committed) => committed,
            Err(DbError::Conflict { item_id, actual, .. }) => {
                info!(batch_id = %batch_id, item_id = %item_id, "Batch lost race; rolled back");
                let warnings = ready
                    .iter()
                    .filter(|(line, _, _)| line.item_id != item_id)
                    .map(|(line, _, model)| would_have_sold(&line.item_id, model))
                    .collect();
                let failure = SaleFailure::from_lost_race(&item_id, actual);
                return Ok(batch_failed(total_items, warnings, vec![failure]));
            }
            Err(DbError::NotFound { id, .. }) => {
                let failure = SaleFailure::ItemNotFound { item_id: id };
                return Ok(batch_failed(total_items, Vec::new(), vec![failure]));
            }
            Err(e) => {
                warn!(batch_id = %batch_id, error = %e, "Batch transaction aborted");
                return Err(EngineError::PersistenceFailure(e));
            }
        };

        info!(
            batch_id = %batch_id,
            items = committed.sales.len(),
            oversold = warnings.len(),
            "Batch sale completed"
        );

        let sales: Vec<BatchSaleLine> = committed
            .sales
            .into_iter()
            .map(|committed| {
                self.events.publish(completed_event(&committed.sale));
                BatchSaleLine {
                    previous_status: committed.log_entry.previous_status,
                    sale: committed.sale,
                }
            })
            .collect();

        Ok(BatchSaleResult {
            success: true,
            batch_id: Some(batch_id),
            total_items,
            processed_items: sales.len(),
            sales,
            warnings,
            inventory_deducted: true,
            failures: Vec::new(),
        })
    }

    // =========================================================================
    // Catalog Status
    // =========================================================================

    /// Moves an item between AVAILABLE and RESERVED.
    ///
    /// SOLD is never a source or target here; only sales and reverts
    /// touch it. Returns the status the item had before.
    pub async fn set_manual_status(&self, item_id: &str, to: InventoryStatus) -> EngineResult<InventoryStatus> {
        let item_id = item_id.trim();
        validate_id("item_id", item_id)?;

        let from = self
            .store
            .read_item_status(item_id)
            .await?
            .ok_or_else(|| EngineError::not_found("InventoryItem", item_id))?;

        from.validate_manual_transition(to)?;
        self.store.set_item_status_if(item_id, from, to).await?;

        info!(item_id = %item_id, from = %from, to = %to, "Item status changed manually");
        Ok(from)
    }

    // =========================================================================
    // Corrections
    // =========================================================================

    /// Corrects date, price, buyer fields or notes of a live sale.
    ///
    /// Status, cost, tax snapshot and payments are never touched.
    pub async fn update_sale(&self, sale_id: &str, correction: SaleCorrection) -> EngineResult<Sale> {
        let sale_id = sale_id.trim();
        validate_id("sale_id", sale_id)?;
        if let Some(price) = correction.sale_price {
            validate_price(price)?;
        }

        let buyer = normalize_buyer(&BuyerInfo {
            name: correction.buyer_name,
            phone: correction.buyer_phone,
            email: correction.buyer_email,
        })?;
        let notes = normalize_optional_text("notes", correction.notes.as_deref(), MAX_NOTES_LEN)?;

        let update = SaleUpdate {
            sale_date: correction.sale_date,
            sale_price: correction.sale_price,
            buyer_name: buyer.name,
            buyer_phone: buyer.phone,
            buyer_email: buyer.email,
            notes,
        };

        let sale = self.store.update_sale_metadata(sale_id, &update).await?;
        info!(sale_id = %sale_id, "Sale metadata corrected");
        Ok(sale)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Whether an item in `status` may be sold under the current policy.
    ///
    /// `Ok(Some(_))` carries the oversell warning.
    fn check_sellable(
        &self,
        item_id: &str,
        label: &str,
        status: InventoryStatus,
    ) -> Result<Option<String>, SaleFailure> {
        if status.is_available() {
            return Ok(None);
        }

        if !self.policy.allow_oversell {
            return Err(SaleFailure::ItemNotAvailable {
                item_id: item_id.to_string(),
                current_status: status,
            });
        }

        warn!(item_id = %item_id, status = %status, "Overselling item");
        Ok(Some(unavailable_message(label, status, true)))
    }

    fn resolve_location(&self, requested: Option<&str>) -> EngineResult<Option<String>> {
        match requested.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => {
                validate_id("location_id", id)?;
                Ok(Some(id.to_string()))
            }
            None => Ok(self.policy.default_location_id.clone()),
        }
    }

    fn resolve_actor(&self, requested: Option<&str>) -> EngineResult<String> {
        Ok(normalize_optional_text("actor", requested, MAX_ID_LEN)?
            .unwrap_or_else(|| self.policy.default_actor.clone()))
    }
}

fn completed_event(sale: &Sale) -> SaleEvent {
    SaleEvent::Completed {
        sale_id: sale.id.clone(),
        item_id: sale.item_id.clone(),
        batch_id: sale.batch_id.clone(),
        sale_price: sale.sale_price,
        buyer_phone: sale.buyer_phone.clone(),
        location_id: sale.location_id.clone(),
        occurred_at: Utc::now(),
    }
}

fn would_have_sold(item_id: &str, model: &str) -> BatchWarning {
    BatchWarning {
        item_id: item_id.to_string(),
        message: format!("{model} is sellable but was not sold because the batch was aborted"),
    }
}

fn batch_failed(total_items: usize, warnings: Vec<BatchWarning>, failures: Vec<SaleFailure>) -> BatchSaleResult {
    BatchSaleResult {
        success: false,
        batch_id: None,
        total_items,
        processed_items: 0,
        sales: Vec::new(),
        warnings,
        inventory_deducted: false,
        failures,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::BatchItem;
    use chrono::NaiveDate;
    use phonedesk_core::{Money, PaymentLine, PaymentMethod, TaxRate};
    use phonedesk_db::{DbConfig, NewInventoryItem};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    async fn setup(allow_oversell: bool) -> SaleEngine {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let inventory = db.inventory();
        inventory.upsert_brand("apple", "Apple").await.unwrap();

        let mut iphone = NewInventoryItem::new("ip-1", "iPhone 15", Money::from_units(600), Money::from_units(800));
        iphone.brand_id = Some("apple".to_string());
        iphone.tax_rate = TaxRate::from_bps(1500);
        inventory.insert(&iphone).await.unwrap();
        inventory
            .insert(&NewInventoryItem::new("ip-2", "iPhone 14", Money::from_units(400), Money::from_units(550)))
            .await
            .unwrap();
        inventory
            .insert(&NewInventoryItem::new("case-1", "Clear Case", Money::from_units(5), Money::from_units(20)))
            .await
            .unwrap();

        SaleEngine::new(db, SalePolicy::default().with_oversell(allow_oversell))
    }

    #[tokio::test]
    async fn test_complete_sale() {
        let engine = setup(false).await;
        let mut events = engine.subscribe();

        let request = CompleteSaleRequest::new(" ip-1 ", today(), Money::from_units(800))
            .with_buyer(BuyerInfo {
                name: Some("  Ana Ruiz ".to_string()),
                phone: Some("(555) 010-1010".to_string()),
                email: None,
            })
            .with_payments(vec![
                PaymentLine::cash(Money::from_units(500), Money::from_units(520)),
                PaymentLine::card(Money::from_units(300), "4242"),
            ])
            .with_location("main");

        let result = engine.complete_sale(request).await.unwrap();

        assert!(result.success);
        assert!(result.inventory_deducted);
        assert_eq!(result.item_id, "ip-1");
        assert_eq!(result.previous_status, Some(InventoryStatus::Available));
        assert_eq!(result.new_status, Some(InventoryStatus::Sold));
        assert!(result.warning.is_none());

        let sale = result.sale.unwrap();
        assert_eq!(sale.buyer_name.as_deref(), Some("Ana Ruiz"));
        assert_eq!(sale.cost_price, Money::from_units(600));
        assert_eq!(sale.tax_amount, Money::from_units(120));
        assert!(sale.is_split_payment);
        assert_eq!(sale.primary_payment_method, Some(PaymentMethod::Cash));
        assert_eq!(sale.payment_summary[0].change_given, Some(Money::from_units(20)));

        let status = engine.store().inventory().read_status("ip-1").await.unwrap();
        assert_eq!(status, Some(InventoryStatus::Sold));

        let log = engine.store().deduction_logs().for_sale(&sale.id).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].actor.as_deref(), Some("system"));

        let event = events.recv().await.unwrap();
        assert_eq!(event.sale_id(), sale.id);
    }

    #[tokio::test]
    async fn test_unknown_item_is_a_failed_result() {
        let engine = setup(false).await;

        let result = engine
            .complete_sale(CompleteSaleRequest::new("nope", today(), Money::from_units(10)))
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.error, Some(SaleFailure::ItemNotFound { item_id: "nope".to_string() }));
        assert_eq!(engine.store().deduction_logs().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reserved_item_refused_without_oversell() {
        let engine = setup(false).await;
        engine.set_manual_status("ip-1", InventoryStatus::Reserved).await.unwrap();

        let result = engine
            .complete_sale(CompleteSaleRequest::new("ip-1", today(), Money::from_units(800)))
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.error.as_ref().map(SaleFailure::code), Some(crate::ErrorCode::ItemNotAvailable));
        assert_eq!(result.previous_status, Some(InventoryStatus::Reserved));
        assert_eq!(engine.store().sales().list(&Default::default()).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_oversell_sells_with_warning() {
        let engine = setup(true).await;
        engine.set_manual_status("ip-1", InventoryStatus::Reserved).await.unwrap();

        let result = engine
            .complete_sale(CompleteSaleRequest::new("ip-1", today(), Money::from_units(800)))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.previous_status, Some(InventoryStatus::Reserved));
        assert!(result.warning.unwrap().contains("oversell"));
    }

    #[tokio::test]
    async fn test_payment_mismatch_is_rejected_before_any_write() {
        let engine = setup(false).await;

        let err = engine
            .complete_sale(
                CompleteSaleRequest::new("ip-1", today(), Money::from_units(800))
                    .with_payments(vec![PaymentLine::new(PaymentMethod::Cash, Money::from_units(500))]),
            )
            .await
            .unwrap_err();

        assert_eq!(err.code(), crate::ErrorCode::InvalidPaymentAllocation);
        assert!(!err.is_retryable());
        let status = engine.store().inventory().read_status("ip-1").await.unwrap();
        assert_eq!(status, Some(InventoryStatus::Available));
    }

    #[tokio::test]
    async fn test_invalid_input_is_validation_error() {
        let engine = setup(false).await;

        let err = engine
            .complete_sale(CompleteSaleRequest::new("   ", today(), Money::from_units(1)))
            .await
            .unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::ValidationError);

        let err = engine
            .complete_sale(CompleteSaleRequest::new("ip-1", today(), Money::from_units(-1)))
            .await
            .unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_amounts_above_cap_never_reach_the_store() {
        let engine = setup(false).await;
        let huge = Money::from_f64(9.0e14).unwrap();

        let err = engine
            .complete_sale(CompleteSaleRequest::new("ip-1", today(), huge))
            .await
            .unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::ValidationError);

        let err = engine
            .complete_sale(
                CompleteSaleRequest::new("ip-1", today(), Money::from_units(800)).with_payments(vec![
                    PaymentLine::new(PaymentMethod::Cash, huge),
                    PaymentLine::new(PaymentMethod::Card, huge),
                ]),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::InvalidPaymentAllocation);

        let status = engine.store().inventory().read_status("ip-1").await.unwrap();
        assert_eq!(status, Some(InventoryStatus::Available));
    }

    #[tokio::test]
    async fn test_engine_is_debug() {
        let engine = setup(false).await;
        let rendered = format!("{:?}", engine);
        assert!(rendered.starts_with("SaleEngine"));
        assert!(rendered.contains("allow_oversell: false"));
    }

    #[tokio::test]
    async fn test_batch_sale_shares_batch_id() {
        let engine = setup(false).await;

        let request = BatchSaleRequest::new(
            vec![
                BatchItem::new("ip-2", Money::from_units(550)),
                BatchItem::new("case-1", Money::from_units(20)),
            ],
            today(),
        )
        .with_payments(vec![PaymentLine::new(PaymentMethod::Transfer, Money::from_units(570))]);

        let result = engine.complete_batch_sale(request).await.unwrap();

        assert!(result.success);
        assert_eq!(result.total_items, 2);
        assert_eq!(result.processed_items, 2);
        let batch_id = result.batch_id.clone().unwrap();
        assert!(result.sales.iter().all(|line| line.sale.batch_id.as_deref() == Some(batch_id.as_str())));

        let payments = engine.store().payments().for_batch(&batch_id).await.unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].amount, Money::from_units(570));
    }

    #[tokio::test]
    async fn test_batch_aborts_when_one_item_blocked() {
        let engine = setup(false).await;
        engine.set_manual_status("case-1", InventoryStatus::Reserved).await.unwrap();

        let request = BatchSaleRequest::new(
            vec![
                BatchItem::new("ip-2", Money::from_units(550)),
                BatchItem::new("case-1", Money::from_units(20)),
                BatchItem::new("ghost", Money::from_units(1)),
            ],
            today(),
        );

        let result = engine.complete_batch_sale(request).await.unwrap();

        assert!(!result.success);
        assert!(!result.inventory_deducted);
        assert_eq!(result.processed_items, 0);
        assert_eq!(result.failures.len(), 2);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].item_id, "ip-2");

        let status = engine.store().inventory().read_status("ip-2").await.unwrap();
        assert_eq!(status, Some(InventoryStatus::Available));
    }

    #[tokio::test]
    async fn test_batch_rejects_duplicates() {
        let engine = setup(false).await;

        let request = BatchSaleRequest::new(
            vec![
                BatchItem::new("ip-2", Money::from_units(550)),
                BatchItem::new("ip-2", Money::from_units(550)),
            ],
            today(),
        );

        let err = engine.complete_batch_sale(request).await.unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_batch_oversell_reports_warning_on_success() {
        let engine = setup(true).await;
        engine.set_manual_status("case-1", InventoryStatus::Reserved).await.unwrap();

        let request = BatchSaleRequest::new(
            vec![
                BatchItem::new("ip-2", Money::from_units(550)),
                BatchItem::new("case-1", Money::from_units(20)),
            ],
            today(),
        );

        let result = engine.complete_batch_sale(request).await.unwrap();
        assert!(result.success);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].item_id, "case-1");
        assert!(result.warnings[0].message.contains("Clear Case"));
    }

    #[tokio::test]
    async fn test_manual_status_never_touches_sold() {
        let engine = setup(false).await;

        let err = engine.set_manual_status("ip-1", InventoryStatus::Sold).await.unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::InvalidStatusTransition);

        engine
            .complete_sale(CompleteSaleRequest::new("ip-1", today(), Money::from_units(800)))
            .await
            .unwrap();
        let err = engine.set_manual_status("ip-1", InventoryStatus::Available).await.unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::InvalidStatusTransition);

        let err = engine.set_manual_status("ghost", InventoryStatus::Reserved).await.unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_update_sale_corrects_metadata_only() {
        let engine = setup(false).await;
        let result = engine
            .complete_sale(CompleteSaleRequest::new("ip-1", today(), Money::from_units(800)))
            .await
            .unwrap();
        let sale_id = result.sale_id.unwrap();

        let corrected = engine
            .update_sale(
                &sale_id,
                SaleCorrection {
                    sale_price: Some(Money::from_units(780)),
                    buyer_phone: Some(" 555 0199 ".to_string()),
                    notes: Some("price matched".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(corrected.sale_price, Money::from_units(780));
        assert_eq!(corrected.buyer_phone.as_deref(), Some("555 0199"));
        assert_eq!(corrected.cost_price, Money::from_units(600));
        assert_eq!(corrected.tax_amount, Money::from_units(120));

        let err = engine.update_sale("missing", SaleCorrection::default()).await.unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::NotFound);
    }
}
