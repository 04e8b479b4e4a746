//! # Request and Result DTOs
//!
//! JSON-serializable shapes exchanged with HTTP controllers and batch
//! runners. Requests deserialize from camelCase; results serialize to it.
//!
//! ```text
//! CompleteSaleRequest ──► SaleEngine::complete_sale ──► SaleResult
//! BatchSaleRequest    ──► complete_batch_sale        ──► BatchSaleResult
//! sale_id             ──► revert_sale                ──► RevertResult
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use phonedesk_core::{BuyerInfo, InventoryStatus, Money, PaymentLine, Sale};

use crate::error::SaleFailure;

// =============================================================================
// Requests
// =============================================================================

/// Sell one item.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteSaleRequest {
    pub item_id: String,
    pub sale_date: NaiveDate,
    pub sale_price: Money,
    #[serde(default)]
    pub buyer: BuyerInfo,
    #[serde(default)]
    pub notes: Option<String>,
    /// Empty means no allocation rows are written.
    #[serde(default)]
    pub payments: Vec<PaymentLine>,
    /// Falls back to the configured default location.
    #[serde(default)]
    pub location_id: Option<String>,
    /// Falls back to the configured default actor.
    #[serde(default)]
    pub actor: Option<String>,
}

impl CompleteSaleRequest {
    pub fn new(item_id: impl Into<String>, sale_date: NaiveDate, sale_price: Money) -> Self {
        CompleteSaleRequest {
            item_id: item_id.into(),
            sale_date,
            sale_price,
            buyer: BuyerInfo::default(),
            notes: None,
            payments: Vec::new(),
            location_id: None,
            actor: None,
        }
    }

    pub fn with_buyer(mut self, buyer: BuyerInfo) -> Self {
        self.buyer = buyer;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_payments(mut self, payments: Vec<PaymentLine>) -> Self {
        self.payments = payments;
        self
    }

    pub fn with_location(mut self, location_id: impl Into<String>) -> Self {
        self.location_id = Some(location_id.into());
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }
}

/// One line of a batch sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
    pub item_id: String,
    pub sale_price: Money,
    #[serde(default)]
    pub notes: Option<String>,
}

impl BatchItem {
    pub fn new(item_id: impl Into<String>, sale_price: Money) -> Self {
        BatchItem {
            item_id: item_id.into(),
            sale_price,
            notes: None,
        }
    }
}

/// Sell several items as one all-or-nothing unit.
///
/// `payments` cover the sum of all item prices, not each item.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSaleRequest {
    pub items: Vec<BatchItem>,
    pub sale_date: NaiveDate,
    #[serde(default)]
    pub buyer: BuyerInfo,
    /// Stored on every sale of the batch unless the item carries its own.
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub payments: Vec<PaymentLine>,
    #[serde(default)]
    pub location_id: Option<String>,
    #[serde(default)]
    pub actor: Option<String>,
}

impl BatchSaleRequest {
    pub fn new(items: Vec<BatchItem>, sale_date: NaiveDate) -> Self {
        BatchSaleRequest {
            items,
            sale_date,
            buyer: BuyerInfo::default(),
            notes: None,
            payments: Vec::new(),
            location_id: None,
            actor: None,
        }
    }

    pub fn with_buyer(mut self, buyer: BuyerInfo) -> Self {
        self.buyer = buyer;
        self
    }

    pub fn with_payments(mut self, payments: Vec<PaymentLine>) -> Self {
        self.payments = payments;
        self
    }

    pub fn with_location(mut self, location_id: impl Into<String>) -> Self {
        self.location_id = Some(location_id.into());
        self
    }

    /// Sum of the item prices, the amount the batch payments must cover.
    pub fn total_due(&self) -> Money {
        self.items.iter().map(|item| item.sale_price).sum()
    }
}

/// Corrections to a recorded sale. Absent fields stay unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleCorrection {
    #[serde(default)]
    pub sale_date: Option<NaiveDate>,
    #[serde(default)]
    pub sale_price: Option<Money>,
    #[serde(default)]
    pub buyer_name: Option<String>,
    #[serde(default)]
    pub buyer_phone: Option<String>,
    #[serde(default)]
    pub buyer_email: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

// =============================================================================
// Results
// =============================================================================

/// Outcome of [`complete_sale`](crate::SaleEngine::complete_sale).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleResult {
    pub success: bool,
    pub sale_id: Option<String>,
    pub item_id: String,
    /// Status observed before the sale; `None` when the item is unknown.
    pub previous_status: Option<InventoryStatus>,
    pub new_status: Option<InventoryStatus>,
    /// Set when the item was sold under the oversell policy.
    pub warning: Option<String>,
    pub inventory_deducted: bool,
    pub error: Option<SaleFailure>,
    pub sale: Option<Sale>,
}

impl SaleResult {
    pub(crate) fn failed(item_id: &str, previous_status: Option<InventoryStatus>, failure: SaleFailure) -> Self {
        SaleResult {
            success: false,
            sale_id: None,
            item_id: item_id.to_string(),
            previous_status,
            new_status: previous_status,
            warning: None,
            inventory_deducted: false,
            error: Some(failure),
            sale: None,
        }
    }
}

/// One committed sale inside a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSaleLine {
    #[serde(flatten)]
    pub sale: Sale,
    pub previous_status: InventoryStatus,
}

/// A per-item notice attached to a batch result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchWarning {
    pub item_id: String,
    pub message: String,
}

/// Outcome of [`complete_batch_sale`](crate::SaleEngine::complete_batch_sale).
///
/// On failure `sales` is empty, `failures` names the blocking items and
/// `warnings` names the items that would have sold.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSaleResult {
    pub success: bool,
    pub batch_id: Option<String>,
    pub total_items: usize,
    pub processed_items: usize,
    pub sales: Vec<BatchSaleLine>,
    pub warnings: Vec<BatchWarning>,
    pub inventory_deducted: bool,
    pub failures: Vec<SaleFailure>,
}

/// Outcome of [`revert_sale`](crate::SaleEngine::revert_sale).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevertResult {
    pub success: bool,
    pub sale_id: String,
    pub item_id: Option<String>,
    /// Status the item had before the revert (normally SOLD).
    pub previous_status: Option<InventoryStatus>,
    /// Status the item was restored to (normally AVAILABLE).
    pub new_status: Option<InventoryStatus>,
    pub inventory_restored: bool,
    /// Set when the item left SOLD while other sales of it are still live.
    pub warning: Option<String>,
    pub error: Option<SaleFailure>,
}

impl RevertResult {
    pub(crate) fn failed(sale_id: &str, item_id: Option<&str>, failure: SaleFailure) -> Self {
        RevertResult {
            success: false,
            sale_id: sale_id.to_string(),
            item_id: item_id.map(str::to_string),
            previous_status: None,
            new_status: None,
            inventory_restored: false,
            warning: None,
            error: Some(failure),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use phonedesk_core::PaymentMethod;

    #[test]
    fn test_request_deserializes_with_defaults() {
        let request: CompleteSaleRequest = serde_json::from_str(
            r#"{"itemId":"ip-1","saleDate":"2024-03-15","salePrice":999.5}"#,
        )
        .unwrap();

        assert_eq!(request.item_id, "ip-1");
        assert_eq!(request.sale_price, Money::from_cents(99_950));
        assert!(request.payments.is_empty());
        assert_eq!(request.buyer, BuyerInfo::default());
    }

    #[test]
    fn test_request_with_payments() {
        let request: CompleteSaleRequest = serde_json::from_str(
            r#"{
                "itemId": "ip-1",
                "saleDate": "2024-03-15",
                "salePrice": 100,
                "buyer": {"name": "Ana", "phone": "555-0101"},
                "payments": [
                    {"method": "cash", "amount": 60, "cashTendered": 70},
                    {"method": "card", "amount": 40, "cardLastFour": "1234"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(request.payments.len(), 2);
        assert_eq!(request.payments[1].method, PaymentMethod::Card);
        assert_eq!(request.buyer.name.as_deref(), Some("Ana"));
    }

    #[test]
    fn test_batch_total_due() {
        let request = BatchSaleRequest::new(
            vec![
                BatchItem::new("a", Money::from_units(700)),
                BatchItem::new("b", Money::from_cents(2_550)),
            ],
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
        );
        assert_eq!(request.total_due(), Money::from_cents(72_550));
    }

    #[test]
    fn test_failed_result_serializes_error() {
        let result = SaleResult::failed(
            "ip-1",
            Some(InventoryStatus::Reserved),
            SaleFailure::ItemNotAvailable {
                item_id: "ip-1".to_string(),
                current_status: InventoryStatus::Reserved,
            },
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["inventoryDeducted"], false);
        assert_eq!(json["error"]["kind"], "ITEM_NOT_AVAILABLE");
        assert_eq!(json["previousStatus"], "reserved");
    }
}
