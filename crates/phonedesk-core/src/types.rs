//! # Domain Types
//!
//! Core domain types used throughout PhoneDesk.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  InventoryItem  │   │      Sale       │   │PaymentAllocation│       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │◄──│  item_id        │◄──│  sale_id  or    │       │
//! │  │  status         │   │  batch_id       │◄──│  batch_id       │       │
//! │  │  cost_price     │   │  cost snapshot  │   │  method         │       │
//! │  │  tax flags      │   │  tax snapshot   │   │  amount         │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │          ▲                      ▲                                       │
//! │          │    ┌─────────────────┴──────┐                                │
//! │          └────│   DeductionLogEntry    │  append-only audit trail       │
//! │               │  previous → new status │                                │
//! │               └────────────────────────┘                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Status State Machine
//! ```text
//!            sell (orchestrator)
//!   AVAILABLE ───────────────────► SOLD
//!     │   ▲  ◄───────────────────
//!     │   │    revert (compensator)
//!     ▼   │
//!   RESERVED   (manual, catalog management)
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, PaymentError, ValidationError};
use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 1500 bps = 15% (a typical VAT rate on handsets)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a tax rate from a percentage (catalog stores 0-100).
    pub fn from_percentage(pct: f64) -> Self {
        TaxRate((pct * 100.0).round().max(0.0) as u32)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

// =============================================================================
// Inventory Status
// =============================================================================

/// Status of a single sellable unit.
///
/// Exactly one of these holds at any time. SOLD is only ever written by
/// the sale orchestrator, and only the compensator moves an item out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum InventoryStatus {
    /// On the shelf, can be sold.
    Available,
    /// Held for a customer; not sellable without oversell.
    Reserved,
    /// Sold through the orchestrator.
    Sold,
}

impl InventoryStatus {
    /// Every status, in display order.
    pub const ALL: [InventoryStatus; 3] = [
        InventoryStatus::Available,
        InventoryStatus::Reserved,
        InventoryStatus::Sold,
    ];

    /// Lowercase name as stored in the database.
    pub const fn as_str(&self) -> &'static str {
        match self {
            InventoryStatus::Available => "available",
            InventoryStatus::Reserved => "reserved",
            InventoryStatus::Sold => "sold",
        }
    }

    /// Whether the orchestrator may sell this item without oversell.
    #[inline]
    pub const fn is_available(&self) -> bool {
        matches!(self, InventoryStatus::Available)
    }

    /// Checks a status change requested by catalog management.
    ///
    /// Only `available ↔ reserved` is allowed here. Anything touching
    /// SOLD belongs to the orchestrator and the compensator.
    pub fn validate_manual_transition(self, to: InventoryStatus) -> CoreResult<()> {
        match (self, to) {
            (InventoryStatus::Available, InventoryStatus::Reserved)
            | (InventoryStatus::Reserved, InventoryStatus::Available) => Ok(()),
            (from, to) => Err(CoreError::InvalidStatusTransition { from, to }),
        }
    }
}

impl fmt::Display for InventoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InventoryStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "available" => Ok(InventoryStatus::Available),
            "reserved" => Ok(InventoryStatus::Reserved),
            "sold" => Ok(InventoryStatus::Sold),
            _ => Err(ValidationError::NotAllowed {
                field: "status".to_string(),
                allowed: Self::ALL.iter().map(|s| s.as_str().to_string()).collect(),
            }),
        }
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// How a payment line was settled.
///
/// Parsing from text (JSON included) goes through [`FromStr`], so an
/// unknown method surfaces as [`PaymentError::InvalidPaymentMethod`].
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Physical cash; the only method with tendered/change fields.
    Cash,
    /// Card on an external terminal.
    Card,
    /// Bank or mobile-wallet transfer.
    Transfer,
    /// Anything else (voucher, trade-in credit).
    Other,
}

impl PaymentMethod {
    /// Lowercase name as stored in the database.
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Transfer => "transfer",
            PaymentMethod::Other => "other",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "card" => Ok(PaymentMethod::Card),
            "transfer" => Ok(PaymentMethod::Transfer),
            "other" => Ok(PaymentMethod::Other),
            _ => Err(PaymentError::InvalidPaymentMethod(s.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for PaymentMethod {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Deduction Log Kind
// =============================================================================

/// Which side of the state machine wrote a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    /// Written by the orchestrator when an item is sold.
    Deduction,
    /// Written by the compensator when a sale is reverted.
    Restoration,
}

// =============================================================================
// Inventory Item
// =============================================================================

/// A sellable unit (one handset, one boxed accessory).
///
/// Created by catalog management, which is outside this engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub id: String,
    pub brand_id: Option<String>,
    /// Joined from brands for display.
    pub brand_name: Option<String>,
    pub model: String,
    pub status: InventoryStatus,
    pub cost_price: Money,
    pub selling_price: Money,
    pub tax_rate: TaxRate,
    pub is_tax_inclusive: bool,
    pub is_tax_exempt: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    /// The economics the sale snapshots at the moment of sale.
    pub fn pricing(&self) -> ItemPricing {
        ItemPricing {
            cost_price: self.cost_price,
            tax_rate: self.tax_rate,
            is_tax_inclusive: self.is_tax_inclusive,
            is_tax_exempt: self.is_tax_exempt,
        }
    }
}

/// Cost and tax fields of an item as read by the conditional status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemPricing {
    pub cost_price: Money,
    pub tax_rate: TaxRate,
    pub is_tax_inclusive: bool,
    pub is_tax_exempt: bool,
}

// =============================================================================
// Tax Snapshot
// =============================================================================

/// Tax fields frozen on a sale.
///
/// ## Rules
/// - Exempt: rate 0, tax 0, base = price
/// - Inclusive: the price already contains tax, split it out
/// - Exclusive: base = price, tax on top
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxSnapshot {
    pub tax_rate: TaxRate,
    pub tax_amount: Money,
    pub base_price: Money,
}

impl TaxSnapshot {
    /// Computes the snapshot for a sale price.
    ///
    /// ## Example
    /// ```rust
    /// use phonedesk_core::{ItemPricing, Money, TaxRate, TaxSnapshot};
    ///
    /// let pricing = ItemPricing {
    ///     cost_price: Money::from_units(80),
    ///     tax_rate: TaxRate::from_bps(1000),
    ///     is_tax_inclusive: true,
    ///     is_tax_exempt: false,
    /// };
    /// let snapshot = TaxSnapshot::compute(Money::from_units(110), &pricing);
    /// assert_eq!(snapshot.base_price, Money::from_units(100));
    /// assert_eq!(snapshot.tax_amount, Money::from_units(10));
    /// ```
    pub fn compute(sale_price: Money, pricing: &ItemPricing) -> Self {
        if pricing.is_tax_exempt {
            return TaxSnapshot {
                tax_rate: TaxRate::zero(),
                tax_amount: Money::zero(),
                base_price: sale_price,
            };
        }

        if pricing.is_tax_inclusive {
            let (base_price, tax_amount) = sale_price.split_inclusive_tax(pricing.tax_rate);
            TaxSnapshot {
                tax_rate: pricing.tax_rate,
                tax_amount,
                base_price,
            }
        } else {
            TaxSnapshot {
                tax_rate: pricing.tax_rate,
                tax_amount: sale_price.calculate_tax(pricing.tax_rate),
                base_price: sale_price,
            }
        }
    }
}

// =============================================================================
// Buyer
// =============================================================================

/// Optional buyer contact details captured on a sale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BuyerInfo {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

// =============================================================================
// Payments
// =============================================================================

/// A payment line as supplied by the caller.
///
/// Change is never supplied; the allocator computes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLine {
    pub method: PaymentMethod,
    pub amount: Money,
    pub cash_tendered: Option<Money>,
    pub card_last_four: Option<String>,
    pub card_type: Option<String>,
    pub transaction_reference: Option<String>,
    pub payment_description: Option<String>,
}

impl PaymentLine {
    /// A bare line with only method and amount.
    pub fn new(method: PaymentMethod, amount: Money) -> Self {
        PaymentLine {
            method,
            amount,
            cash_tendered: None,
            card_last_four: None,
            card_type: None,
            transaction_reference: None,
            payment_description: None,
        }
    }

    /// Cash line with the amount the customer handed over.
    pub fn cash(amount: Money, tendered: Money) -> Self {
        PaymentLine {
            cash_tendered: Some(tendered),
            ..PaymentLine::new(PaymentMethod::Cash, amount)
        }
    }

    /// Card line with the last four digits printed on the slip.
    pub fn card(amount: Money, last_four: impl Into<String>) -> Self {
        PaymentLine {
            card_last_four: Some(last_four.into()),
            ..PaymentLine::new(PaymentMethod::Card, amount)
        }
    }
}

/// A persisted payment line.
///
/// Belongs to exactly one of a sale (single sale) or a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentAllocation {
    pub id: String,
    pub sale_id: Option<String>,
    pub batch_id: Option<String>,
    pub method: PaymentMethod,
    pub amount: Money,
    pub cash_tendered: Option<Money>,
    pub change_given: Option<Money>,
    pub card_last_four: Option<String>,
    pub card_type: Option<String>,
    pub transaction_reference: Option<String>,
    pub payment_description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One entry of the denormalized payment summary stored on a sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSummaryEntry {
    pub method: PaymentMethod,
    #[ts(type = "number")]
    pub amount: Money,
    pub card_last_four: Option<String>,
    pub transaction_reference: Option<String>,
    #[ts(type = "number | null")]
    pub cash_tendered: Option<Money>,
    #[ts(type = "number | null")]
    pub change_given: Option<Money>,
}

// =============================================================================
// Sale
// =============================================================================

/// A completed sale of one inventory item.
///
/// Cost and tax are snapshots taken when the item flipped to SOLD and
/// are never recomputed. Only date, price, buyer and notes can be
/// corrected afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: String,
    pub item_id: String,
    /// Shared by every sale created in one batch.
    pub batch_id: Option<String>,
    pub sale_date: NaiveDate,
    pub sale_price: Money,
    pub cost_price: Money,
    pub buyer_name: Option<String>,
    pub buyer_phone: Option<String>,
    pub buyer_email: Option<String>,
    pub notes: Option<String>,
    pub tax_rate: TaxRate,
    pub tax_amount: Money,
    pub base_price: Money,
    pub payment_summary: Vec<PaymentSummaryEntry>,
    pub is_split_payment: bool,
    pub primary_payment_method: Option<PaymentMethod>,
    pub location_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set by the compensator; reverted sales are excluded from reporting.
    pub reverted_at: Option<DateTime<Utc>>,
}

impl Sale {
    #[inline]
    pub fn is_reverted(&self) -> bool {
        self.reverted_at.is_some()
    }

    /// Gross profit on this unit.
    #[inline]
    pub fn profit(&self) -> Money {
        self.sale_price - self.cost_price
    }
}

// =============================================================================
// Deduction Log
// =============================================================================

/// Append-only audit record of one status transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeductionLogEntry {
    pub id: String,
    /// Nullable: a reversal may outlive the sale row.
    pub sale_id: Option<String>,
    pub item_id: String,
    pub previous_status: InventoryStatus,
    pub new_status: InventoryStatus,
    pub kind: LogKind,
    pub actor: Option<String>,
    pub notes: Option<String>,
    pub logged_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
