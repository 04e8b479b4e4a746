//! # Payment Allocator
//!
//! Validates and normalizes the payment lines of a sale against the
//! amount due, computes cash change, and derives the denormalized
//! summary stored on the sale.
//!
//! ## Flow
//! ```text
//! PaymentLine[] (caller)      total due (sale price, or batch sum)
//!        │                             │
//!        ▼                             │
//!  validate_line() each ── error ──► PaymentError (nothing written)
//!        │                             │
//!        ▼                             ▼
//!  validate_split_payment(lines, total_due) ── !is_valid ──► AmountMismatch
//!        │
//!        ▼
//!  PaymentPlan { allocations, summary, is_split, primary_method }
//!        │
//!        ▼
//!  persisted in the same transaction as the status flip
//! ```
//!
//! ## Tolerance
//! Totals are compared with an absolute tolerance of 0.01 so that
//! sub-cent float noise from the till never blocks a sale.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{PaymentError, PaymentResult};
use crate::money::{Money, MAX_AMOUNT};
use crate::types::{PaymentLine, PaymentMethod, PaymentSummaryEntry};

/// Absolute tolerance when comparing totals (0.01).
pub const PAYMENT_TOLERANCE: Money = Money::from_cents(1);

/// Maximum card type length.
pub const MAX_CARD_TYPE_LEN: usize = 50;
/// Maximum transaction reference length.
pub const MAX_TRANSACTION_REFERENCE_LEN: usize = 100;
/// Maximum payment description length.
pub const MAX_PAYMENT_DESCRIPTION_LEN: usize = 200;

// =============================================================================
// Split Validation
// =============================================================================

/// Outcome of comparing payment lines to the amount due.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PaymentValidation {
    pub is_valid: bool,
    #[ts(type = "number")]
    pub total_paid: Money,
    #[ts(type = "number")]
    pub amount_due: Money,
    /// `total_paid − amount_due`; negative means underpaid.
    #[ts(type = "number")]
    pub difference: Money,
    pub message: String,
}

/// Sums the lines and compares them to `total_due`.
///
/// ## Example
/// ```rust
/// use phonedesk_core::payment::validate_split_payment;
/// use phonedesk_core::{Money, PaymentLine, PaymentMethod};
///
/// let lines = [
///     PaymentLine::new(PaymentMethod::Cash, Money::from_units(60)),
///     PaymentLine::new(PaymentMethod::Card, Money::from_f64(39.995).unwrap()),
/// ];
/// let result = validate_split_payment(&lines, Money::from_units(100));
/// assert!(result.is_valid);
/// ```
pub fn validate_split_payment(lines: &[PaymentLine], total_due: Money) -> PaymentValidation {
    let total_paid: Money = lines.iter().map(|line| line.amount).sum();
    let difference = total_paid.saturating_sub(total_due);
    let is_valid = difference.abs() <= PAYMENT_TOLERANCE;

    let message = if is_valid {
        "payment amounts match total due".to_string()
    } else if difference.is_negative() {
        format!("underpayment: {} remaining", difference.abs().to_fixed2())
    } else {
        format!("overpayment: {} excess", difference.to_fixed2())
    };

    PaymentValidation {
        is_valid,
        total_paid,
        amount_due: total_due,
        difference,
        message,
    }
}

// =============================================================================
// Cash Change
// =============================================================================

/// Change owed for a cash payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CashChange {
    #[ts(type = "number")]
    pub amount_due: Money,
    #[ts(type = "number")]
    pub cash_tendered: Money,
    #[ts(type = "number")]
    pub change_given: Money,
    pub is_exact: bool,
    pub is_insufficient: bool,
}

/// Computes change for cash handed over at the till.
///
/// ## Rules
/// - `change_given = max(0, tendered − due)`
/// - `is_insufficient` iff `tendered < due`
/// - negative inputs are rejected
///
/// ## Example
/// ```rust
/// use phonedesk_core::payment::calculate_cash_change;
/// use phonedesk_core::Money;
///
/// let change = calculate_cash_change(Money::from_units(100), Money::from_units(150)).unwrap();
/// assert_eq!(change.change_given, Money::from_units(50));
/// assert!(!change.is_exact);
/// ```
pub fn calculate_cash_change(amount_due: Money, cash_tendered: Money) -> PaymentResult<CashChange> {
    require_amount("amount_due", amount_due)?;
    require_amount("cash_tendered", cash_tendered)?;

    let change_given = if cash_tendered > amount_due {
        cash_tendered - amount_due
    } else {
        Money::zero()
    };

    Ok(CashChange {
        amount_due,
        cash_tendered,
        change_given,
        is_exact: cash_tendered == amount_due,
        is_insufficient: cash_tendered < amount_due,
    })
}

// =============================================================================
// Derived Fields
// =============================================================================

/// The method of the line with the largest amount.
///
/// Ties go to the first line in caller order. Returns `None` for no lines.
///
/// ## Example
/// ```rust
/// use phonedesk_core::payment::primary_method;
/// use phonedesk_core::{Money, PaymentLine, PaymentMethod};
///
/// let lines = [
///     PaymentLine::new(PaymentMethod::Cash, Money::from_units(50)),
///     PaymentLine::new(PaymentMethod::Card, Money::from_units(50)),
/// ];
/// assert_eq!(primary_method(&lines), Some(PaymentMethod::Cash));
/// ```
pub fn primary_method(lines: &[PaymentLine]) -> Option<PaymentMethod> {
    let mut best: Option<&PaymentLine> = None;
    for line in lines {
        // strictly greater, so an equal amount never displaces an earlier line
        if best.map_or(true, |b| line.amount > b.amount) {
            best = Some(line);
        }
    }
    best.map(|line| line.method)
}

/// True iff more than one line is present, whatever the amounts.
#[inline]
pub fn is_split(lines: &[PaymentLine]) -> bool {
    lines.len() > 1
}

// =============================================================================
// Per-Line Validation
// =============================================================================

/// Validates one payment line.
///
/// ## Rules
/// - 0 ≤ amount ≤ [`MAX_AMOUNT`], same bounds for cash tendered
/// - card last four, when present, is exactly 4 ASCII digits
/// - card type ≤ 50, transaction reference ≤ 100, description ≤ 200
pub fn validate_line(line: &PaymentLine) -> PaymentResult<()> {
    require_amount("amount", line.amount)?;

    if let Some(tendered) = line.cash_tendered {
        require_amount("cash_tendered", tendered)?;
    }

    if let Some(last_four) = &line.card_last_four {
        if last_four.len() != 4 || !last_four.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PaymentError::InvalidCardDigits(last_four.clone()));
        }
    }

    check_len("card_type", line.card_type.as_deref(), MAX_CARD_TYPE_LEN)?;
    check_len(
        "transaction_reference",
        line.transaction_reference.as_deref(),
        MAX_TRANSACTION_REFERENCE_LEN,
    )?;
    check_len(
        "payment_description",
        line.payment_description.as_deref(),
        MAX_PAYMENT_DESCRIPTION_LEN,
    )?;

    Ok(())
}

fn require_amount(field: &str, amount: Money) -> PaymentResult<()> {
    if amount.is_negative() {
        return Err(PaymentError::InvalidAmount {
            field: field.to_string(),
            reason: format!("must not be negative, got {}", amount.to_fixed2()),
        });
    }
    if amount.exceeds_cap() {
        return Err(PaymentError::InvalidAmount {
            field: field.to_string(),
            reason: format!("must not exceed {}", MAX_AMOUNT.to_fixed2()),
        });
    }
    Ok(())
}

fn check_len(field: &str, value: Option<&str>, max: usize) -> PaymentResult<()> {
    match value {
        Some(v) if v.chars().count() > max => Err(PaymentError::FieldTooLong {
            field: field.to_string(),
            max,
        }),
        _ => Ok(()),
    }
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// =============================================================================
// Payment Plan
// =============================================================================

/// A payment line ready to be persisted, change already computed.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationDraft {
    pub method: PaymentMethod,
    pub amount: Money,
    pub cash_tendered: Option<Money>,
    pub change_given: Option<Money>,
    pub card_last_four: Option<String>,
    pub card_type: Option<String>,
    pub transaction_reference: Option<String>,
    pub payment_description: Option<String>,
}

impl AllocationDraft {
    /// The denormalized summary entry for this line.
    pub fn summary_entry(&self) -> PaymentSummaryEntry {
        PaymentSummaryEntry {
            method: self.method,
            amount: self.amount,
            card_last_four: self.card_last_four.clone(),
            transaction_reference: self.transaction_reference.clone(),
            cash_tendered: self.cash_tendered,
            change_given: self.change_given,
        }
    }
}

/// Everything the store writes for the payments of one sale or batch.
///
/// An empty plan means the caller recorded the sale without payment
/// details: no allocation rows, empty summary, no primary method.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PaymentPlan {
    pub allocations: Vec<AllocationDraft>,
    pub summary: Vec<PaymentSummaryEntry>,
    pub is_split: bool,
    pub primary_method: Option<PaymentMethod>,
    pub total_paid: Money,
}

impl PaymentPlan {
    /// Validates every line and the total, then normalizes the lines.
    ///
    /// Cash fields are dropped on non-cash lines and change is computed
    /// from the tendered amount; card fields are dropped on non-card lines.
    pub fn build(lines: &[PaymentLine], total_due: Money) -> PaymentResult<Self> {
        if lines.is_empty() {
            return Ok(PaymentPlan::default());
        }

        for line in lines {
            validate_line(line)?;
        }

        let validation = validate_split_payment(lines, total_due);
        if !validation.is_valid {
            return Err(PaymentError::AmountMismatch {
                message: validation.message,
            });
        }

        let allocations: Vec<AllocationDraft> = lines
            .iter()
            .map(|line| {
                let (cash_tendered, change_given) = match (line.method, line.cash_tendered) {
                    (PaymentMethod::Cash, Some(tendered)) => {
                        let change = if tendered > line.amount {
                            tendered - line.amount
                        } else {
                            Money::zero()
                        };
                        (Some(tendered), Some(change))
                    }
                    _ => (None, None),
                };
                let is_card = line.method == PaymentMethod::Card;

                AllocationDraft {
                    method: line.method,
                    amount: line.amount,
                    cash_tendered,
                    change_given,
                    card_last_four: line.card_last_four.clone().filter(|_| is_card),
                    card_type: trimmed(&line.card_type).filter(|_| is_card),
                    transaction_reference: trimmed(&line.transaction_reference),
                    payment_description: trimmed(&line.payment_description),
                }
            })
            .collect();

        Ok(PaymentPlan {
            summary: allocations.iter().map(AllocationDraft::summary_entry).collect(),
            is_split: is_split(lines),
            primary_method: primary_method(lines),
            total_paid: validation.total_paid,
            allocations,
        })
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.allocations.is_empty()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
