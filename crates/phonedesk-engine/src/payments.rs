//! # Payment Operations
//!
//! Caller-facing wrappers over the allocator in `phonedesk_core::payment`,
//! for checkout screens that validate before submitting a sale.

use phonedesk_core::payment;
use phonedesk_core::{CashChange, Money, PaymentLine, PaymentValidation};

use crate::error::EngineResult;
use crate::orchestrator::SaleEngine;
use crate::store::SaleStore;

/// Checks that `lines` add up to `total_due` within one cent.
///
/// Malformed lines are reported through `message`; nothing is thrown.
pub fn validate_split_payment(lines: &[PaymentLine], total_due: Money) -> PaymentValidation {
    let invalid = lines.iter().find_map(|line| payment::validate_line(line).err());
    match invalid {
        Some(err) => {
            let total_paid: Money = lines.iter().map(|line| line.amount).sum();
            PaymentValidation {
                is_valid: false,
                total_paid,
                amount_due: total_due,
                difference: total_paid - total_due,
                message: err.to_string(),
            }
        }
        None => payment::validate_split_payment(lines, total_due),
    }
}

/// Change owed for a cash payment.
pub fn calculate_cash_change(amount_due: Money, cash_tendered: Money) -> EngineResult<CashChange> {
    Ok(payment::calculate_cash_change(amount_due, cash_tendered)?)
}

impl<S: SaleStore> SaleEngine<S> {
    pub fn validate_split_payment(&self, lines: &[PaymentLine], total_due: Money) -> PaymentValidation {
        validate_split_payment(lines, total_due)
    }

    pub fn calculate_cash_change(&self, amount_due: Money, cash_tendered: Money) -> EngineResult<CashChange> {
        calculate_cash_change(amount_due, cash_tendered)
    }
}
