//! # Error Types
//!
//! Domain-specific error types for phonedesk-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  phonedesk-core errors (this file)                                     │
//! │  ├── CoreError        - General domain errors                          │
//! │  ├── ValidationError  - Input validation failures                      │
//! │  └── PaymentError     - Payment line / allocation failures             │
//! │                                                                         │
//! │  phonedesk-db errors (separate crate)                                  │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  phonedesk-engine errors                                               │
//! │  └── EngineError      - What HTTP controllers / batch runners see      │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError → ErrorCode           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::types::InventoryStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A status change outside the allowed state machine.
    ///
    /// ## When This Occurs
    /// - Catalog management tries to move an item to or from SOLD
    /// - Setting an item to the status it already has
    #[error("Cannot change item status from {from} to {to}")]
    InvalidStatusTransition {
        from: InventoryStatus,
        to: InventoryStatus,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Payment allocation error (wraps PaymentError).
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before any store round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid email, invalid status name).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value (e.g., the same item twice in one batch).
    #[error("{field} '{value}' appears more than once")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Payment Error
// =============================================================================

/// Payment line and allocation errors.
///
/// Raised by the payment allocator before anything is written.
/// The engine wraps these as an invalid payment allocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    /// Payment method is not one of cash, card, transfer, other.
    #[error("Invalid payment method: {0}")]
    InvalidPaymentMethod(String),

    /// Amount, tendered cash or due amount is negative or not a number.
    #[error("Invalid amount for {field}: {reason}")]
    InvalidAmount { field: String, reason: String },

    /// Card last four must be exactly four ASCII digits.
    #[error("Card last four must be exactly 4 digits, got '{0}'")]
    InvalidCardDigits(String),

    /// A bounded text field exceeds its maximum length.
    #[error("{field} must be at most {max} characters")]
    FieldTooLong { field: String, max: usize },

    /// Sum of payment lines does not match the amount due.
    #[error("Payment total does not match amount due: {message}")]
    AmountMismatch { message: String },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

/// Convenience type alias for payment allocator results.
pub type PaymentResult<T> = Result<T, PaymentError>;

// =============================================================================
// Unit Tests
// =============================================================================
