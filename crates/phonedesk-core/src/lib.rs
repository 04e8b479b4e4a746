//! # phonedesk-core: Pure Business Logic for PhoneDesk
//!
//! This crate holds the rules of the sale engine as plain functions and
//! types with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       PhoneDesk Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │          HTTP controllers / batch job runners (external)        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    phonedesk-engine                             │   │
//! │  │   complete_sale, complete_batch_sale, revert_sale, queries     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ phonedesk-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌────────────┐ ┌────────┐ │   │
//! │  │  │  types  │ │  money  │ │ payment │ │availability│ │validate│ │   │
//! │  │  └─────────┘ └─────────┘ └─────────┘ └────────────┘ └────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                phonedesk-db (Database Layer)                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (InventoryItem, Sale, PaymentAllocation, log entries)
//! - [`money`] - Fixed-point money (ten-thousandths, no float arithmetic)
//! - [`payment`] - Payment allocator: split validation, cash change, primary method
//! - [`availability`] - Per-item availability verdicts
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use phonedesk_core::payment::calculate_cash_change;
//! use phonedesk_core::Money;
//!
//! let change = calculate_cash_change(Money::from_units(100), Money::from_units(100)).unwrap();
//! assert!(change.is_exact);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod availability;
pub mod error;
pub mod money;
pub mod payment;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, PaymentError, PaymentResult, ValidationError};
pub use money::Money;
pub use payment::{CashChange, PaymentPlan, PaymentValidation};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum items allowed in a single batch sale.
///
/// ## Business Reason
/// A batch is one customer at one till. Anything larger is a bulk
/// import and should not hold one transaction open.
pub const MAX_BATCH_ITEMS: usize = 100;
