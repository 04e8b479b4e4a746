//! # Repository Module
//!
//! Database repository implementations for PhoneDesk.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Who Reads and Who Writes                             │
//! │                                                                         │
//! │  SaleEngine (phonedesk-engine)                                         │
//! │       │                                                                 │
//! │       │  db.transitions().sell(&request)                               │
//! │       ▼                                                                 │
//! │  TransitionRepository ──── the only writer of SOLD and of sales,       │
//! │       │                    payment_allocations and the deduction log   │
//! │       │                                                                 │
//! │  InventoryRepository  ──── item reads, manual reserve/release          │
//! │  SaleRepository       ──── sale reads, metadata corrections            │
//! │  PaymentRepository    ──── allocation reads                            │
//! │  DeductionLogRepository ── audit trail reads                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`InventoryRepository`](inventory::InventoryRepository) - Item reads and manual status
//! - [`SaleRepository`](sale::SaleRepository) - Sale listings, totals, corrections
//! - [`PaymentRepository`](payment::PaymentRepository) - Payment allocation reads
//! - [`DeductionLogRepository`](deduction_log::DeductionLogRepository) - Audit trail
//! - [`TransitionRepository`](transition::TransitionRepository) - Atomic sell / restore

pub mod deduction_log;
pub mod inventory;
pub mod payment;
pub mod sale;
pub mod transition;
