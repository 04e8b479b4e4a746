//! # phonedesk-db: Database Layer for PhoneDesk
//!
//! This crate provides database access for the PhoneDesk sale engine.
//! It uses SQLite for storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        PhoneDesk Data Flow                              │
//! │                                                                         │
//! │  SaleEngine::complete_sale                                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   phonedesk-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐ │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │ │   │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │ │   │
//! │  │   │               │    │ InventoryRepo  │    │              │ │   │
//! │  │   │ SqlitePool    │◄───│ SaleRepo       │    │ 001_initial_ │ │   │
//! │  │   │ WAL + busy    │    │ TransitionRepo │    │   schema.sql │ │   │
//! │  │   │ timeout       │    │ ...            │    │              │ │   │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘ │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   <data dir>/phonedesk/phonedesk.db                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use phonedesk_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("phonedesk.db")).await?;
//! let status = db.inventory().read_status("iphone-15-0001").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::deduction_log::DeductionLogRepository;
pub use repository::inventory::{InventoryRepository, NewInventoryItem};
pub use repository::payment::PaymentRepository;
pub use repository::sale::{MonthlyTotals, SaleDetails, SaleFilter, SaleRepository, SaleTotals, SaleUpdate};
pub use repository::transition::{
    BatchTransitionRequest, CommittedBatch, CommittedSale, RestoreRequest, RestoredItem, SaleWrite,
    TransitionRepository, TransitionRequest,
};
