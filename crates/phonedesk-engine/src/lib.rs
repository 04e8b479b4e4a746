//! # phonedesk-engine: Sale Completion for PhoneDesk
//!
//! Turns "mark this phone sold" into one durable transition across the
//! item's status, the sale row, its payment allocations and the audit
//! log, and undoes it again on return.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  HTTP controllers / batch runners                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 phonedesk-engine (THIS CRATE)                   │   │
//! │  │                                                                 │   │
//! │  │   SaleEngine                                                    │   │
//! │  │   ├── complete_sale / complete_batch_sale   (orchestrator)     │   │
//! │  │   ├── revert_sale                           (reversal)         │   │
//! │  │   ├── check_availability                    (availability)     │   │
//! │  │   ├── validate_split_payment / cash change  (payments)         │   │
//! │  │   └── queries() ──► SaleQueries             (query)            │   │
//! │  │                                                                 │   │
//! │  │   SaleStore trait ── EventBus ── EngineConfig ── EngineError   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                          │                                      │
//! │       ▼                          ▼                                      │
//! │  phonedesk-db (SQLite)     phonedesk-core (types, money, allocator)    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use phonedesk_engine::{open, CompleteSaleRequest, EngineConfig};
//!
//! phonedesk_engine::telemetry::init_tracing();
//! let engine = open(&EngineConfig::load(None)?).await?;
//!
//! let result = engine
//!     .complete_sale(CompleteSaleRequest::new("ip15-0001", today, Money::from_units(999)))
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod availability;
pub mod config;
pub mod dto;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod payments;
pub mod query;
pub mod reversal;
pub mod store;
pub mod telemetry;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::EngineConfig;
pub use dto::{
    BatchItem, BatchSaleLine, BatchSaleRequest, BatchSaleResult, BatchWarning,
    CompleteSaleRequest, RevertResult, SaleCorrection, SaleResult,
};
pub use error::{EngineError, EngineResult, ErrorCode, SaleFailure};
pub use events::{EventBus, SaleEvent};
pub use orchestrator::{SaleEngine, SalePolicy};
pub use payments::{calculate_cash_change, validate_split_payment};
pub use query::{CustomerHistory, MonthlySales, SaleQueries, SaleSummary};
pub use store::SaleStore;

use phonedesk_db::Database;
use tracing::info;

/// Opens the configured database, running migrations, and builds an
/// engine over it.
pub async fn open(config: &EngineConfig) -> EngineResult<SaleEngine<Database>> {
    config.validate()?;

    let db = Database::new(config.db_config())
        .await
        .map_err(EngineError::PersistenceFailure)?;

    info!(
        path = %config.database.path.display(),
        allow_oversell = config.sales.allow_oversell,
        "Sale engine ready"
    );
    Ok(SaleEngine::from_config(db, config))
}
