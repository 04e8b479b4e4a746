//! # Engine Error Types
//!
//! Two kinds of failure leave the engine:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  SaleFailure  (inside Ok(result), success = false)                     │
//! │  ───────────                                                            │
//! │  ItemNotFound, ItemNotAvailable, ConflictingState,                     │
//! │  SaleNotFound, AlreadyReverted                                         │
//! │  → the state machine said no; callers branch on it                     │
//! │                                                                         │
//! │  EngineError  (Err)                                                    │
//! │  ───────────                                                            │
//! │  Validation, InvalidPaymentAllocation  → caller's fault, never retry   │
//! │  PersistenceFailure                    → rolled back, safe to retry    │
//! │  NotFound, Rejected, Config, ...                                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both carry a stable [`ErrorCode`] for HTTP and CLI callers.

use serde::Serialize;
use thiserror::Error;

use phonedesk_core::{CoreError, InventoryStatus, PaymentError, ValidationError};
use phonedesk_db::DbError;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

// =============================================================================
// Error Codes
// =============================================================================

/// Machine-readable error codes.
///
/// ## Usage in Callers
/// ```typescript
/// switch (result.error.code) {
///   case 'ITEM_NOT_AVAILABLE':
///     showNotification('Someone else just sold this phone');
///     break;
///   case 'PERSISTENCE_FAILURE':
///     retry();
///     break;
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Input validation failed (400)
    ValidationError,
    /// Payment lines invalid or not matching the total (400)
    InvalidPaymentAllocation,
    /// Manual status change outside available ↔ reserved (409)
    InvalidStatusTransition,
    /// Unknown id (404)
    NotFound,
    ItemNotFound,
    ItemNotAvailable,
    ConflictingState,
    SaleNotFound,
    AlreadyReverted,
    /// Store aborted the transaction (503, retryable)
    PersistenceFailure,
    /// Bad configuration (500)
    ConfigError,
}

// =============================================================================
// Sale Failure
// =============================================================================

/// A state-machine refusal, reported inside a result DTO.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum SaleFailure {
    #[error("Item {item_id} not found")]
    ItemNotFound { item_id: String },

    /// The item is not AVAILABLE and oversell is off, or another
    /// caller sold it between our read and our write.
    #[error("Item {item_id} is {current_status} and cannot be sold")]
    ItemNotAvailable {
        item_id: String,
        current_status: InventoryStatus,
    },

    /// The item moved since the sale, so a revert would clobber an
    /// unrelated change.
    #[error("Item {item_id} was expected to be {expected} but is {}", describe(.actual))]
    ConflictingState {
        item_id: String,
        expected: InventoryStatus,
        actual: Option<InventoryStatus>,
    },

    #[error("Sale {sale_id} not found")]
    SaleNotFound { sale_id: String },

    #[error("Sale {sale_id} has already been reverted")]
    AlreadyReverted { sale_id: String },
}

fn describe(status: &Option<InventoryStatus>) -> &'static str {
    status.map_or("missing", |s| s.as_str())
}

impl SaleFailure {
    pub fn code(&self) -> ErrorCode {
        match self {
            SaleFailure::ItemNotFound { .. } => ErrorCode::ItemNotFound,
            SaleFailure::ItemNotAvailable { .. } => ErrorCode::ItemNotAvailable,
            SaleFailure::ConflictingState { .. } => ErrorCode::ConflictingState,
            SaleFailure::SaleNotFound { .. } => ErrorCode::SaleNotFound,
            SaleFailure::AlreadyReverted { .. } => ErrorCode::AlreadyReverted,
        }
    }

    /// The item this failure is about, if any.
    pub fn item_id(&self) -> Option<&str> {
        match self {
            SaleFailure::ItemNotFound { item_id }
            | SaleFailure::ItemNotAvailable { item_id, .. }
            | SaleFailure::ConflictingState { item_id, .. } => Some(item_id),
            SaleFailure::SaleNotFound { .. } | SaleFailure::AlreadyReverted { .. } => None,
        }
    }

    /// Translates a failed conditional write on an item.
    ///
    /// A lost race when selling reads as "not available"; the item may
    /// also have vanished.
    pub(crate) fn from_lost_race(item_id: &str, actual: Option<InventoryStatus>) -> Self {
        match actual {
            Some(current_status) => SaleFailure::ItemNotAvailable {
                item_id: item_id.to_string(),
                current_status,
            },
            None => SaleFailure::ItemNotFound {
                item_id: item_id.to_string(),
            },
        }
    }
}

// =============================================================================
// Engine Error
// =============================================================================

/// Errors returned as `Err` from engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Bad input shape; detected before any store call.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A payment line is malformed or the lines do not add up.
    #[error("Invalid payment allocation: {0}")]
    InvalidPaymentAllocation(#[from] PaymentError),

    /// Manual status change outside `available ↔ reserved`.
    #[error("Cannot change item status from {from} to {to}")]
    InvalidStatusTransition {
        from: InventoryStatus,
        to: InventoryStatus,
    },

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A state-machine refusal on a path that has no result DTO.
    #[error("{0}")]
    Rejected(SaleFailure),

    /// The store rejected the atomic unit; nothing was applied.
    ///
    /// ## When This Occurs
    /// - Database locked past `busy_timeout`
    /// - Pool exhausted or closed
    /// - A constraint or trigger aborted the transaction
    #[error("Persistence failure: {0}")]
    PersistenceFailure(#[source] DbError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Stable machine-readable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::Validation(_) => ErrorCode::ValidationError,
            EngineError::InvalidPaymentAllocation(_) => ErrorCode::InvalidPaymentAllocation,
            EngineError::InvalidStatusTransition { .. } => ErrorCode::InvalidStatusTransition,
            EngineError::NotFound { .. } => ErrorCode::NotFound,
            EngineError::Rejected(failure) => failure.code(),
            EngineError::PersistenceFailure(_) => ErrorCode::PersistenceFailure,
            EngineError::Config(_) => ErrorCode::ConfigError,
        }
    }

    /// Only persistence failures may be retried: the atomic unit
    /// guarantees the failed attempt left nothing behind.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::PersistenceFailure(_))
    }

    pub(crate) fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidStatusTransition { from, to } => {
                EngineError::InvalidStatusTransition { from, to }
            }
            CoreError::Validation(e) => EngineError::Validation(e),
            CoreError::Payment(e) => EngineError::InvalidPaymentAllocation(e),
        }
    }
}

/// Converts database errors that reached the engine unhandled.
///
/// The orchestrator and compensator match `Conflict` / `AlreadyReverted`
/// themselves; this mapping covers every other path.
impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => EngineError::NotFound { entity, id },
            DbError::Conflict {
                item_id,
                expected,
                actual,
            } => EngineError::Rejected(SaleFailure::ConflictingState {
                item_id,
                expected,
                actual,
            }),
            DbError::AlreadyReverted { sale_id } => {
                EngineError::Rejected(SaleFailure::AlreadyReverted { sale_id })
            }
            other => EngineError::PersistenceFailure(other),
        }
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(err: toml::de::Error) -> Self {
        EngineError::Config(format!("TOML parse error: {}", err))
    }
}

impl From<toml::ser::Error> for EngineError {
    fn from(err: toml::ser::Error) -> Self {
        EngineError::Config(format!("TOML serialize error: {}", err))
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Config(format!("IO error: {}", err))
    }
}
