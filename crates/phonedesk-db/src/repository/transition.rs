//! # Transition Repository
//!
//! The only code that changes an item's status as part of a sale or a
//! reversal. Each public method is one SQLite transaction.
//!
//! ## Sell
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │    UPDATE inventory_items SET status = 'sold'                           │
//! │      WHERE id = ? AND status = <expected>  RETURNING pricing            │
//! │        │                                                                │
//! │        ├── no row ──► ROLLBACK, DbError::Conflict / NotFound            │
//! │        ▼                                                                │
//! │    INSERT sales               (cost + tax snapshot from RETURNING)      │
//! │    INSERT payment_allocations (sale_id, or batch_id for batches)        │
//! │    INSERT inventory_deduction_logs (kind = deduction)                   │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! The conditional UPDATE is the compare-and-swap: two callers that both
//! observed AVAILABLE cannot both match `status = 'available'`. SQLite
//! serializes writers, the second one waits on `busy_timeout` and then
//! sees SOLD.
//!
//! Any `?` between BEGIN and COMMIT drops the transaction, which rolls
//! it back. Nothing is ever half-written.
//!
//! ## Restore
//! ```text
//!  BEGIN
//!    UPDATE sales SET reverted_at = now WHERE id = ? AND reverted_at IS NULL
//!      └── no row and sale exists ──► DbError::AlreadyReverted
//!    UPDATE inventory_items SET status = <restore_to>
//!      WHERE id = ? AND status = <expected>
//!      └── no row ──► DbError::Conflict (nothing is overwritten)
//!    INSERT inventory_deduction_logs (kind = restoration)
//!  COMMIT
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::deduction_log::append_entry;
use crate::repository::payment::{insert_allocations, AllocationOwner};
use phonedesk_core::validation::phone_digits;
use phonedesk_core::{
    BuyerInfo, DeductionLogEntry, InventoryStatus, ItemPricing, LogKind, Money, PaymentAllocation,
    PaymentPlan, Sale, TaxRate, TaxSnapshot,
};

// =============================================================================
// Request / Result Types
// =============================================================================

/// One sale row to write, with the status the caller observed.
#[derive(Debug, Clone)]
pub struct SaleWrite {
    pub sale_id: String,
    pub item_id: String,
    /// Status read before the write; the update only applies if it still holds.
    pub expected_status: InventoryStatus,
    pub sale_date: NaiveDate,
    pub sale_price: Money,
    /// Already normalized.
    pub buyer: BuyerInfo,
    pub notes: Option<String>,
    pub location_id: Option<String>,
}

/// A single-item sale.
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub sale: SaleWrite,
    pub payments: PaymentPlan,
    pub actor: Option<String>,
    /// Stored on the deduction log entry.
    pub note: Option<String>,
}

/// Several sales committed together under one batch id.
#[derive(Debug, Clone)]
pub struct BatchTransitionRequest {
    pub batch_id: String,
    pub sales: Vec<SaleWrite>,
    /// Covers the whole batch; owned by `batch_id`.
    pub payments: PaymentPlan,
    pub actor: Option<String>,
    pub note: Option<String>,
}

/// What one committed sale wrote.
#[derive(Debug, Clone)]
pub struct CommittedSale {
    pub sale: Sale,
    /// Empty for batch sales; see [`CommittedBatch::allocations`].
    pub allocations: Vec<PaymentAllocation>,
    pub log_entry: DeductionLogEntry,
}

/// What a committed batch wrote.
#[derive(Debug, Clone)]
pub struct CommittedBatch {
    pub batch_id: String,
    pub sales: Vec<CommittedSale>,
    pub allocations: Vec<PaymentAllocation>,
}

/// Undo of one sale.
#[derive(Debug, Clone)]
pub struct RestoreRequest {
    pub sale_id: String,
    pub item_id: String,
    /// Status the deduction left the item in.
    pub expected_status: InventoryStatus,
    /// Status the item had before the deduction.
    pub restore_to: InventoryStatus,
    pub actor: Option<String>,
    pub note: Option<String>,
}

/// What a committed restore wrote.
#[derive(Debug, Clone)]
pub struct RestoredItem {
    pub sale_id: String,
    pub item_id: String,
    pub log_entry: DeductionLogEntry,
    pub reverted_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct PricingRow {
    cost_price: i64,
    tax_rate_bps: i64,
    is_tax_inclusive: bool,
    is_tax_exempt: bool,
}

impl From<PricingRow> for ItemPricing {
    fn from(row: PricingRow) -> Self {
        ItemPricing {
            cost_price: Money::from_raw(row.cost_price),
            tax_rate: TaxRate::from_bps(row.tax_rate_bps as u32),
            is_tax_inclusive: row.is_tax_inclusive,
            is_tax_exempt: row.is_tax_exempt,
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for the atomic sell / restore transitions.
#[derive(Debug, Clone)]
pub struct TransitionRepository {
    pool: SqlitePool,
}

impl TransitionRepository {
    /// Creates a new TransitionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TransitionRepository { pool }
    }

    /// Sells one item: status, sale, payments and log in one transaction.
    ///
    /// ## Returns
    /// * `Ok(CommittedSale)` - everything was written
    /// * `Err(DbError::Conflict)` - the item left `expected_status` first
    /// * `Err(DbError::NotFound)` - the item does not exist
    pub async fn sell(&self, request: &TransitionRequest) -> DbResult<CommittedSale> {
        let write = &request.sale;
        debug!(
            sale_id = %write.sale_id,
            item_id = %write.item_id,
            expected = %write.expected_status,
            "Beginning sell transaction"
        );

        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let mut committed = sell_one(
            &mut *tx,
            write,
            &request.payments,
            None,
            TransitionContext::from(request),
            now,
        )
        .await?;

        committed.allocations = insert_allocations(
            &mut *tx,
            AllocationOwner::Sale(&write.sale_id),
            &request.payments.allocations,
            now,
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            sale_id = %write.sale_id,
            item_id = %write.item_id,
            previous = %committed.log_entry.previous_status,
            "Sale committed"
        );
        Ok(committed)
    }

    /// Sells every item of a batch, or none of them.
    ///
    /// The first conflicting item aborts the transaction; items processed
    /// before it are rolled back with it.
    pub async fn sell_batch(&self, request: &BatchTransitionRequest) -> DbResult<CommittedBatch> {
        debug!(
            batch_id = %request.batch_id,
            items = request.sales.len(),
            "Beginning batch sell transaction"
        );

        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let context = TransitionContext {
            actor: request.actor.as_deref(),
            note: request.note.as_deref(),
        };

        let mut sales = Vec::with_capacity(request.sales.len());
        for write in &request.sales {
            let committed = sell_one(
                &mut *tx,
                write,
                &request.payments,
                Some(&request.batch_id),
                context,
                now,
            )
            .await?;
            sales.push(committed);
        }

        let allocations = insert_allocations(
            &mut *tx,
            AllocationOwner::Batch(&request.batch_id),
            &request.payments.allocations,
            now,
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(batch_id = %request.batch_id, items = sales.len(), "Batch committed");
        Ok(CommittedBatch {
            batch_id: request.batch_id.clone(),
            sales,
            allocations,
        })
    }

    /// Marks a sale reverted and puts its item back, in one transaction.
    ///
    /// ## Returns
    /// * `Err(DbError::AlreadyReverted)` - an earlier call won
    /// * `Err(DbError::Conflict)` - the item is no longer in `expected_status`
    pub async fn restore(&self, request: &RestoreRequest) -> DbResult<RestoredItem> {
        debug!(
            sale_id = %request.sale_id,
            item_id = %request.item_id,
            from = %request.expected_status,
            to = %request.restore_to,
            "Beginning restore transaction"
        );

        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let marked = sqlx::query(
            r#"
            UPDATE sales SET reverted_at = ?2, updated_at = ?2
            WHERE id = ?1 AND reverted_at IS NULL
            "#,
        )
        .bind(&request.sale_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if marked.rows_affected() == 0 {
            let exists: Option<String> = sqlx::query_scalar("SELECT id FROM sales WHERE id = ?1")
                .bind(&request.sale_id)
                .fetch_optional(&mut *tx)
                .await?;
            // A missing row still gets its item restored; only a live
            // reverted row means someone beat us to it.
            if exists.is_some() {
                return Err(DbError::AlreadyReverted {
                    sale_id: request.sale_id.clone(),
                });
            }
        }

        let restored = sqlx::query(
            r#"
            UPDATE inventory_items SET status = ?3, updated_at = ?4
            WHERE id = ?1 AND status = ?2
            "#,
        )
        .bind(&request.item_id)
        .bind(request.expected_status)
        .bind(request.restore_to)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if restored.rows_affected() == 0 {
            return Err(missing_or_conflict(&mut *tx, &request.item_id, request.expected_status).await);
        }

        let log_entry = DeductionLogEntry {
            id: uuid::Uuid::new_v4().to_string(),
            sale_id: Some(request.sale_id.clone()),
            item_id: request.item_id.clone(),
            previous_status: request.expected_status,
            new_status: request.restore_to,
            kind: LogKind::Restoration,
            actor: request.actor.clone(),
            notes: request.note.clone(),
            logged_at: now,
        };
        append_entry(&mut *tx, &log_entry).await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            sale_id = %request.sale_id,
            item_id = %request.item_id,
            restored_to = %request.restore_to,
            "Sale reverted"
        );
        Ok(RestoredItem {
            sale_id: request.sale_id.clone(),
            item_id: request.item_id.clone(),
            log_entry,
            reverted_at: now,
        })
    }
}

// =============================================================================
// Transaction Steps
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct TransitionContext<'a> {
    actor: Option<&'a str>,
    note: Option<&'a str>,
}

impl<'a> From<&'a TransitionRequest> for TransitionContext<'a> {
    fn from(request: &'a TransitionRequest) -> Self {
        TransitionContext {
            actor: request.actor.as_deref(),
            note: request.note.as_deref(),
        }
    }
}

/// Flips one item to SOLD and writes its sale row and log entry.
async fn sell_one(
    conn: &mut SqliteConnection,
    write: &SaleWrite,
    payments: &PaymentPlan,
    batch_id: Option<&str>,
    context: TransitionContext<'_>,
    now: DateTime<Utc>,
) -> DbResult<CommittedSale> {
    let pricing: Option<PricingRow> = sqlx::query_as(
        r#"
        UPDATE inventory_items SET status = 'sold', updated_at = ?3
        WHERE id = ?1 AND status = ?2
        RETURNING cost_price, tax_rate_bps, is_tax_inclusive, is_tax_exempt
        "#,
    )
    .bind(&write.item_id)
    .bind(write.expected_status)
    .bind(now)
    .fetch_optional(&mut *conn)
    .await?;

    let pricing: ItemPricing = match pricing {
        Some(row) => row.into(),
        None => return Err(missing_or_conflict(conn, &write.item_id, write.expected_status).await),
    };

    let tax = TaxSnapshot::compute(write.sale_price, &pricing);
    let summary_json = serde_json::to_string(&payments.summary)?;

    sqlx::query(
        r#"
        INSERT INTO sales (
            id, item_id, batch_id, sale_date, sale_price, cost_price,
            buyer_name, buyer_phone, buyer_phone_digits, buyer_email, notes,
            tax_rate_bps, tax_amount, base_price,
            payment_summary, is_split_payment, primary_payment_method,
            location_id, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?19)
        "#,
    )
    .bind(&write.sale_id)
    .bind(&write.item_id)
    .bind(batch_id)
    .bind(write.sale_date)
    .bind(write.sale_price.raw())
    .bind(pricing.cost_price.raw())
    .bind(&write.buyer.name)
    .bind(&write.buyer.phone)
    .bind(write.buyer.phone.as_deref().map(phone_digits))
    .bind(&write.buyer.email)
    .bind(&write.notes)
    .bind(tax.tax_rate.bps() as i64)
    .bind(tax.tax_amount.raw())
    .bind(tax.base_price.raw())
    .bind(summary_json)
    .bind(payments.is_split)
    .bind(payments.primary_method)
    .bind(&write.location_id)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    let log_entry = DeductionLogEntry {
        id: uuid::Uuid::new_v4().to_string(),
        sale_id: Some(write.sale_id.clone()),
        item_id: write.item_id.clone(),
        previous_status: write.expected_status,
        new_status: InventoryStatus::Sold,
        kind: LogKind::Deduction,
        actor: context.actor.map(str::to_string),
        notes: context.note.map(str::to_string),
        logged_at: now,
    };
    append_entry(conn, &log_entry).await?;

    let sale = Sale {
        id: write.sale_id.clone(),
        item_id: write.item_id.clone(),
        batch_id: batch_id.map(str::to_string),
        sale_date: write.sale_date,
        sale_price: write.sale_price,
        cost_price: pricing.cost_price,
        buyer_name: write.buyer.name.clone(),
        buyer_phone: write.buyer.phone.clone(),
        buyer_email: write.buyer.email.clone(),
        notes: write.notes.clone(),
        tax_rate: tax.tax_rate,
        tax_amount: tax.tax_amount,
        base_price: tax.base_price,
        payment_summary: payments.summary.clone(),
        is_split_payment: payments.is_split,
        primary_payment_method: payments.primary_method,
        location_id: write.location_id.clone(),
        created_at: now,
        updated_at: now,
        reverted_at: None,
    };

    Ok(CommittedSale {
        sale,
        allocations: Vec::new(),
        log_entry,
    })
}

/// Explains why a conditional status update matched nothing.
async fn missing_or_conflict(
    conn: &mut SqliteConnection,
    item_id: &str,
    expected: InventoryStatus,
) -> DbError {
    let actual: Result<Option<InventoryStatus>, sqlx::Error> =
        sqlx::query_scalar("SELECT status FROM inventory_items WHERE id = ?1")
            .bind(item_id)
            .fetch_optional(&mut *conn)
            .await;

    match actual {
        Ok(Some(actual)) => DbError::conflict(item_id, expected, Some(actual)),
        Ok(None) => DbError::not_found("InventoryItem", item_id),
        Err(e) => e.into(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
