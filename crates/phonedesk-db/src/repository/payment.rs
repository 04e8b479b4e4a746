//! # Payment Allocation Repository
//!
//! Read access to recorded payment allocations.
//!
//! Allocations are written only inside a sale transition. A single sale
//! owns its rows through `sale_id`; a batch owns them through `batch_id`,
//! so looking up payments "for a sale" has to follow the batch link.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::DbResult;
use phonedesk_core::payment::AllocationDraft;
use phonedesk_core::{Money, PaymentAllocation, PaymentMethod};

const ALLOCATION_COLUMNS: &str = r#"
    id, sale_id, batch_id, payment_method, amount,
    cash_tendered, change_given, card_last_four, card_type,
    transaction_reference, payment_description, created_at
"#;

#[derive(Debug, sqlx::FromRow)]
struct AllocationRow {
    id: String,
    sale_id: Option<String>,
    batch_id: Option<String>,
    payment_method: PaymentMethod,
    amount: i64,
    cash_tendered: Option<i64>,
    change_given: Option<i64>,
    card_last_four: Option<String>,
    card_type: Option<String>,
    transaction_reference: Option<String>,
    payment_description: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<AllocationRow> for PaymentAllocation {
    fn from(row: AllocationRow) -> Self {
        PaymentAllocation {
            id: row.id,
            sale_id: row.sale_id,
            batch_id: row.batch_id,
            method: row.payment_method,
            amount: Money::from_raw(row.amount),
            cash_tendered: row.cash_tendered.map(Money::from_raw),
            change_given: row.change_given.map(Money::from_raw),
            card_last_four: row.card_last_four,
            card_type: row.card_type,
            transaction_reference: row.transaction_reference,
            payment_description: row.payment_description,
            created_at: row.created_at,
        }
    }
}

/// Who owns a set of allocation rows.
#[derive(Debug, Clone, Copy)]
pub(crate) enum AllocationOwner<'a> {
    Sale(&'a str),
    Batch(&'a str),
}

/// Writes the allocations of a payment plan on an open transaction.
///
/// Returns the stored rows in input order.
pub(crate) async fn insert_allocations(
    conn: &mut SqliteConnection,
    owner: AllocationOwner<'_>,
    drafts: &[AllocationDraft],
    now: DateTime<Utc>,
) -> DbResult<Vec<PaymentAllocation>> {
    let (sale_id, batch_id) = match owner {
        AllocationOwner::Sale(id) => (Some(id.to_string()), None),
        AllocationOwner::Batch(id) => (None, Some(id.to_string())),
    };

    let mut stored = Vec::with_capacity(drafts.len());
    for (seq, draft) in drafts.iter().enumerate() {
        let id = uuid::Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO payment_allocations (
                id, sale_id, batch_id, payment_method, amount,
                cash_tendered, change_given, card_last_four, card_type,
                transaction_reference, payment_description, seq, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&id)
        .bind(&sale_id)
        .bind(&batch_id)
        .bind(draft.method)
        .bind(draft.amount.raw())
        .bind(draft.cash_tendered.map(|m| m.raw()))
        .bind(draft.change_given.map(|m| m.raw()))
        .bind(&draft.card_last_four)
        .bind(&draft.card_type)
        .bind(&draft.transaction_reference)
        .bind(&draft.payment_description)
        .bind(seq as i64)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        stored.push(PaymentAllocation {
            id,
            sale_id: sale_id.clone(),
            batch_id: batch_id.clone(),
            method: draft.method,
            amount: draft.amount,
            cash_tendered: draft.cash_tendered,
            change_given: draft.change_given,
            card_last_four: draft.card_last_four.clone(),
            card_type: draft.card_type.clone(),
            transaction_reference: draft.transaction_reference.clone(),
            payment_description: draft.payment_description.clone(),
            created_at: now,
        });
    }

    Ok(stored)
}

/// Repository for payment allocation reads.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    /// Creates a new PaymentRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PaymentRepository { pool }
    }

    /// Allocations that paid for a sale, in entry order.
    ///
    /// For a sale created by a batch this is the batch's allocations,
    /// which cover every sale in that batch.
    pub async fn for_sale(&self, sale_id: &str) -> DbResult<Vec<PaymentAllocation>> {
        let rows: Vec<AllocationRow> = sqlx::query_as(&format!(
            r#"
            SELECT {ALLOCATION_COLUMNS} FROM payment_allocations
            WHERE sale_id = ?1
               OR batch_id = (SELECT batch_id FROM sales WHERE id = ?1)
            ORDER BY seq, created_at
            "#
        ))
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(PaymentAllocation::from).collect())
    }

    /// Allocations recorded against a batch, in entry order.
    pub async fn for_batch(&self, batch_id: &str) -> DbResult<Vec<PaymentAllocation>> {
        let rows: Vec<AllocationRow> = sqlx::query_as(&format!(
            "SELECT {ALLOCATION_COLUMNS} FROM payment_allocations WHERE batch_id = ?1 ORDER BY seq"
        ))
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(PaymentAllocation::from).collect())
    }
}
