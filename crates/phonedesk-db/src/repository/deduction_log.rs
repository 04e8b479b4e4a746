//! # Deduction Log Repository
//!
//! The inventory deduction log is the audit trail of every status change
//! made by a sale or a reversal. The table is append-only: triggers abort
//! any UPDATE or DELETE, so this module only ever inserts and reads.
//!
//! Ordering uses the `seq` autoincrement column rather than timestamps,
//! two entries written in the same millisecond still have a defined order.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::DbResult;
use phonedesk_core::{DeductionLogEntry, InventoryStatus, LogKind};

const LOG_COLUMNS: &str =
    "id, sale_id, item_id, previous_status, new_status, kind, actor, notes, logged_at";

#[derive(Debug, sqlx::FromRow)]
struct LogRow {
    id: String,
    sale_id: Option<String>,
    item_id: String,
    previous_status: InventoryStatus,
    new_status: InventoryStatus,
    kind: LogKind,
    actor: Option<String>,
    notes: Option<String>,
    logged_at: DateTime<Utc>,
}

impl From<LogRow> for DeductionLogEntry {
    fn from(row: LogRow) -> Self {
        DeductionLogEntry {
            id: row.id,
            sale_id: row.sale_id,
            item_id: row.item_id,
            previous_status: row.previous_status,
            new_status: row.new_status,
            kind: row.kind,
            actor: row.actor,
            notes: row.notes,
            logged_at: row.logged_at,
        }
    }
}

/// Appends one entry on an open transaction.
pub(crate) async fn append_entry(conn: &mut SqliteConnection, entry: &DeductionLogEntry) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO inventory_deduction_logs (
            id, sale_id, item_id, previous_status, new_status, kind, actor, notes, logged_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.sale_id)
    .bind(&entry.item_id)
    .bind(entry.previous_status)
    .bind(entry.new_status)
    .bind(entry.kind)
    .bind(&entry.actor)
    .bind(&entry.notes)
    .bind(entry.logged_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Repository for deduction log reads.
#[derive(Debug, Clone)]
pub struct DeductionLogRepository {
    pool: SqlitePool,
}

impl DeductionLogRepository {
    /// Creates a new DeductionLogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        DeductionLogRepository { pool }
    }

    /// Most recent entry written for a sale.
    ///
    /// A deduction means the sale is live; a restoration means it has
    /// already been reverted.
    pub async fn last_for_sale(&self, sale_id: &str) -> DbResult<Option<DeductionLogEntry>> {
        let row: Option<LogRow> = sqlx::query_as(&format!(
            "SELECT {LOG_COLUMNS} FROM inventory_deduction_logs WHERE sale_id = ?1 ORDER BY seq DESC LIMIT 1"
        ))
        .bind(sale_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(DeductionLogEntry::from))
    }

    /// Every entry for a sale, oldest first.
    pub async fn for_sale(&self, sale_id: &str) -> DbResult<Vec<DeductionLogEntry>> {
        let rows: Vec<LogRow> = sqlx::query_as(&format!(
            "SELECT {LOG_COLUMNS} FROM inventory_deduction_logs WHERE sale_id = ?1 ORDER BY seq"
        ))
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(DeductionLogEntry::from).collect())
    }

    /// Every entry for an item, newest first.
    pub async fn for_item(&self, item_id: &str) -> DbResult<Vec<DeductionLogEntry>> {
        let rows: Vec<LogRow> = sqlx::query_as(&format!(
            "SELECT {LOG_COLUMNS} FROM inventory_deduction_logs WHERE item_id = ?1 ORDER BY seq DESC"
        ))
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(DeductionLogEntry::from).collect())
    }

    /// Total number of entries.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM inventory_deduction_logs")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
