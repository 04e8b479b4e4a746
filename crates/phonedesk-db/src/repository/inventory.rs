//! # Inventory Repository
//!
//! Reads of inventory items and the catalog-side writes this engine
//! needs (inserting items for seeding/tests, manual reserve/release).
//!
//! ## Who Writes `status`
//! ```text
//! ┌──────────────────────────┬───────────────────────────────────────────┐
//! │ available ↔ reserved     │ set_status_if (this file, manual)         │
//! │ available/… → sold       │ TransitionRepository::sell (orchestrator) │
//! │ sold → previous          │ TransitionRepository::restore (reversal)  │
//! └──────────────────────────┴───────────────────────────────────────────┘
//! ```
//! There is deliberately no generic `update(item)` here.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use phonedesk_core::{InventoryItem, InventoryStatus, Money, TaxRate};

/// Columns selected for an item, joined with its brand name.
const ITEM_SELECT: &str = r#"
    SELECT
        i.id,
        i.brand_id,
        b.name AS brand_name,
        i.model,
        i.status,
        i.cost_price,
        i.selling_price,
        i.tax_rate_bps,
        i.is_tax_inclusive,
        i.is_tax_exempt,
        i.created_at,
        i.updated_at
    FROM inventory_items i
    LEFT JOIN brands b ON b.id = i.brand_id
"#;

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    id: String,
    brand_id: Option<String>,
    brand_name: Option<String>,
    model: String,
    status: InventoryStatus,
    cost_price: i64,
    selling_price: i64,
    tax_rate_bps: i64,
    is_tax_inclusive: bool,
    is_tax_exempt: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ItemRow> for InventoryItem {
    fn from(row: ItemRow) -> Self {
        InventoryItem {
            id: row.id,
            brand_id: row.brand_id,
            brand_name: row.brand_name,
            model: row.model,
            status: row.status,
            cost_price: Money::from_raw(row.cost_price),
            selling_price: Money::from_raw(row.selling_price),
            // CHECK constraint keeps this within 0..=10000
            tax_rate: TaxRate::from_bps(row.tax_rate_bps as u32),
            is_tax_inclusive: row.is_tax_inclusive,
            is_tax_exempt: row.is_tax_exempt,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Fields catalog management supplies when creating an item.
#[derive(Debug, Clone)]
pub struct NewInventoryItem {
    pub id: String,
    pub brand_id: Option<String>,
    pub model: String,
    pub cost_price: Money,
    pub selling_price: Money,
    pub tax_rate: TaxRate,
    pub is_tax_inclusive: bool,
    pub is_tax_exempt: bool,
}

impl NewInventoryItem {
    /// A taxless item priced at `selling_price` with cost `cost_price`.
    pub fn new(
        id: impl Into<String>,
        model: impl Into<String>,
        cost_price: Money,
        selling_price: Money,
    ) -> Self {
        NewInventoryItem {
            id: id.into(),
            brand_id: None,
            model: model.into(),
            cost_price,
            selling_price,
            tax_rate: TaxRate::zero(),
            is_tax_inclusive: false,
            is_tax_exempt: false,
        }
    }
}

/// Repository for inventory item operations.
#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl InventoryRepository {
    /// Creates a new InventoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    /// Inserts a brand, or renames it if the id exists.
    pub async fn upsert_brand(&self, id: &str, name: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO brands (id, name) VALUES (?1, ?2)
            ON CONFLICT(id) DO UPDATE SET name = excluded.name
            "#,
        )
        .bind(id)
        .bind(name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Inserts a location, or renames it if the id exists.
    pub async fn upsert_location(&self, id: &str, name: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO locations (id, name) VALUES (?1, ?2)
            ON CONFLICT(id) DO UPDATE SET name = excluded.name
            "#,
        )
        .bind(id)
        .bind(name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Inserts a new item in the AVAILABLE status.
    ///
    /// ## Returns
    /// * `Ok(InventoryItem)` - The stored item
    /// * `Err(DbError::UniqueViolation)` - id already exists
    pub async fn insert(&self, item: &NewInventoryItem) -> DbResult<InventoryItem> {
        debug!(item_id = %item.id, model = %item.model, "Inserting inventory item");

        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO inventory_items (
                id, brand_id, model, status,
                cost_price, selling_price,
                tax_rate_bps, is_tax_inclusive, is_tax_exempt,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, 'available', ?4, ?5, ?6, ?7, ?8, ?9, ?9)
            "#,
        )
        .bind(&item.id)
        .bind(&item.brand_id)
        .bind(&item.model)
        .bind(item.cost_price.raw())
        .bind(item.selling_price.raw())
        .bind(item.tax_rate.bps() as i64)
        .bind(item.is_tax_inclusive)
        .bind(item.is_tax_exempt)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.get_by_id(&item.id)
            .await?
            .ok_or_else(|| DbError::not_found("InventoryItem", &item.id))
    }

    /// Gets an item by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<InventoryItem>> {
        let row: Option<ItemRow> = sqlx::query_as(&format!("{ITEM_SELECT} WHERE i.id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(InventoryItem::from))
    }

    /// Gets every item whose id is in `ids`, in no particular order.
    ///
    /// Unknown ids are simply absent from the result.
    pub async fn get_many(&self, ids: &[String]) -> DbResult<Vec<InventoryItem>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("{ITEM_SELECT} WHERE i.id IN ("));
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id.as_str());
        }
        separated.push_unseparated(")");

        let rows: Vec<ItemRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(InventoryItem::from).collect())
    }

    /// Reads only the current status of an item.
    pub async fn read_status(&self, id: &str) -> DbResult<Option<InventoryStatus>> {
        let status: Option<InventoryStatus> =
            sqlx::query_scalar("SELECT status FROM inventory_items WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(status)
    }

    /// Moves an item from `expected` to `to` in one conditional update.
    ///
    /// Callers are responsible for checking the transition is one they
    /// are allowed to make; this only guarantees nobody moved the item
    /// in between.
    ///
    /// ## Returns
    /// * `Err(DbError::Conflict)` - the item is no longer in `expected`
    /// * `Err(DbError::NotFound)` - no such item
    pub async fn set_status_if(
        &self,
        id: &str,
        expected: InventoryStatus,
        to: InventoryStatus,
    ) -> DbResult<()> {
        debug!(item_id = %id, from = %expected, to = %to, "Conditional status update");

        let result = sqlx::query(
            r#"
            UPDATE inventory_items
            SET status = ?3, updated_at = ?4
            WHERE id = ?1 AND status = ?2
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(to)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.read_status(id).await? {
                Some(actual) => Err(DbError::conflict(id, expected, Some(actual))),
                None => Err(DbError::not_found("InventoryItem", id)),
            };
        }

        Ok(())
    }

    /// Counts items, optionally only those in one status.
    pub async fn count(&self, status: Option<InventoryStatus>) -> DbResult<i64> {
        let count: i64 = match status {
            Some(status) => {
                sqlx::query_scalar("SELECT COUNT(*) FROM inventory_items WHERE status = ?1")
                    .bind(status)
                    .fetch_one(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_scalar("SELECT COUNT(*) FROM inventory_items")
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_get_with_brand() {
        let db = setup().await;
        let repo = db.inventory();
        repo.upsert_brand("apple", "Apple").await.unwrap();

        let mut new_item = NewInventoryItem::new(
            "ip15-001",
            "iPhone 15 128GB",
            Money::from_units(700),
            Money::from_units(899),
        );
        new_item.brand_id = Some("apple".to_string());
        new_item.tax_rate = TaxRate::from_bps(1700);
        new_item.is_tax_inclusive = true;

        let item = repo.insert(&new_item).await.unwrap();
        assert_eq!(item.status, InventoryStatus::Available);
        assert_eq!(item.brand_name.as_deref(), Some("Apple"));
        assert_eq!(item.selling_price, Money::from_units(899));
        assert_eq!(item.tax_rate.bps(), 1700);
        assert!(item.is_tax_inclusive);

        assert!(repo.get_by_id("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_id_is_unique_violation() {
        let db = setup().await;
        let item = NewInventoryItem::new("dup", "Case", Money::from_units(2), Money::from_units(5));
        db.inventory().insert(&item).await.unwrap();

        let err = db.inventory().insert(&item).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_get_many_skips_unknown() {
        let db = setup().await;
        let repo = db.inventory();
        for id in ["a", "b", "c"] {
            repo.insert(&NewInventoryItem::new(id, "Charger", Money::from_units(3), Money::from_units(9)))
                .await
                .unwrap();
        }

        let ids = vec!["a".to_string(), "c".to_string(), "zzz".to_string()];
        let mut found: Vec<String> = repo.get_many(&ids).await.unwrap().into_iter().map(|i| i.id).collect();
        found.sort();
        assert_eq!(found, vec!["a", "c"]);

        assert!(repo.get_many(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_status_if() {
        let db = setup().await;
        let repo = db.inventory();
        repo.insert(&NewInventoryItem::new("p", "Pixel 8", Money::from_units(400), Money::from_units(599)))
            .await
            .unwrap();

        repo.set_status_if("p", InventoryStatus::Available, InventoryStatus::Reserved)
            .await
            .unwrap();
        assert_eq!(repo.read_status("p").await.unwrap(), Some(InventoryStatus::Reserved));

        let err = repo
            .set_status_if("p", InventoryStatus::Available, InventoryStatus::Reserved)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Conflict { actual: Some(InventoryStatus::Reserved), .. }
        ));

        let err = repo
            .set_status_if("ghost", InventoryStatus::Available, InventoryStatus::Reserved)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));

        assert_eq!(repo.count(Some(InventoryStatus::Reserved)).await.unwrap(), 1);
        assert_eq!(repo.count(None).await.unwrap(), 1);
    }
}
