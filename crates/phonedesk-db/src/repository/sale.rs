//! # Sale Repository
//!
//! Read side of the sales table plus the metadata-only update.
//!
//! Sale rows are created exclusively by [`TransitionRepository`] inside the
//! same transaction that flips the item to SOLD, and `reverted_at` is only
//! set by the restore path. Everything here either reads, or edits fields
//! that carry no inventory or payment meaning.
//!
//! ## Reporting Rule
//! Every listing and aggregate excludes reverted sales unless the filter
//! explicitly asks for them. `get_by_id` always returns the row.
//!
//! [`TransitionRepository`]: super::transition::TransitionRepository

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use phonedesk_core::{Money, PaymentMethod, PaymentSummaryEntry, Sale, TaxRate};

// =============================================================================
// Row Mapping
// =============================================================================

pub(crate) const SALE_COLUMNS: &str = r#"
    s.id,
    s.item_id,
    s.batch_id,
    s.sale_date,
    s.sale_price,
    s.cost_price,
    s.buyer_name,
    s.buyer_phone,
    s.buyer_email,
    s.notes,
    s.tax_rate_bps,
    s.tax_amount,
    s.base_price,
    s.payment_summary,
    s.is_split_payment,
    s.primary_payment_method,
    s.location_id,
    s.created_at,
    s.updated_at,
    s.reverted_at
"#;

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SaleRow {
    id: String,
    item_id: String,
    batch_id: Option<String>,
    sale_date: NaiveDate,
    sale_price: i64,
    cost_price: i64,
    buyer_name: Option<String>,
    buyer_phone: Option<String>,
    buyer_email: Option<String>,
    notes: Option<String>,
    tax_rate_bps: i64,
    tax_amount: i64,
    base_price: i64,
    payment_summary: String,
    is_split_payment: bool,
    primary_payment_method: Option<PaymentMethod>,
    location_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    reverted_at: Option<DateTime<Utc>>,
}

impl TryFrom<SaleRow> for Sale {
    type Error = DbError;

    fn try_from(row: SaleRow) -> Result<Self, Self::Error> {
        let payment_summary: Vec<PaymentSummaryEntry> = serde_json::from_str(&row.payment_summary)?;

        Ok(Sale {
            id: row.id,
            item_id: row.item_id,
            batch_id: row.batch_id,
            sale_date: row.sale_date,
            sale_price: Money::from_raw(row.sale_price),
            cost_price: Money::from_raw(row.cost_price),
            buyer_name: row.buyer_name,
            buyer_phone: row.buyer_phone,
            buyer_email: row.buyer_email,
            notes: row.notes,
            tax_rate: TaxRate::from_bps(row.tax_rate_bps as u32),
            tax_amount: Money::from_raw(row.tax_amount),
            base_price: Money::from_raw(row.base_price),
            payment_summary,
            is_split_payment: row.is_split_payment,
            primary_payment_method: row.primary_payment_method,
            location_id: row.location_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            reverted_at: row.reverted_at,
        })
    }
}

fn into_sales(rows: Vec<SaleRow>) -> DbResult<Vec<Sale>> {
    rows.into_iter().map(Sale::try_from).collect()
}

#[derive(Debug, sqlx::FromRow)]
struct SaleDetailsRow {
    #[sqlx(flatten)]
    sale: SaleRow,
    item_model: Option<String>,
    brand_name: Option<String>,
    location_name: Option<String>,
}

// =============================================================================
// Public Types
// =============================================================================

/// A sale with the display names of its item, brand and location.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleDetails {
    #[serde(flatten)]
    pub sale: Sale,
    pub item_model: Option<String>,
    pub brand_name: Option<String>,
    pub location_name: Option<String>,
}

/// Filter for sale listings and aggregates.
///
/// Dates are inclusive on both ends.
#[derive(Debug, Clone, Default)]
pub struct SaleFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub location_id: Option<String>,
    pub include_reverted: bool,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl SaleFilter {
    /// Sales between two dates, inclusive.
    pub fn date_range(start: NaiveDate, end: NaiveDate) -> Self {
        SaleFilter {
            start_date: Some(start),
            end_date: Some(end),
            ..Default::default()
        }
    }

    /// Sales made at one location.
    pub fn location(location_id: impl Into<String>) -> Self {
        SaleFilter {
            location_id: Some(location_id.into()),
            ..Default::default()
        }
    }

    fn push_where(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        builder.push(" WHERE 1 = 1");
        if !self.include_reverted {
            builder.push(" AND s.reverted_at IS NULL");
        }
        if let Some(start) = self.start_date {
            builder.push(" AND s.sale_date >= ").push_bind(start);
        }
        if let Some(end) = self.end_date {
            builder.push(" AND s.sale_date <= ").push_bind(end);
        }
        if let Some(location_id) = &self.location_id {
            builder.push(" AND s.location_id = ").push_bind(location_id.clone());
        }
    }
}

/// Corrections to a recorded sale.
///
/// `None` leaves a field unchanged. Inventory, cost, tax snapshot and
/// payments are not editable through this path.
#[derive(Debug, Clone, Default)]
pub struct SaleUpdate {
    pub sale_date: Option<NaiveDate>,
    pub sale_price: Option<Money>,
    pub buyer_name: Option<String>,
    pub buyer_phone: Option<String>,
    pub buyer_email: Option<String>,
    pub notes: Option<String>,
}

/// Totals over a set of non-reverted sales.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SaleTotals {
    pub count: i64,
    pub revenue: Money,
    pub cost: Money,
    pub tax: Money,
}

impl SaleTotals {
    pub fn profit(&self) -> Money {
        self.revenue - self.cost
    }
}

/// Sales count and revenue for one calendar month.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthlyTotals {
    /// 1-12.
    pub month: u32,
    pub count: i64,
    pub revenue: Money,
    pub cost: Money,
}

#[derive(Debug, sqlx::FromRow)]
struct TotalsRow {
    count: i64,
    revenue: i64,
    cost: i64,
    tax: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct MonthRow {
    month: i64,
    count: i64,
    revenue: i64,
    cost: i64,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for sale reads and metadata corrections.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale by ID, reverted or not.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let row: Option<SaleRow> =
            sqlx::query_as(&format!("SELECT {SALE_COLUMNS} FROM sales s WHERE s.id = ?1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(Sale::try_from).transpose()
    }

    /// Gets a sale joined with item model, brand and location names.
    pub async fn get_details(&self, id: &str) -> DbResult<Option<SaleDetails>> {
        let row: Option<SaleDetailsRow> = sqlx::query_as(&format!(
            r#"
            SELECT {SALE_COLUMNS},
                i.model AS item_model,
                b.name AS brand_name,
                l.name AS location_name
            FROM sales s
            LEFT JOIN inventory_items i ON i.id = s.item_id
            LEFT JOIN brands b ON b.id = i.brand_id
            LEFT JOIN locations l ON l.id = s.location_id
            WHERE s.id = ?1
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            Ok(SaleDetails {
                sale: Sale::try_from(r.sale)?,
                item_model: r.item_model,
                brand_name: r.brand_name,
                location_name: r.location_name,
            })
        })
        .transpose()
    }

    /// Lists sales matching the filter, newest first.
    pub async fn list(&self, filter: &SaleFilter) -> DbResult<Vec<Sale>> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {SALE_COLUMNS} FROM sales s"));
        filter.push_where(&mut builder);
        builder.push(" ORDER BY s.sale_date DESC, s.created_at DESC, s.id");

        if let Some(limit) = filter.limit {
            builder.push(" LIMIT ").push_bind(limit as i64);
            if let Some(offset) = filter.offset {
                builder.push(" OFFSET ").push_bind(offset as i64);
            }
        }

        let rows: Vec<SaleRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        into_sales(rows)
    }

    /// Lists every sale created by one batch.
    pub async fn list_by_batch(&self, batch_id: &str) -> DbResult<Vec<Sale>> {
        let rows: Vec<SaleRow> = sqlx::query_as(&format!(
            "SELECT {SALE_COLUMNS} FROM sales s WHERE s.batch_id = ?1 ORDER BY s.created_at, s.id"
        ))
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await?;

        into_sales(rows)
    }

    /// Number of non-reverted sales of one item.
    ///
    /// More than one only happens after an oversell.
    pub async fn count_live_for_item(&self, item_id: &str) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sales WHERE item_id = ?1 AND reverted_at IS NULL")
                .bind(item_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    /// Non-reverted sales whose buyer phone digits contain `digits`.
    ///
    /// `digits` must already be normalized to digits only.
    pub async fn find_by_buyer_phone(&self, digits: &str) -> DbResult<Vec<Sale>> {
        debug!(digits = %digits, "Searching sales by buyer phone");

        let rows: Vec<SaleRow> = sqlx::query_as(&format!(
            r#"
            SELECT {SALE_COLUMNS} FROM sales s
            WHERE s.reverted_at IS NULL
              AND s.buyer_phone_digits LIKE '%' || ?1 || '%'
            ORDER BY s.sale_date DESC, s.created_at DESC
            "#
        ))
        .bind(digits)
        .fetch_all(&self.pool)
        .await?;

        into_sales(rows)
    }

    /// Count, revenue, cost and tax of the sales matching the filter.
    ///
    /// `limit`/`offset` are ignored.
    pub async fn totals(&self, filter: &SaleFilter) -> DbResult<SaleTotals> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT
                COUNT(*) AS count,
                COALESCE(SUM(s.sale_price), 0) AS revenue,
                COALESCE(SUM(s.cost_price), 0) AS cost,
                COALESCE(SUM(s.tax_amount), 0) AS tax
            FROM sales s
            "#,
        );
        filter.push_where(&mut builder);

        let row: TotalsRow = builder.build_query_as().fetch_one(&self.pool).await?;
        Ok(SaleTotals {
            count: row.count,
            revenue: Money::from_raw(row.revenue),
            cost: Money::from_raw(row.cost),
            tax: Money::from_raw(row.tax),
        })
    }

    /// Per-month totals for a calendar year; always twelve entries.
    pub async fn monthly_totals(&self, year: i32) -> DbResult<Vec<MonthlyTotals>> {
        let start = NaiveDate::from_ymd_opt(year, 1, 1)
            .ok_or_else(|| DbError::Internal(format!("invalid year {year}")))?;
        let end = NaiveDate::from_ymd_opt(year, 12, 31)
            .ok_or_else(|| DbError::Internal(format!("invalid year {year}")))?;

        let rows: Vec<MonthRow> = sqlx::query_as(
            r#"
            SELECT
                CAST(strftime('%m', sale_date) AS INTEGER) AS month,
                COUNT(*) AS count,
                COALESCE(SUM(sale_price), 0) AS revenue,
                COALESCE(SUM(cost_price), 0) AS cost
            FROM sales
            WHERE reverted_at IS NULL AND sale_date >= ?1 AND sale_date <= ?2
            GROUP BY month
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        let mut months: Vec<MonthlyTotals> = (1..=12)
            .map(|month| MonthlyTotals {
                month,
                count: 0,
                revenue: Money::zero(),
                cost: Money::zero(),
            })
            .collect();

        for row in rows {
            if let Some(slot) = months.get_mut((row.month as usize).wrapping_sub(1)) {
                slot.count = row.count;
                slot.revenue = Money::from_raw(row.revenue);
                slot.cost = Money::from_raw(row.cost);
            }
        }

        Ok(months)
    }

    /// Applies metadata corrections to a live sale.
    ///
    /// ## Returns
    /// * `Ok(Sale)` - The updated sale
    /// * `Err(DbError::NotFound)` - no such sale
    /// * `Err(DbError::AlreadyReverted)` - reverted sales are frozen
    pub async fn update_metadata(&self, id: &str, update: &SaleUpdate) -> DbResult<Sale> {
        debug!(sale_id = %id, "Updating sale metadata");

        let phone_digits = update
            .buyer_phone
            .as_deref()
            .map(phonedesk_core::validation::phone_digits);

        let result = sqlx::query(
            r#"
            UPDATE sales SET
                sale_date = COALESCE(?2, sale_date),
                sale_price = COALESCE(?3, sale_price),
                buyer_name = COALESCE(?4, buyer_name),
                buyer_phone = COALESCE(?5, buyer_phone),
                buyer_phone_digits = COALESCE(?6, buyer_phone_digits),
                buyer_email = COALESCE(?7, buyer_email),
                notes = COALESCE(?8, notes),
                updated_at = ?9
            WHERE id = ?1 AND reverted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(update.sale_date)
        .bind(update.sale_price.map(|p| p.raw()))
        .bind(&update.buyer_name)
        .bind(&update.buyer_phone)
        .bind(phone_digits)
        .bind(&update.buyer_email)
        .bind(&update.notes)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.get_by_id(id).await? {
                Some(_) => Err(DbError::AlreadyReverted {
                    sale_id: id.to_string(),
                }),
                None => Err(DbError::not_found("Sale", id)),
            };
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", id))
    }
}

/// First and last day of the month containing `date`.
pub fn month_bounds(date: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let first = date.with_day(1)?;
    let next = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)?
    };
    Some((first, next.pred_opt()?))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::inventory::NewInventoryItem;
    use crate::repository::transition::{RestoreRequest, SaleWrite, TransitionRequest};
    use crate::{Database, DbConfig};
    use phonedesk_core::{BuyerInfo, InventoryStatus, PaymentPlan};

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn sell(db: &Database, item_id: &str, date: NaiveDate, units: i64, phone: Option<&str>) -> Sale {
        db.inventory()
            .insert(&NewInventoryItem::new(
                item_id,
                "Galaxy A55",
                Money::from_units(units / 2),
                Money::from_units(units),
            ))
            .await
            .unwrap();

        let sale = SaleWrite {
            sale_id: format!("sale-{item_id}"),
            item_id: item_id.to_string(),
            expected_status: InventoryStatus::Available,
            sale_date: date,
            sale_price: Money::from_units(units),
            buyer: BuyerInfo {
                name: Some("Amira".to_string()),
                phone: phone.map(str::to_string),
                email: None,
            },
            notes: None,
            location_id: None,
        };
        db.transitions()
            .sell(&TransitionRequest {
                sale,
                payments: PaymentPlan::default(),
                actor: None,
                note: None,
            })
            .await
            .unwrap()
            .sale
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_list_by_date_range() {
        let db = setup().await;
        sell(&db, "a", date(2025, 1, 10), 100, None).await;
        sell(&db, "b", date(2025, 2, 10), 200, None).await;
        sell(&db, "c", date(2025, 3, 10), 300, None).await;

        let sales = db
            .sales()
            .list(&SaleFilter::date_range(date(2025, 2, 1), date(2025, 3, 10)))
            .await
            .unwrap();
        let ids: Vec<&str> = sales.iter().map(|s| s.item_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b"]);
    }

    #[tokio::test]
    async fn test_find_by_buyer_phone_uses_digits() {
        let db = setup().await;
        sell(&db, "a", date(2025, 1, 10), 100, Some("+1 (555) 010-2030")).await;
        sell(&db, "b", date(2025, 1, 11), 100, Some("555-999-0000")).await;

        let found = db.sales().find_by_buyer_phone("0102030").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].item_id, "a");
    }

    #[tokio::test]
    async fn test_totals_and_monthly() {
        let db = setup().await;
        sell(&db, "a", date(2025, 1, 10), 100, None).await;
        sell(&db, "b", date(2025, 1, 20), 200, None).await;
        sell(&db, "c", date(2025, 4, 1), 50, None).await;

        let totals = db.sales().totals(&SaleFilter::default()).await.unwrap();
        assert_eq!(totals.count, 3);
        assert_eq!(totals.revenue, Money::from_units(350));
        assert_eq!(totals.cost, Money::from_units(175));
        assert_eq!(totals.profit(), Money::from_units(175));

        let months = db.sales().monthly_totals(2025).await.unwrap();
        assert_eq!(months.len(), 12);
        assert_eq!(months[0].count, 2);
        assert_eq!(months[0].revenue, Money::from_units(300));
        assert_eq!(months[3].count, 1);
        assert_eq!(months[11].count, 0);
    }

    #[tokio::test]
    async fn test_count_live_for_item_skips_reverted() {
        let db = setup().await;
        let sale = sell(&db, "a", date(2025, 1, 10), 100, None).await;
        assert_eq!(db.sales().count_live_for_item("a").await.unwrap(), 1);
        assert_eq!(db.sales().count_live_for_item("missing").await.unwrap(), 0);

        db.transitions()
            .restore(&RestoreRequest {
                sale_id: sale.id.clone(),
                item_id: "a".to_string(),
                expected_status: InventoryStatus::Sold,
                restore_to: InventoryStatus::Available,
                actor: None,
                note: None,
            })
            .await
            .unwrap();
        assert_eq!(db.sales().count_live_for_item("a").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_metadata() {
        let db = setup().await;
        let sale = sell(&db, "a", date(2025, 1, 10), 100, None).await;

        let updated = db
            .sales()
            .update_metadata(
                &sale.id,
                &SaleUpdate {
                    buyer_phone: Some("0300 1234567".to_string()),
                    notes: Some("screen protector included".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.buyer_name.as_deref(), Some("Amira"));
        assert_eq!(updated.buyer_phone.as_deref(), Some("0300 1234567"));
        assert_eq!(updated.notes.as_deref(), Some("screen protector included"));
        assert_eq!(updated.sale_price, sale.sale_price);

        let found = db.sales().find_by_buyer_phone("1234567").await.unwrap();
        assert_eq!(found.len(), 1);

        let err = db
            .sales()
            .update_metadata("missing", &SaleUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[test]
    fn test_month_bounds() {
        assert_eq!(
            month_bounds(date(2024, 2, 15)),
            Some((date(2024, 2, 1), date(2024, 2, 29)))
        );
        assert_eq!(
            month_bounds(date(2025, 12, 3)),
            Some((date(2025, 12, 1), date(2025, 12, 31)))
        );
    }
}
