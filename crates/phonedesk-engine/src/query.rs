//! # Sale Query Layer
//!
//! Read-only projections for reporting screens. Nothing here writes, and
//! nothing takes a lock: reads run beside the orchestrator and may trail
//! a just-committed sale by one round-trip.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use phonedesk_core::validation::{validate_id, validate_phone_search, validate_year};
use phonedesk_core::{DeductionLogEntry, Money, PaymentAllocation, Sale, ValidationError};
use phonedesk_db::repository::sale::month_bounds;
use phonedesk_db::{Database, MonthlyTotals, SaleDetails, SaleFilter};

use crate::error::{EngineError, EngineResult};
use crate::orchestrator::SaleEngine;

// =============================================================================
// Projections
// =============================================================================

/// A buyer's purchases, found by phone number.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerHistory {
    /// The digits searched for.
    pub phone: String,
    /// From the most recent sale.
    pub name: Option<String>,
    pub email: Option<String>,
    /// Most recent first.
    pub transactions: Vec<Sale>,
    pub total_spent: Money,
    pub transaction_count: usize,
}

/// Totals over a date range, reverted sales excluded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleSummary {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub count: i64,
    pub revenue: Money,
    pub cost: Money,
    pub profit: Money,
    pub tax: Money,
    /// profit / revenue × 100, two decimals; 0 without revenue.
    pub average_margin_percent: f64,
}

/// One month of [`SaleQueries::monthly_sales`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySales {
    pub month: u32,
    pub count: i64,
    pub revenue: Money,
    pub profit: Money,
}

impl From<MonthlyTotals> for MonthlySales {
    fn from(totals: MonthlyTotals) -> Self {
        MonthlySales {
            month: totals.month,
            count: totals.count,
            revenue: totals.revenue,
            profit: totals.revenue - totals.cost,
        }
    }
}

fn margin_percent(profit: Money, revenue: Money) -> f64 {
    if !revenue.is_positive() {
        return 0.0;
    }
    let pct = profit.raw() as f64 / revenue.raw() as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}

// =============================================================================
// Queries
// =============================================================================

/// Read-only access to recorded sales.
#[derive(Debug, Clone)]
pub struct SaleQueries {
    db: Database,
}

impl SaleEngine<Database> {
    /// Query layer over the same database.
    pub fn queries(&self) -> SaleQueries {
        SaleQueries::new(self.store().clone())
    }
}

impl SaleQueries {
    pub fn new(db: Database) -> Self {
        SaleQueries { db }
    }

    /// A sale with item, brand and location display names.
    pub async fn sale_by_id(&self, sale_id: &str) -> EngineResult<SaleDetails> {
        let sale_id = sale_id.trim();
        validate_id("sale_id", sale_id)?;

        self.db
            .sales()
            .get_details(sale_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Sale", sale_id))
    }

    /// Live sales between two dates, inclusive, newest first.
    pub async fn sales_by_date_range(&self, start: NaiveDate, end: NaiveDate) -> EngineResult<Vec<Sale>> {
        check_range(start, end)?;
        Ok(self.db.sales().list(&SaleFilter::date_range(start, end)).await?)
    }

    /// Live sales made at one location, newest first.
    pub async fn sales_by_location(&self, location_id: &str) -> EngineResult<Vec<Sale>> {
        let location_id = location_id.trim();
        validate_id("location_id", location_id)?;
        Ok(self.db.sales().list(&SaleFilter::location(location_id)).await?)
    }

    /// Every sale a batch produced, reverted ones included.
    pub async fn sales_in_batch(&self, batch_id: &str) -> EngineResult<Vec<Sale>> {
        let batch_id = batch_id.trim();
        validate_id("batch_id", batch_id)?;
        Ok(self.db.sales().list_by_batch(batch_id).await?)
    }

    /// Purchases whose buyer phone contains the digits of `phone`.
    ///
    /// "(555) 010-1010" and "5550101010" find the same buyer.
    pub async fn customer_history(&self, phone: &str) -> EngineResult<CustomerHistory> {
        let digits = validate_phone_search(phone)?;
        let transactions = self.db.sales().find_by_buyer_phone(&digits).await?;

        debug!(digits = %digits, found = transactions.len(), "Customer history");

        let latest = transactions.first();
        Ok(CustomerHistory {
            name: latest.and_then(|s| s.buyer_name.clone()),
            email: latest.and_then(|s| s.buyer_email.clone()),
            total_spent: transactions.iter().map(|s| s.sale_price).sum(),
            transaction_count: transactions.len(),
            phone: digits,
            transactions,
        })
    }

    /// Twelve entries for `year`, months without sales included.
    pub async fn monthly_sales(&self, year: i32) -> EngineResult<Vec<MonthlySales>> {
        validate_year(year)?;
        let months = self.db.sales().monthly_totals(year).await?;
        Ok(months.into_iter().map(MonthlySales::from).collect())
    }

    pub async fn sale_summary(&self, start: NaiveDate, end: NaiveDate) -> EngineResult<SaleSummary> {
        check_range(start, end)?;
        let totals = self.db.sales().totals(&SaleFilter::date_range(start, end)).await?;

        Ok(SaleSummary {
            start_date: start,
            end_date: end,
            count: totals.count,
            revenue: totals.revenue,
            cost: totals.cost,
            profit: totals.profit(),
            tax: totals.tax,
            average_margin_percent: margin_percent(totals.profit(), totals.revenue),
        })
    }

    /// [`sale_summary`](Self::sale_summary) for the month containing `today`.
    pub async fn current_month_summary(&self, today: NaiveDate) -> EngineResult<SaleSummary> {
        let (start, end) = month_bounds(today).ok_or_else(|| ValidationError::InvalidFormat {
            field: "date".to_string(),
            reason: format!("no month bounds for {today}"),
        })?;
        self.sale_summary(start, end).await
    }

    /// Audit trail of one item, most recent first.
    pub async fn deduction_log_for_item(&self, item_id: &str) -> EngineResult<Vec<DeductionLogEntry>> {
        let item_id = item_id.trim();
        validate_id("item_id", item_id)?;
        Ok(self.db.deduction_logs().for_item(item_id).await?)
    }

    /// Audit trail of one sale, oldest first.
    pub async fn deduction_log_for_sale(&self, sale_id: &str) -> EngineResult<Vec<DeductionLogEntry>> {
        let sale_id = sale_id.trim();
        validate_id("sale_id", sale_id)?;
        Ok(self.db.deduction_logs().for_sale(sale_id).await?)
    }

    /// Allocation rows paying for a sale, its batch's rows for batch sales.
    pub async fn payments_for_sale(&self, sale_id: &str) -> EngineResult<Vec<PaymentAllocation>> {
        let sale_id = sale_id.trim();
        validate_id("sale_id", sale_id)?;
        Ok(self.db.payments().for_sale(sale_id).await?)
    }
}

fn check_range(start: NaiveDate, end: NaiveDate) -> EngineResult<()> {
    if start > end {
        return Err(ValidationError::InvalidFormat {
            field: "date_range".to_string(),
            reason: format!("start {start} is after end {end}"),
        }
        .into());
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::{BatchItem, BatchSaleRequest, CompleteSaleRequest};
    use crate::error::ErrorCode;
    use crate::orchestrator::SalePolicy;
    use phonedesk_core::{BuyerInfo, PaymentLine, PaymentMethod};
    use phonedesk_db::{DbConfig, NewInventoryItem};

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    async fn setup() -> SaleEngine {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let inventory = db.inventory();
        inventory.upsert_brand("samsung", "Samsung").await.unwrap();
        inventory.upsert_location("main", "Main Street").await.unwrap();
        for (id, cost, price) in [("s24-1", 600, 800), ("s24-2", 600, 800), ("a15-1", 150, 200), ("a15-2", 150, 200)] {
            let mut item = NewInventoryItem::new(id, "Galaxy", Money::from_units(cost), Money::from_units(price));
            item.brand_id = Some("samsung".to_string());
            inventory.insert(&item).await.unwrap();
        }
        SaleEngine::new(db, SalePolicy::default())
    }

    fn buyer(phone: &str) -> BuyerInfo {
        BuyerInfo {
            name: Some("Lee".to_string()),
            phone: Some(phone.to_string()),
            email: Some("lee@example.com".to_string()),
        }
    }

    #[tokio::test]
    async fn test_sale_by_id_has_display_fields() {
        let engine = setup().await;
        let result = engine
            .complete_sale(CompleteSaleRequest::new("s24-1", date(3, 1), Money::from_units(800)).with_location("main"))
            .await
            .unwrap();

        let details = engine.queries().sale_by_id(&result.sale_id.unwrap()).await.unwrap();
        assert_eq!(details.item_model.as_deref(), Some("Galaxy"));
        assert_eq!(details.brand_name.as_deref(), Some("Samsung"));
        assert_eq!(details.location_name.as_deref(), Some("Main Street"));

        let err = engine.queries().sale_by_id("missing").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_customer_history_ignores_formatting() {
        let engine = setup().await;
        for (item, day, phone) in [("s24-1", 1, "(555) 010-1010"), ("a15-1", 9, "555.010.1010"), ("a15-2", 5, "999")] {
            engine
                .complete_sale(
                    CompleteSaleRequest::new(item, date(3, day), Money::from_units(200)).with_buyer(buyer(phone)),
                )
                .await
                .unwrap();
        }

        let history = engine.queries().customer_history("555-010-1010").await.unwrap();
        assert_eq!(history.phone, "5550101010");
        assert_eq!(history.transaction_count, 2);
        assert_eq!(history.total_spent, Money::from_units(400));
        assert_eq!(history.transactions[0].sale_date, date(3, 9));
        assert_eq!(history.name.as_deref(), Some("Lee"));

        let err = engine.queries().customer_history("n/a").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_summary_and_monthly_exclude_reverted() {
        let engine = setup().await;
        engine
            .complete_sale(CompleteSaleRequest::new("s24-1", date(3, 1), Money::from_units(800)))
            .await
            .unwrap();
        engine
            .complete_sale(CompleteSaleRequest::new("a15-1", date(3, 20), Money::from_units(200)))
            .await
            .unwrap();
        let returned = engine
            .complete_sale(CompleteSaleRequest::new("s24-2", date(3, 21), Money::from_units(800)))
            .await
            .unwrap();
        engine.revert_sale(&returned.sale_id.unwrap()).await.unwrap();

        let summary = engine.queries().current_month_summary(date(3, 15)).await.unwrap();
        assert_eq!(summary.start_date, date(3, 1));
        assert_eq!(summary.end_date, date(3, 31));
        assert_eq!(summary.count, 2);
        assert_eq!(summary.revenue, Money::from_units(1000));
        assert_eq!(summary.profit, Money::from_units(250));
        assert_eq!(summary.average_margin_percent, 25.0);

        let months = engine.queries().monthly_sales(2024).await.unwrap();
        assert_eq!(months.len(), 12);
        assert_eq!(months[2].count, 2);
        assert_eq!(months[0].count, 0);

        let err = engine.queries().sale_summary(date(4, 1), date(3, 1)).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_batch_payments_resolve_from_any_sale() {
        let engine = setup().await;
        let result = engine
            .complete_batch_sale(
                BatchSaleRequest::new(
                    vec![
                        BatchItem::new("a15-1", Money::from_units(200)),
                        BatchItem::new("a15-2", Money::from_units(200)),
                    ],
                    date(6, 1),
                )
                .with_payments(vec![
                    PaymentLine::new(PaymentMethod::Cash, Money::from_units(100)),
                    PaymentLine::card(Money::from_units(300), "9876"),
                ]),
            )
            .await
            .unwrap();

        let queries = engine.queries();
        let sale_id = &result.sales[1].sale.id;
        let payments = queries.payments_for_sale(sale_id).await.unwrap();
        assert_eq!(payments.len(), 2);
        assert_eq!(payments[1].card_last_four.as_deref(), Some("9876"));

        let in_batch = queries.sales_in_batch(result.batch_id.as_deref().unwrap()).await.unwrap();
        assert_eq!(in_batch.len(), 2);
    }

    #[tokio::test]
    async fn test_deduction_log_by_item() {
        let engine = setup().await;
        let sale = engine
            .complete_sale(CompleteSaleRequest::new("s24-1", date(3, 1), Money::from_units(800)))
            .await
            .unwrap();
        engine.revert_sale(sale.sale_id.as_deref().unwrap()).await.unwrap();

        let log = engine.queries().deduction_log_for_item("s24-1").await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].kind, phonedesk_core::LogKind::Restoration);
        assert_eq!(log[1].kind, phonedesk_core::LogKind::Deduction);
    }

    #[test]
    fn test_margin_percent() {
        assert_eq!(margin_percent(Money::from_units(1), Money::from_units(3)), 33.33);
        assert_eq!(margin_percent(Money::zero(), Money::zero()), 0.0);
    }
}
