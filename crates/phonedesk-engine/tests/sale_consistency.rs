//! End-to-end consistency checks against a file-backed SQLite database
//! with a real connection pool.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use phonedesk_core::{
    DeductionLogEntry, InventoryItem, InventoryStatus, LogKind, Money, PaymentLine, PaymentMethod, Sale,
};
use phonedesk_db::{
    BatchTransitionRequest, CommittedBatch, CommittedSale, Database, DbConfig, DbError, DbResult,
    NewInventoryItem, RestoreRequest, RestoredItem, SaleFilter, SaleUpdate, TransitionRequest,
};
use phonedesk_engine::{
    BatchItem, BatchSaleRequest, CompleteSaleRequest, EngineConfig, ErrorCode, SaleEngine, SaleFailure,
    SalePolicy, SaleStore,
};

// =============================================================================
// Fixtures
// =============================================================================

struct TempDb {
    path: PathBuf,
}

impl TempDb {
    fn new() -> Self {
        let path = std::env::temp_dir().join(format!("phonedesk-it-{}.db", Uuid::new_v4()));
        TempDb { path }
    }

    async fn open(&self) -> Database {
        Database::new(DbConfig::new(self.path.clone()).max_connections(8))
            .await
            .unwrap()
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut file = self.path.clone().into_os_string();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 14).unwrap()
}

async fn stock(db: &Database, id: &str, price: i64) {
    db.inventory()
        .insert(&NewInventoryItem::new(
            id,
            "Galaxy S24",
            Money::from_units(price * 3 / 4),
            Money::from_units(price),
        ))
        .await
        .unwrap();
}

async fn all_sales(db: &Database) -> Vec<Sale> {
    let filter = SaleFilter {
        include_reverted: true,
        ..Default::default()
    };
    db.sales().list(&filter).await.unwrap()
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sales_sell_an_item_once() {
    let tmp = TempDb::new();
    let db = tmp.open().await;
    stock(&db, "s24-0001", 800).await;

    let engine = SaleEngine::new(db, SalePolicy::default());

    let mut handles = Vec::new();
    for n in 0..8 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let request = CompleteSaleRequest::new("s24-0001", day(), Money::from_units(800))
                .with_actor(format!("till-{n}"));
            engine.complete_sale(request).await
        }));
    }

    let mut sold = 0;
    for handle in handles {
        let result = handle.await.unwrap().unwrap();
        if result.success {
            sold += 1;
        } else {
            assert_eq!(
                result.error,
                Some(SaleFailure::ItemNotAvailable {
                    item_id: "s24-0001".to_string(),
                    current_status: InventoryStatus::Sold,
                })
            );
        }
    }
    assert_eq!(sold, 1);

    let db = engine.store();
    assert_eq!(all_sales(db).await.len(), 1);
    assert_eq!(db.deduction_logs().for_item("s24-0001").await.unwrap().len(), 1);
    assert_eq!(
        db.inventory().read_status("s24-0001").await.unwrap(),
        Some(InventoryStatus::Sold)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overlapping_batches_do_not_both_commit() {
    let tmp = TempDb::new();
    let db = tmp.open().await;
    for id in ["a", "b", "c"] {
        stock(&db, id, 300).await;
    }
    let engine = SaleEngine::new(db, SalePolicy::default());

    let first = BatchSaleRequest::new(
        vec![BatchItem::new("a", Money::from_units(300)), BatchItem::new("b", Money::from_units(300))],
        day(),
    );
    let second = BatchSaleRequest::new(
        vec![BatchItem::new("b", Money::from_units(300)), BatchItem::new("c", Money::from_units(300))],
        day(),
    );

    let (left, right) = tokio::join!(
        engine.complete_batch_sale(first),
        engine.complete_batch_sale(second)
    );
    let (left, right) = (left.unwrap(), right.unwrap());

    assert!(left.success ^ right.success);

    let sales = all_sales(engine.store()).await;
    assert_eq!(sales.len(), 2);
    let winner = if left.success { &left } else { &right };
    assert!(sales.iter().all(|sale| sale.batch_id == winner.batch_id));

    let loser = if left.success { &right } else { &left };
    assert_eq!(loser.processed_items, 0);
    assert!(!loser.inventory_deducted);
}

// =============================================================================
// Atomicity
// =============================================================================

#[tokio::test]
async fn test_batch_with_one_blocked_item_writes_nothing() {
    let tmp = TempDb::new();
    let db = tmp.open().await;
    stock(&db, "a", 500).await;
    stock(&db, "b", 500).await;
    db.inventory()
        .set_status_if("b", InventoryStatus::Available, InventoryStatus::Reserved)
        .await
        .unwrap();
    let engine = SaleEngine::new(db, SalePolicy::default());

    let request = BatchSaleRequest::new(
        vec![BatchItem::new("a", Money::from_units(500)), BatchItem::new("b", Money::from_units(500))],
        day(),
    )
    .with_payments(vec![PaymentLine::new(PaymentMethod::Cash, Money::from_units(1000))]);

    let result = engine.complete_batch_sale(request).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].item_id(), Some("b"));
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.warnings[0].item_id, "a");

    let db = engine.store();
    assert!(all_sales(db).await.is_empty());
    assert_eq!(db.deduction_logs().count().await.unwrap(), 0);
    assert_eq!(db.inventory().read_status("a").await.unwrap(), Some(InventoryStatus::Available));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancelled_batch_commits_all_or_nothing() {
    let tmp = TempDb::new();
    let db = tmp.open().await;
    let engine = SaleEngine::new(db, SalePolicy::default());
    let size = phonedesk_core::MAX_BATCH_ITEMS;

    for round in 0..12 {
        let ids: Vec<String> = (0..size).map(|n| format!("r{round}-{n}")).collect();
        for id in &ids {
            stock(engine.store(), id, 50).await;
        }
        let items: Vec<BatchItem> = ids.iter().map(|id| BatchItem::new(id.as_str(), Money::from_units(50))).collect();

        let handle = tokio::spawn({
            let engine = engine.clone();
            async move { engine.complete_batch_sale(BatchSaleRequest::new(items, day())).await }
        });
        for _ in 0..round * 4 {
            tokio::task::yield_now().await;
        }
        handle.abort();
        let _ = handle.await;

        // A write waits out whatever the dropped transaction still holds.
        stock(engine.store(), &format!("r{round}-fence"), 1).await;

        let db = engine.store();
        let sales = all_sales(db)
            .await
            .into_iter()
            .filter(|sale| ids.contains(&sale.item_id))
            .count();
        let mut logs = 0;
        let mut sold = 0;
        for id in &ids {
            logs += db.deduction_logs().for_item(id).await.unwrap().len();
            if db.inventory().read_status(id).await.unwrap() == Some(InventoryStatus::Sold) {
                sold += 1;
            }
        }

        assert!(
            (sales, logs, sold) == (0, 0, 0) || (sales, logs, sold) == (size, size, size),
            "round {round}: {sales} sales, {logs} log entries, {sold} sold"
        );
    }
}

// =============================================================================
// Reversal
// =============================================================================

#[tokio::test]
async fn test_sale_then_revert_restores_item_and_keeps_audit() {
    let tmp = TempDb::new();
    let db = tmp.open().await;
    stock(&db, "px", 700).await;
    db.inventory()
        .set_status_if("px", InventoryStatus::Available, InventoryStatus::Reserved)
        .await
        .unwrap();
    let engine = SaleEngine::new(db, SalePolicy::default().with_oversell(true));

    let sale = engine
        .complete_sale(CompleteSaleRequest::new("px", day(), Money::from_units(700)))
        .await
        .unwrap();
    assert!(sale.success);
    assert!(sale.warning.is_some());
    assert_eq!(sale.previous_status, Some(InventoryStatus::Reserved));
    let sale_id = sale.sale_id.unwrap();

    let revert = engine.revert_sale(&sale_id).await.unwrap();
    assert!(revert.success);
    assert_eq!(revert.new_status, Some(InventoryStatus::Reserved));

    let db = engine.store();
    assert_eq!(db.inventory().read_status("px").await.unwrap(), Some(InventoryStatus::Reserved));

    let log = db.deduction_logs().for_sale(&sale_id).await.unwrap();
    let kinds: Vec<LogKind> = log.iter().map(|entry| entry.kind).collect();
    assert_eq!(kinds, vec![LogKind::Deduction, LogKind::Restoration]);
    assert_eq!(log[1].previous_status, log[0].new_status);
    assert_eq!(log[1].new_status, log[0].previous_status);

    let stored = all_sales(db).await;
    assert_eq!(stored.len(), 1);
    assert!(stored[0].is_reverted());
}

#[tokio::test]
async fn test_reverting_the_first_of_two_oversold_sales_blocks_the_second() {
    let tmp = TempDb::new();
    let db = tmp.open().await;
    stock(&db, "ip15", 900).await;
    let engine = SaleEngine::new(db, SalePolicy::default().with_oversell(true));

    let first = engine
        .complete_sale(CompleteSaleRequest::new("ip15", day(), Money::from_units(900)))
        .await
        .unwrap();
    let second = engine
        .complete_sale(CompleteSaleRequest::new("ip15", day(), Money::from_units(900)))
        .await
        .unwrap();
    assert!(first.success && second.success);
    assert_eq!(second.previous_status, Some(InventoryStatus::Sold));

    let reverted = engine.revert_sale(first.sale_id.as_deref().unwrap()).await.unwrap();
    assert!(reverted.success);
    assert_eq!(reverted.new_status, Some(InventoryStatus::Available));
    let warning = reverted.warning.expect("second sale is still live");
    assert!(warning.contains("ip15"), "{warning}");
    assert!(warning.contains("1 other sale"), "{warning}");

    let blocked = engine.revert_sale(second.sale_id.as_deref().unwrap()).await.unwrap();
    assert!(!blocked.success);
    assert_eq!(
        blocked.error,
        Some(SaleFailure::ConflictingState {
            item_id: "ip15".to_string(),
            expected: InventoryStatus::Sold,
            actual: Some(InventoryStatus::Available),
        })
    );
    assert_eq!(
        engine.store().inventory().read_status("ip15").await.unwrap(),
        Some(InventoryStatus::Available)
    );
}

// =============================================================================
// Audit
// =============================================================================

#[tokio::test]
async fn test_every_status_change_has_one_log_entry() {
    let tmp = TempDb::new();
    let db = tmp.open().await;
    for id in ["a", "b", "c"] {
        stock(&db, id, 200).await;
    }
    let engine = SaleEngine::new(db, SalePolicy::default());

    let single = engine
        .complete_sale(CompleteSaleRequest::new("a", day(), Money::from_units(200)))
        .await
        .unwrap();
    let batch = engine
        .complete_batch_sale(BatchSaleRequest::new(
            vec![BatchItem::new("b", Money::from_units(200)), BatchItem::new("c", Money::from_units(200))],
            day(),
        ))
        .await
        .unwrap();
    assert!(single.success && batch.success);
    engine.revert_sale(single.sale_id.as_deref().unwrap()).await.unwrap();

    let db = engine.store();
    assert_eq!(db.deduction_logs().count().await.unwrap(), 4);
    for sale in all_sales(db).await {
        let entries = db.deduction_logs().for_sale(&sale.id).await.unwrap();
        let expected = if sale.is_reverted() { 2 } else { 1 };
        assert_eq!(entries.len(), expected, "sale {}", sale.id);
        assert!(entries.iter().all(|entry| entry.item_id == sale.item_id));
    }
}

// =============================================================================
// Store Failures
// =============================================================================

/// Delegates to a real database but can fail the write transactions.
struct FlakyStore {
    inner: Database,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    fn check(&self) -> DbResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DbError::TransactionFailed("disk I/O error".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SaleStore for FlakyStore {
    async fn read_item_status(&self, item_id: &str) -> DbResult<Option<InventoryStatus>> {
        self.inner.read_item_status(item_id).await
    }

    async fn read_items(&self, item_ids: &[String]) -> DbResult<Vec<InventoryItem>> {
        self.inner.read_items(item_ids).await
    }

    async fn atomic_transition(&self, request: &TransitionRequest) -> DbResult<CommittedSale> {
        self.check()?;
        self.inner.atomic_transition(request).await
    }

    async fn atomic_batch_transition(&self, request: &BatchTransitionRequest) -> DbResult<CommittedBatch> {
        self.check()?;
        self.inner.atomic_batch_transition(request).await
    }

    async fn read_last_log_entry(&self, sale_id: &str) -> DbResult<Option<DeductionLogEntry>> {
        self.inner.read_last_log_entry(sale_id).await
    }

    async fn atomic_restore(&self, request: &RestoreRequest) -> DbResult<RestoredItem> {
        self.check()?;
        self.inner.atomic_restore(request).await
    }

    async fn count_live_sales(&self, item_id: &str) -> DbResult<i64> {
        self.inner.count_live_sales(item_id).await
    }

    async fn set_item_status_if(
        &self,
        item_id: &str,
        expected: InventoryStatus,
        to: InventoryStatus,
    ) -> DbResult<()> {
        self.check()?;
        self.inner.set_item_status_if(item_id, expected, to).await
    }

    async fn update_sale_metadata(&self, sale_id: &str, update: &SaleUpdate) -> DbResult<Sale> {
        self.check()?;
        self.inner.update_sale_metadata(sale_id, update).await
    }
}

#[tokio::test]
async fn test_store_failure_is_retryable_and_leaves_no_trace() {
    let tmp = TempDb::new();
    let db = tmp.open().await;
    stock(&db, "m1", 250).await;

    let store = FlakyStore {
        inner: db.clone(),
        fail_writes: AtomicBool::new(true),
    };
    let engine = SaleEngine::new(store, SalePolicy::default());

    let err = engine
        .complete_sale(CompleteSaleRequest::new("m1", day(), Money::from_units(250)))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::PersistenceFailure);
    assert!(err.is_retryable());
    assert_eq!(db.inventory().read_status("m1").await.unwrap(), Some(InventoryStatus::Available));
    assert!(all_sales(&db).await.is_empty());

    // Same request succeeds once the store recovers.
    engine.store().fail_writes.store(false, Ordering::SeqCst);
    let result = engine
        .complete_sale(CompleteSaleRequest::new("m1", day(), Money::from_units(250)))
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(all_sales(&db).await.len(), 1);
}

#[tokio::test]
async fn test_engine_shares_store_across_clones() {
    let tmp = TempDb::new();
    let db = tmp.open().await;
    stock(&db, "shared", 100).await;

    let engine = Arc::new(SaleEngine::new(db, SalePolicy::default()));
    let other = Arc::clone(&engine);

    let sold = engine
        .complete_sale(CompleteSaleRequest::new("shared", day(), Money::from_units(100)))
        .await
        .unwrap();
    assert!(sold.success);

    let again = other
        .complete_sale(CompleteSaleRequest::new("shared", day(), Money::from_units(100)))
        .await
        .unwrap();
    assert_eq!(again.error.map(|e| e.code()), Some(ErrorCode::ItemNotAvailable));
}

#[tokio::test]
async fn test_open_applies_config_policy() {
    let tmp = TempDb::new();
    let mut config = EngineConfig::default();
    config.database.path = tmp.path.clone();
    config.sales.allow_oversell = true;
    config.sales.default_location_id = Some("kiosk".to_string());
    config.sales.default_actor = "till-7".to_string();

    let engine = phonedesk_engine::open(&config).await.unwrap();
    engine.store().inventory().upsert_location("kiosk", "Kiosk").await.unwrap();
    stock(engine.store(), "g84", 280).await;

    let result = engine
        .complete_sale(CompleteSaleRequest::new("g84", day(), Money::from_units(280)))
        .await
        .unwrap();
    let sale = result.sale.unwrap();
    assert_eq!(sale.location_id.as_deref(), Some("kiosk"));

    let log = engine.store().deduction_logs().for_sale(&sale.id).await.unwrap();
    assert_eq!(log[0].actor.as_deref(), Some("till-7"));
    assert!(engine.policy().allow_oversell);

    config.events.channel_capacity = 0;
    let err = phonedesk_engine::open(&config).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::ConfigError);
}
