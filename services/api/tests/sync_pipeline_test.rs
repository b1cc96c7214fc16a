mod common;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{message, ScriptedExtractor, TestApp};
use pfie_api::ledger::content_hash;
use pfie_api::sync::{
    Extraction, LocalRunGuard, MailMessage, MailSource, RunGuard, RunReport, Sanitizer, SyncService,
};
use postgres_models::memory::MemoryStore;
use postgres_models::models::{
    AccountType, Category, MerchantMapping, NewUser, SubCategory, SyncOutcome, SyncStatus, TransactionStatus,
    TriggerSource, User,
};
use postgres_models::{MerchantRepository, Store, SyncLogRepository, UserRepository};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

fn swiggy() -> Extraction {
    Extraction {
        amount: Decimal::new(45000, 2),
        currency: "INR".into(),
        merchant_name: "SWIGGY*ORDER".into(),
        category: Category::Shopping,
        sub_category: SubCategory::Clothing,
        account_type: AccountType::CreditCard,
        used_fallback: false,
    }
}

#[tokio::test]
async fn test_sync_persists_pending_transactions() {
    let app = TestApp::new();
    let user = app.create_user("asha@example.com").await;
    app.mail.set_inbox(vec![
        message("m1", "INR 450.00 spent at SWIGGY on card XX1234"),
        message("m2", "Rs 120 debited for metro recharge"),
    ]);
    app.extractor.answer("SWIGGY", swiggy());

    let report = app.state.sync.execute_sync(user.id, TriggerSource::Manual).await.unwrap();
    let RunReport::Completed { outcome, .. } = report else {
        panic!("run should not be skipped");
    };
    assert_eq!(outcome, SyncOutcome::Success { records_processed: 2 });

    let txns = app.store.all_transactions().await;
    assert_eq!(txns.len(), 2);
    assert!(txns.iter().all(|t| t.status == TransactionStatus::Pending));
    assert!(txns.iter().all(|t| t.tags == vec!["MANUAL".to_string()]));

    let swiggy = txns.iter().find(|t| t.merchant_name == "SWIGGY*ORDER").unwrap();
    assert_eq!(swiggy.raw_content_hash, content_hash("m1", "1709251200000"));
    assert_eq!(swiggy.amount.to_string(), "450.00");
    assert_eq!(swiggy.account_type, AccountType::CreditCard);

    let fallback = txns.iter().find(|t| t.merchant_name != "SWIGGY*ORDER").unwrap();
    assert_eq!(fallback.category, Category::Uncategorized);
    assert_eq!(fallback.amount.to_string(), "0.00");
}

#[tokio::test]
async fn test_rerun_over_same_messages_creates_nothing() {
    let app = TestApp::new();
    let user = app.create_user("asha@example.com").await;
    app.mail.set_inbox(vec![message("m1", "INR 450.00 spent at SWIGGY")]);

    app.state.sync.execute_sync(user.id, TriggerSource::Webhook).await.unwrap();
    let second = app.state.sync.execute_sync(user.id, TriggerSource::Webhook).await.unwrap();

    assert!(matches!(
        second,
        RunReport::Completed { outcome: SyncOutcome::Success { records_processed: 0 }, .. }
    ));
    assert_eq!(app.store.all_transactions().await.len(), 1);
    // The already-ingested message never reached the extractor again.
    assert_eq!(app.extractor.calls(), 1);

    let logs = app.store.all_sync_logs().await;
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().all(|l| l.status == SyncStatus::Success && l.end_time.is_some()));
}

#[tokio::test]
async fn test_watermark_is_previous_successful_start() {
    let app = TestApp::new();
    let user = app.create_user("asha@example.com").await;

    app.state.sync.execute_sync(user.id, TriggerSource::Manual).await.unwrap();
    app.state.sync.execute_sync(user.id, TriggerSource::Manual).await.unwrap();

    let first_start = app.store.all_sync_logs().await[0].start_time;
    assert_eq!(app.mail.watermarks(), vec![None, Some(first_start)]);
}

#[tokio::test]
async fn test_text_is_sanitized_before_extraction() {
    let app = TestApp::new();
    let user = app.create_user("asha@example.com").await;
    app.mail.set_inbox(vec![message(
        "m1",
        "Paid Rs 99 to rahul.k@okaxis, queries: help@bank.com or 9876543210",
    )]);

    app.state.sync.execute_sync(user.id, TriggerSource::Manual).await.unwrap();

    let seen = app.extractor.seen();
    assert_eq!(seen.len(), 1);
    assert!(!seen[0].contains("rahul.k@okaxis"));
    assert!(!seen[0].contains("help@bank.com"));
    assert!(!seen[0].contains("9876543210"));
    assert!(seen[0].contains("<UPI>") && seen[0].contains("<EMAIL>") && seen[0].contains("<PHONE>"));
}

#[tokio::test]
async fn test_merchant_memory_overrides_extraction() {
    let app = TestApp::new();
    let user = app.create_user("asha@example.com").await;
    app.store
        .upsert_mapping(MerchantMapping::new(
            "SWIGGY*ORDER".into(),
            "Swiggy".into(),
            Category::FoodDining,
            SubCategory::Delivery,
        ))
        .await
        .unwrap();
    app.mail.set_inbox(vec![message("m1", "INR 450.00 spent at SWIGGY")]);
    app.extractor.answer("SWIGGY", swiggy());

    app.state.sync.execute_sync(user.id, TriggerSource::Manual).await.unwrap();

    let txn = &app.store.all_transactions().await[0];
    assert_eq!(txn.category, Category::FoodDining);
    assert_eq!(txn.sub_category, SubCategory::Delivery);
    assert_eq!(txn.merchant_name, "SWIGGY*ORDER");
    assert_eq!(txn.amount.to_string(), "450.00");
    assert_eq!(txn.account_type, AccountType::CreditCard);
}

#[tokio::test]
async fn test_fallback_extraction_skips_merchant_memory() {
    let app = TestApp::new();
    let user = app.create_user("asha@example.com").await;
    app.store
        .upsert_mapping(MerchantMapping::new(
            "UNCATEGORIZED".into(),
            "Somebody".into(),
            Category::Leisure,
            SubCategory::Movies,
        ))
        .await
        .unwrap();
    app.mail.set_inbox(vec![message("m1", "unparseable alert")]);

    app.state.sync.execute_sync(user.id, TriggerSource::Manual).await.unwrap();

    let txn = &app.store.all_transactions().await[0];
    assert_eq!(txn.merchant_name, "UNCATEGORIZED");
    assert_eq!(txn.category, Category::Uncategorized);
}

#[tokio::test]
async fn test_panic_mid_run_fails_the_run_but_keeps_earlier_rows() {
    let app = TestApp::new();
    let user = app.create_user("asha@example.com").await;
    app.mail.set_inbox(vec![
        message("m1", "INR 450.00 spent at SWIGGY"),
        message("m2", "BOOM this one breaks the model"),
    ]);
    app.extractor.panic_on("BOOM");

    let report = app.state.sync.execute_sync(user.id, TriggerSource::Manual).await.unwrap();
    let RunReport::Completed { sync_log_id, outcome } = report else {
        panic!("run should not be skipped");
    };
    assert_eq!(outcome.status(), SyncStatus::Failed);

    let log = app
        .store
        .all_sync_logs()
        .await
        .into_iter()
        .find(|l| l.id == sync_log_id)
        .unwrap();
    assert_eq!(log.status, SyncStatus::Failed);
    assert_eq!(log.records_processed, 0);
    assert!(log.error_message.unwrap().contains("extractor exploded"));
    assert!(log.end_time.is_some());

    assert_eq!(app.store.all_transactions().await.len(), 1);
    assert_eq!(app.store.last_successful_sync(user.id).await.unwrap(), None);
}

#[tokio::test]
async fn test_run_is_skipped_while_another_holds_the_guard() {
    let app = TestApp::new();
    let user = app.create_user("asha@example.com").await;
    app.mail.set_inbox(vec![message("m1", "INR 450.00 spent at SWIGGY")]);

    let held = app.guard.try_acquire(user.id, TriggerSource::Manual).await.unwrap().unwrap();
    let report = app.state.sync.execute_sync(user.id, TriggerSource::Webhook).await.unwrap();
    assert_eq!(report, RunReport::Skipped);
    assert!(app.store.all_sync_logs().await.is_empty());
    assert!(app.store.all_transactions().await.is_empty());

    assert_eq!(app.guard.release(&held).await, Some(TriggerSource::Webhook));
    let report = app.state.sync.execute_sync(user.id, TriggerSource::Webhook).await.unwrap();
    assert!(matches!(report, RunReport::Completed { .. }));
}

#[tokio::test]
async fn test_guard_is_released_after_a_run() {
    let app = TestApp::new();
    let user = app.create_user("asha@example.com").await;

    app.state.sync.execute_sync(user.id, TriggerSource::Manual).await.unwrap();
    assert!(app.guard.try_acquire(user.id, TriggerSource::Manual).await.unwrap().is_some());
}

#[tokio::test]
async fn test_out_of_range_amount_is_stored_as_fallback() {
    let app = TestApp::new();
    let user = app.create_user("asha@example.com").await;
    app.mail.set_inbox(vec![message("m1", "INR 1000000000000000 spent at SWIGGY")]);
    app.extractor.answer(
        "SWIGGY",
        Extraction {
            amount: Decimal::from(1_000_000_000_000_000i64),
            ..swiggy()
        },
    );

    let report = app.state.sync.execute_sync(user.id, TriggerSource::Webhook).await.unwrap();

    assert!(matches!(
        report,
        RunReport::Completed { outcome: SyncOutcome::Success { records_processed: 1 }, .. }
    ));
    let txns = app.store.all_transactions().await;
    assert_eq!(txns.len(), 1);
    assert_eq!(txns[0].amount.to_string(), "0.00");
    assert_eq!(txns[0].category, Category::Uncategorized);

    // The next run sees the message as already ingested.
    app.state.sync.execute_sync(user.id, TriggerSource::Webhook).await.unwrap();
    assert_eq!(app.extractor.calls(), 1);
}

/// Mail source whose first fetch blocks until `proceed` is signalled.
#[derive(Default)]
struct GatedMail {
    inbox: std::sync::Mutex<Vec<MailMessage>>,
    fetches: AtomicUsize,
    fetched: Notify,
    proceed: Notify,
}

impl GatedMail {
    fn push(&self, message: MailMessage) {
        self.inbox.lock().unwrap().push(message);
    }
}

#[async_trait]
impl MailSource for GatedMail {
    async fn fetch_new(&self, _user: &User, _since: Option<DateTime<Utc>>) -> Vec<MailMessage> {
        let inbox = self.inbox.lock().unwrap().clone();
        if self.fetches.fetch_add(1, Ordering::SeqCst) == 0 {
            self.fetched.notify_one();
            self.proceed.notified().await;
        }
        inbox
    }
}

#[tokio::test]
async fn test_trigger_during_a_run_is_served_by_a_follow_up_run() {
    let store = Arc::new(MemoryStore::new());
    let user = store
        .create_user(NewUser::new("asha@example.com".into(), "hash".into()))
        .await
        .unwrap()
        .unwrap();
    let user_id = user.id;
    let mail = Arc::new(GatedMail::default());
    mail.push(message("m1", "INR 450.00 spent at SWIGGY"));

    let dyn_store: Arc<dyn Store> = store.clone();
    let service = Arc::new(SyncService::new(
        dyn_store,
        mail.clone(),
        Arc::new(ScriptedExtractor::default()),
        Arc::new(Sanitizer::new().unwrap()),
        Arc::new(LocalRunGuard::new()),
    ));

    let first = tokio::spawn({
        let service = Arc::clone(&service);
        async move { service.execute_sync(user_id, TriggerSource::Manual).await }
    });

    // m2 lands after the running sync already fetched its page.
    mail.fetched.notified().await;
    mail.push(message("m2", "Rs 120 debited for metro recharge"));
    let webhook = service.execute_sync(user_id, TriggerSource::Webhook).await.unwrap();
    assert_eq!(webhook, RunReport::Skipped);

    mail.proceed.notify_one();
    let report = first.await.unwrap().unwrap();
    assert!(matches!(
        report,
        RunReport::Completed { outcome: SyncOutcome::Success { records_processed: 1 }, .. }
    ));

    let txns = store.all_transactions().await;
    assert_eq!(txns.len(), 2);
    let m2 = txns
        .iter()
        .find(|t| t.raw_content_hash == content_hash("m2", "1709251200000"))
        .unwrap();
    assert_eq!(m2.tags, vec!["WEBHOOK".to_string()]);

    let logs = store.all_sync_logs().await;
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().all(|l| l.status == SyncStatus::Success));
}
