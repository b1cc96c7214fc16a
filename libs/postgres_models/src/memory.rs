//! In-memory `Store` with the same uniqueness and atomicity guarantees as
//! `PgStore`, for tests.

use crate::models::{
    Category, CategoryTotal, ExpenseEntry, MerchantMapping, NewTransaction, NewUser, SyncLog, SyncOutcome,
    SyncStatus, Transaction, TransactionStatus, TriggerSource, User, Verification, VerifyOutcome,
};
use crate::repository::{MerchantRepository, SyncLogRepository, TransactionRepository, UserRepository};
use crate::DbError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    transactions: Vec<Transaction>,
    mappings: HashMap<String, MerchantMapping>,
    sync_logs: Vec<SyncLog>,
    users: Vec<User>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all_transactions(&self) -> Vec<Transaction> {
        self.tables.read().await.transactions.clone()
    }

    pub async fn all_sync_logs(&self) -> Vec<SyncLog> {
        self.tables.read().await.sync_logs.clone()
    }

    /// Rewrites a log's start time, so tests can place runs in the past.
    pub async fn backdate_sync_log(&self, id: Uuid, start_time: DateTime<Utc>) {
        let mut tables = self.tables.write().await;
        if let Some(log) = tables.sync_logs.iter_mut().find(|l| l.id == id) {
            log.start_time = start_time;
        }
    }
}

/// What Postgres reports for a value that does not fit `NUMERIC(12,2)`.
fn numeric_overflow() -> DbError {
    DbError::Query(diesel::result::Error::DatabaseError(
        diesel::result::DatabaseErrorKind::Unknown,
        Box::new("numeric field overflow".to_string()),
    ))
}

fn materialize(new: NewTransaction) -> Transaction {
    Transaction {
        id: new.id,
        user_id: new.user_id,
        raw_content_hash: new.raw_content_hash,
        amount: new.amount,
        currency: new.currency,
        merchant_name: new.merchant_name,
        category: new.category,
        sub_category: new.sub_category,
        status: new.status,
        account_type: new.account_type,
        remarks: new.remarks,
        tags: new.tags,
        created_at: new.created_at,
    }
}

#[async_trait]
impl TransactionRepository for MemoryStore {
    async fn find_by_hash(&self, raw_content_hash: &str) -> Result<Option<Transaction>, DbError> {
        let tables = self.tables.read().await;
        Ok(tables
            .transactions
            .iter()
            .find(|t| t.raw_content_hash == raw_content_hash)
            .cloned())
    }

    async fn insert_transaction(&self, new: NewTransaction) -> Result<Option<Transaction>, DbError> {
        let mut tables = self.tables.write().await;
        if tables
            .transactions
            .iter()
            .any(|t| t.raw_content_hash == new.raw_content_hash)
        {
            return Ok(None);
        }
        if new.amount.abs() > Decimal::new(999_999_999_999, 2) {
            return Err(numeric_overflow());
        }
        let txn = materialize(new);
        tables.transactions.push(txn.clone());
        Ok(Some(txn))
    }

    async fn pending_transactions(&self, user_id: Uuid, skip: i64, limit: i64) -> Result<Vec<Transaction>, DbError> {
        let tables = self.tables.read().await;
        let mut pending: Vec<Transaction> = tables
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id && t.status == TransactionStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(pending
            .into_iter()
            .skip(skip.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn verify_transaction(
        &self,
        id: Uuid,
        user_id: Uuid,
        verification: &Verification,
    ) -> Result<VerifyOutcome, DbError> {
        let mut tables = self.tables.write().await;
        let Some(txn) = tables
            .transactions
            .iter_mut()
            .find(|t| t.id == id && t.user_id == user_id)
        else {
            return Ok(VerifyOutcome::NotFound);
        };
        if txn.status != TransactionStatus::Pending {
            return Ok(VerifyOutcome::AlreadyFinal(txn.status));
        }

        let mapping = txn.apply_verification(verification);
        let updated = txn.clone();
        if let Some(mapping) = mapping {
            tables.mappings.insert(mapping.raw_merchant.clone(), mapping);
        }
        Ok(VerifyOutcome::Verified(updated))
    }

    async fn category_totals(&self, user_id: Uuid) -> Result<Vec<CategoryTotal>, DbError> {
        let tables = self.tables.read().await;
        let mut totals = BTreeMap::new();
        for txn in tables
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id && t.status != TransactionStatus::Rejected)
        {
            *totals
                .entry((txn.category, txn.sub_category, txn.account_type))
                .or_insert(Decimal::ZERO) += txn.amount;
        }
        Ok(totals
            .into_iter()
            .map(|((category, sub_category, account_type), total)| CategoryTotal {
                category,
                sub_category,
                account_type,
                total,
            })
            .collect())
    }

    async fn expenses_since(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<Vec<ExpenseEntry>, DbError> {
        let tables = self.tables.read().await;
        let mut entries: Vec<ExpenseEntry> = tables
            .transactions
            .iter()
            .filter(|t| {
                t.user_id == user_id
                    && t.status != TransactionStatus::Rejected
                    && t.category != Category::Income
                    && t.created_at >= since
            })
            .map(|t| ExpenseEntry {
                created_at: t.created_at,
                amount: t.amount,
            })
            .collect();
        entries.sort_by_key(|e| e.created_at);
        Ok(entries)
    }
}

#[async_trait]
impl MerchantRepository for MemoryStore {
    async fn find_mapping(&self, raw_merchant: &str) -> Result<Option<MerchantMapping>, DbError> {
        Ok(self.tables.read().await.mappings.get(raw_merchant).cloned())
    }

    async fn upsert_mapping(&self, mapping: MerchantMapping) -> Result<(), DbError> {
        self.tables
            .write()
            .await
            .mappings
            .insert(mapping.raw_merchant.clone(), mapping);
        Ok(())
    }
}

#[async_trait]
impl SyncLogRepository for MemoryStore {
    async fn start_sync_log(&self, user_id: Uuid, trigger_source: TriggerSource) -> Result<SyncLog, DbError> {
        let log = SyncLog::start(user_id, trigger_source);
        self.tables.write().await.sync_logs.push(log.clone());
        Ok(log)
    }

    async fn finish_sync_log(&self, id: Uuid, outcome: &SyncOutcome) -> Result<(), DbError> {
        let mut tables = self.tables.write().await;
        if let Some(log) = tables
            .sync_logs
            .iter_mut()
            .find(|l| l.id == id && l.status == SyncStatus::InProgress)
        {
            log.end_time = Some(Utc::now());
            log.status = outcome.status();
            log.records_processed = outcome.records_processed();
            log.error_message = outcome.error_message();
        }
        Ok(())
    }

    async fn last_successful_sync(&self, user_id: Uuid) -> Result<Option<DateTime<Utc>>, DbError> {
        let tables = self.tables.read().await;
        Ok(tables
            .sync_logs
            .iter()
            .filter(|l| l.user_id == user_id && l.status == SyncStatus::Success)
            .map(|l| l.start_time)
            .max())
    }

    async fn recent_sync_logs(&self, user_id: Uuid, limit: i64) -> Result<Vec<SyncLog>, DbError> {
        let tables = self.tables.read().await;
        let mut logs: Vec<SyncLog> = tables
            .sync_logs
            .iter()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        logs.truncate(limit.max(0) as usize);
        Ok(logs)
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, new: NewUser) -> Result<Option<User>, DbError> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.email == new.email) {
            return Ok(None);
        }
        let user = User {
            id: new.id,
            email: new.email,
            hashed_password: new.hashed_password,
            is_active: new.is_active,
            gmail_credentials: None,
            created_at: new.created_at,
        };
        tables.users.push(user.clone());
        Ok(Some(user))
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, DbError> {
        Ok(self.tables.read().await.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn update_mail_credentials(&self, id: Uuid, credentials: serde_json::Value) -> Result<(), DbError> {
        let mut tables = self.tables.write().await;
        if let Some(user) = tables.users.iter_mut().find(|u| u.id == id) {
            user.gmail_credentials = Some(credentials);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubCategory;

    fn new_txn(user_id: Uuid, hash: &str) -> NewTransaction {
        NewTransaction::new(user_id, hash.to_string(), Decimal::new(1999, 2), TransactionStatus::Pending)
    }

    #[tokio::test]
    async fn test_duplicate_hash_is_not_inserted() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();

        assert!(store.insert_transaction(new_txn(user, "h1")).await.unwrap().is_some());
        assert!(store.insert_transaction(new_txn(user, "h1")).await.unwrap().is_none());
        assert_eq!(store.all_transactions().await.len(), 1);
    }

    #[tokio::test]
    async fn test_amount_wider_than_column_is_an_error() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let mut txn = new_txn(user, "h1");
        txn.amount = Decimal::new(1_000_000_000_000_000, 2);

        assert!(store.insert_transaction(txn).await.is_err());
        assert!(store.all_transactions().await.is_empty());
    }

    #[tokio::test]
    async fn test_verify_is_scoped_to_owner_and_happens_once() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let txn = store.insert_transaction(new_txn(owner, "h1")).await.unwrap().unwrap();
        let decision = Verification {
            category: Category::Shopping,
            sub_category: SubCategory::Clothing,
            merchant_name: "Zara".into(),
            approved: true,
        };

        let stranger = store.verify_transaction(txn.id, Uuid::new_v4(), &decision).await.unwrap();
        assert!(matches!(stranger, VerifyOutcome::NotFound));

        let first = store.verify_transaction(txn.id, owner, &decision).await.unwrap();
        assert!(matches!(first, VerifyOutcome::Verified(_)));

        let second = store.verify_transaction(txn.id, owner, &decision).await.unwrap();
        assert!(matches!(second, VerifyOutcome::AlreadyFinal(TransactionStatus::Verified)));
    }

    #[tokio::test]
    async fn test_watermark_is_latest_success() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();

        let failed = store.start_sync_log(user, TriggerSource::Manual).await.unwrap();
        store
            .finish_sync_log(failed.id, &SyncOutcome::Failed { error: "boom".into() })
            .await
            .unwrap();
        assert_eq!(store.last_successful_sync(user).await.unwrap(), None);

        let ok = store.start_sync_log(user, TriggerSource::Webhook).await.unwrap();
        store
            .finish_sync_log(ok.id, &SyncOutcome::Success { records_processed: 2 })
            .await
            .unwrap();
        assert_eq!(store.last_successful_sync(user).await.unwrap(), Some(ok.start_time));
    }
}
