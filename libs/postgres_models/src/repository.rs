//! Storage seams used by the service.
//!
//! `PgStore` is the production implementation; `MemoryStore` (feature
//! `memory`) backs the service's tests.

use crate::models::{
    CategoryTotal, ExpenseEntry, MerchantMapping, NewTransaction, NewUser, SyncLog, SyncOutcome, Transaction,
    TriggerSource, User, Verification, VerifyOutcome,
};
use crate::DbError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn find_by_hash(&self, raw_content_hash: &str) -> Result<Option<Transaction>, DbError>;

    /// Inserts a transaction. Returns `None` when another row already owns
    /// the content hash; the uniqueness is enforced by the store itself.
    async fn insert_transaction(&self, new: NewTransaction) -> Result<Option<Transaction>, DbError>;

    /// Pending transactions of one user, newest first.
    async fn pending_transactions(&self, user_id: Uuid, skip: i64, limit: i64) -> Result<Vec<Transaction>, DbError>;

    /// Applies a verification atomically: the transaction update and the
    /// merchant-memory upsert either both land or neither does.
    async fn verify_transaction(
        &self,
        id: Uuid,
        user_id: Uuid,
        verification: &Verification,
    ) -> Result<VerifyOutcome, DbError>;

    /// Sums of non-rejected amounts grouped by category pair and account type.
    async fn category_totals(&self, user_id: Uuid) -> Result<Vec<CategoryTotal>, DbError>;

    /// Non-rejected, non-income amounts created at or after `since`.
    async fn expenses_since(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<Vec<ExpenseEntry>, DbError>;
}

#[async_trait]
pub trait MerchantRepository: Send + Sync {
    async fn find_mapping(&self, raw_merchant: &str) -> Result<Option<MerchantMapping>, DbError>;

    async fn upsert_mapping(&self, mapping: MerchantMapping) -> Result<(), DbError>;
}

#[async_trait]
pub trait SyncLogRepository: Send + Sync {
    /// Writes and commits an IN_PROGRESS record.
    async fn start_sync_log(&self, user_id: Uuid, trigger_source: TriggerSource) -> Result<SyncLog, DbError>;

    async fn finish_sync_log(&self, id: Uuid, outcome: &SyncOutcome) -> Result<(), DbError>;

    /// Start time of the user's most recent successful run.
    async fn last_successful_sync(&self, user_id: Uuid) -> Result<Option<DateTime<Utc>>, DbError>;

    /// Most recent runs first.
    async fn recent_sync_logs(&self, user_id: Uuid, limit: i64) -> Result<Vec<SyncLog>, DbError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Returns `None` when the email is already registered.
    async fn create_user(&self, new: NewUser) -> Result<Option<User>, DbError>;

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, DbError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DbError>;

    async fn update_mail_credentials(&self, id: Uuid, credentials: serde_json::Value) -> Result<(), DbError>;
}

/// Everything the service needs from persistence.
pub trait Store: TransactionRepository + MerchantRepository + SyncLogRepository + UserRepository {}

impl<T> Store for T where T: TransactionRepository + MerchantRepository + SyncLogRepository + UserRepository {}
