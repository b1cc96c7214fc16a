use crate::models::{
    AccountType, Category, CategoryTotal, ExpenseEntry, MerchantMapping, NewTransaction, NewUser, SubCategory,
    SyncLog, SyncOutcome, SyncStatus, Transaction, TransactionStatus, TriggerSource, User, Verification,
    VerifyOutcome,
};
use crate::repository::{MerchantRepository, SyncLogRepository, TransactionRepository, UserRepository};
use crate::schema::{merchant_mappings, sync_logs, transactions, users};
use crate::{DbError, DbPool};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::dsl::sum;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use rust_decimal::Decimal;
use uuid::Uuid;

type PooledConn<'a> = bb8::PooledConnection<'a, AsyncDieselConnectionManager<AsyncPgConnection>>;

/// Postgres-backed `Store`. Every method checks out its own connection, so
/// each write is its own unit of work.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn conn(&self) -> Result<PooledConn<'_>, DbError> {
        Ok(self.pool.get().await?)
    }
}

async fn upsert_mapping_with(conn: &mut AsyncPgConnection, mapping: &MerchantMapping) -> Result<(), DbError> {
    diesel::insert_into(merchant_mappings::table)
        .values(mapping)
        .on_conflict(merchant_mappings::raw_merchant)
        .do_update()
        .set((
            merchant_mappings::display_name.eq(excluded(merchant_mappings::display_name)),
            merchant_mappings::default_category.eq(excluded(merchant_mappings::default_category)),
            merchant_mappings::default_sub_category.eq(excluded(merchant_mappings::default_sub_category)),
            merchant_mappings::updated_at.eq(excluded(merchant_mappings::updated_at)),
        ))
        .execute(conn)
        .await?;
    Ok(())
}

#[async_trait]
impl TransactionRepository for PgStore {
    async fn find_by_hash(&self, raw_content_hash: &str) -> Result<Option<Transaction>, DbError> {
        let mut conn = self.conn().await?;
        let txn = transactions::table
            .filter(transactions::raw_content_hash.eq(raw_content_hash))
            .select(Transaction::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(txn)
    }

    async fn insert_transaction(&self, new: NewTransaction) -> Result<Option<Transaction>, DbError> {
        let mut conn = self.conn().await?;
        let inserted = diesel::insert_into(transactions::table)
            .values(&new)
            .on_conflict(transactions::raw_content_hash)
            .do_nothing()
            .returning(Transaction::as_returning())
            .get_result(&mut conn)
            .await
            .optional()?;
        Ok(inserted)
    }

    async fn pending_transactions(&self, user_id: Uuid, skip: i64, limit: i64) -> Result<Vec<Transaction>, DbError> {
        let mut conn = self.conn().await?;
        let rows = transactions::table
            .filter(transactions::user_id.eq(user_id))
            .filter(transactions::status.eq(TransactionStatus::Pending))
            .order(transactions::created_at.desc())
            .offset(skip)
            .limit(limit)
            .select(Transaction::as_select())
            .load(&mut conn)
            .await?;
        Ok(rows)
    }

    async fn verify_transaction(
        &self,
        id: Uuid,
        user_id: Uuid,
        verification: &Verification,
    ) -> Result<VerifyOutcome, DbError> {
        let mut pooled = self.conn().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;
        let verification = verification.clone();

        conn.transaction::<_, DbError, _>(|conn| {
            async move {
                let existing = transactions::table
                    .filter(transactions::id.eq(id))
                    .filter(transactions::user_id.eq(user_id))
                    .select(Transaction::as_select())
                    .for_update()
                    .first(conn)
                    .await
                    .optional()?;

                let Some(mut txn) = existing else {
                    return Ok(VerifyOutcome::NotFound);
                };
                if txn.status != TransactionStatus::Pending {
                    return Ok(VerifyOutcome::AlreadyFinal(txn.status));
                }

                let mapping = txn.apply_verification(&verification);

                let updated = diesel::update(transactions::table.find(id))
                    .set((
                        transactions::status.eq(txn.status),
                        transactions::category.eq(txn.category),
                        transactions::sub_category.eq(txn.sub_category),
                        transactions::merchant_name.eq(&txn.merchant_name),
                    ))
                    .returning(Transaction::as_returning())
                    .get_result(conn)
                    .await?;

                if let Some(mapping) = mapping {
                    upsert_mapping_with(conn, &mapping).await?;
                }

                Ok(VerifyOutcome::Verified(updated))
            }
            .scope_boxed()
        })
        .await
    }

    async fn category_totals(&self, user_id: Uuid) -> Result<Vec<CategoryTotal>, DbError> {
        let mut conn = self.conn().await?;
        let rows: Vec<(Category, SubCategory, AccountType, Option<Decimal>)> = transactions::table
            .filter(transactions::user_id.eq(user_id))
            .filter(transactions::status.ne(TransactionStatus::Rejected))
            .group_by((transactions::category, transactions::sub_category, transactions::account_type))
            .select((
                transactions::category,
                transactions::sub_category,
                transactions::account_type,
                sum(transactions::amount),
            ))
            .load(&mut conn)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(category, sub_category, account_type, total)| CategoryTotal {
                category,
                sub_category,
                account_type,
                total: total.unwrap_or(Decimal::ZERO),
            })
            .collect())
    }

    async fn expenses_since(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<Vec<ExpenseEntry>, DbError> {
        let mut conn = self.conn().await?;
        let rows: Vec<(DateTime<Utc>, Decimal)> = transactions::table
            .filter(transactions::user_id.eq(user_id))
            .filter(transactions::status.ne(TransactionStatus::Rejected))
            .filter(transactions::category.ne(Category::Income))
            .filter(transactions::created_at.ge(since))
            .order(transactions::created_at.asc())
            .select((transactions::created_at, transactions::amount))
            .load(&mut conn)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(created_at, amount)| ExpenseEntry { created_at, amount })
            .collect())
    }
}

#[async_trait]
impl MerchantRepository for PgStore {
    async fn find_mapping(&self, raw_merchant: &str) -> Result<Option<MerchantMapping>, DbError> {
        let mut conn = self.conn().await?;
        let mapping = merchant_mappings::table
            .find(raw_merchant)
            .select(MerchantMapping::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(mapping)
    }

    async fn upsert_mapping(&self, mapping: MerchantMapping) -> Result<(), DbError> {
        let mut pooled = self.conn().await?;
        upsert_mapping_with(&mut pooled, &mapping).await
    }
}

#[async_trait]
impl SyncLogRepository for PgStore {
    async fn start_sync_log(&self, user_id: Uuid, trigger_source: TriggerSource) -> Result<SyncLog, DbError> {
        let mut conn = self.conn().await?;
        let log = diesel::insert_into(sync_logs::table)
            .values(SyncLog::start(user_id, trigger_source))
            .returning(SyncLog::as_returning())
            .get_result(&mut conn)
            .await?;
        Ok(log)
    }

    async fn finish_sync_log(&self, id: Uuid, outcome: &SyncOutcome) -> Result<(), DbError> {
        let mut conn = self.conn().await?;
        diesel::update(sync_logs::table.find(id))
            .filter(sync_logs::status.eq(SyncStatus::InProgress))
            .set((
                sync_logs::end_time.eq(Some(Utc::now())),
                sync_logs::status.eq(outcome.status()),
                sync_logs::records_processed.eq(outcome.records_processed()),
                sync_logs::error_message.eq(outcome.error_message()),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn last_successful_sync(&self, user_id: Uuid) -> Result<Option<DateTime<Utc>>, DbError> {
        let mut conn = self.conn().await?;
        let start = sync_logs::table
            .filter(sync_logs::user_id.eq(user_id))
            .filter(sync_logs::status.eq(SyncStatus::Success))
            .order(sync_logs::start_time.desc())
            .select(sync_logs::start_time)
            .first(&mut conn)
            .await
            .optional()?;
        Ok(start)
    }

    async fn recent_sync_logs(&self, user_id: Uuid, limit: i64) -> Result<Vec<SyncLog>, DbError> {
        let mut conn = self.conn().await?;
        let logs = sync_logs::table
            .filter(sync_logs::user_id.eq(user_id))
            .order(sync_logs::start_time.desc())
            .limit(limit)
            .select(SyncLog::as_select())
            .load(&mut conn)
            .await?;
        Ok(logs)
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn create_user(&self, new: NewUser) -> Result<Option<User>, DbError> {
        let mut conn = self.conn().await?;
        let user = diesel::insert_into(users::table)
            .values(&new)
            .on_conflict(users::email)
            .do_nothing()
            .returning(User::as_returning())
            .get_result(&mut conn)
            .await
            .optional()?;
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, DbError> {
        let mut conn = self.conn().await?;
        let user = users::table
            .find(id)
            .select(User::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        let mut conn = self.conn().await?;
        let user = users::table
            .filter(users::email.eq(email))
            .select(User::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(user)
    }

    async fn update_mail_credentials(&self, id: Uuid, credentials: serde_json::Value) -> Result<(), DbError> {
        let mut conn = self.conn().await?;
        diesel::update(users::table.find(id))
            .set(users::gmail_credentials.eq(Some(credentials)))
            .execute(&mut conn)
            .await?;
        Ok(())
    }
}
