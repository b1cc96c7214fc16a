pub mod models;
pub mod pg;
pub mod repository;
pub mod schema;

#[cfg(feature = "memory")]
pub mod memory;

pub use pg::PgStore;
pub use repository::{MerchantRepository, Store, SyncLogRepository, TransactionRepository, UserRepository};

use bb8::Pool;
use diesel_async::pooled_connection::{AsyncDieselConnectionManager, PoolError};
use diesel_async::{AsyncPgConnection, SimpleAsyncConnection};
use std::time::Duration;

pub type DbPool = Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;

const INIT_SQL: &str = include_str!("../migrations/2025-01-01-000000_init/up.sql");

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Database pool error: {0}")]
    Pool(#[from] bb8::RunError<PoolError>),

    #[error("Database query error: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("Connection error: {0}")]
    Connection(String),
}

pub async fn create_pool(database_url: &str) -> Result<DbPool, DbError> {
    let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);

    Pool::builder()
        .max_size(20)
        .min_idle(Some(5))
        .connection_timeout(Duration::from_secs(30))
        .idle_timeout(Some(Duration::from_secs(600)))
        .test_on_check_out(true)
        .build(config)
        .await
        .map_err(|e| DbError::Connection(e.to_string()))
}

/// Creates any missing tables. Only run in local/development environments;
/// deployed databases are migrated out of band.
pub async fn bootstrap_schema(pool: &DbPool) -> Result<(), DbError> {
    let mut conn = pool.get().await?;
    conn.batch_execute(INIT_SQL).await?;
    Ok(())
}
