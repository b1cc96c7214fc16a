//! Single-flight guard: at most one sync run per user at a time.
//!
//! A trigger that finds the guard held is not lost: it is remembered, and
//! the holder runs once more after releasing.

use async_trait::async_trait;
use postgres_models::models::TriggerSource;
use redis_cache::{LockToken, RedisError, Release, SyncLock};
use std::collections::HashMap;
use std::str::FromStr;
use tokio::sync::Mutex;
use uuid::Uuid;

#[async_trait]
pub trait RunGuard: Send + Sync {
    /// `Ok(None)` while another run for the user holds the guard. `source` is
    /// then recorded as a rerun request for the holder.
    async fn try_acquire(&self, user_id: Uuid, source: TriggerSource) -> Result<Option<LockToken>, RedisError>;

    /// Releases the guard and hands back the latest rerun request made while
    /// it was held.
    async fn release(&self, token: &LockToken) -> Option<TriggerSource>;
}

#[async_trait]
impl RunGuard for SyncLock {
    async fn try_acquire(&self, user_id: Uuid, source: TriggerSource) -> Result<Option<LockToken>, RedisError> {
        SyncLock::try_acquire(self, &user_id.to_string(), source.as_str()).await
    }

    async fn release(&self, token: &LockToken) -> Option<TriggerSource> {
        match SyncLock::release(self, token).await {
            Ok(Release::Released { rerun }) => rerun.and_then(|r| TriggerSource::from_str(&r).ok()),
            Ok(Release::Expired) => {
                tracing::warn!(key = %token.key, "Sync lock expired before release");
                None
            }
            Err(e) => {
                tracing::error!(key = %token.key, "Failed to release sync lock: {}", e);
                None
            }
        }
    }
}

/// Process-local guard for single-instance deployments and tests.
#[derive(Default)]
pub struct LocalRunGuard {
    // Held users, each with the latest rerun request made while held.
    held: Mutex<HashMap<Uuid, Option<TriggerSource>>>,
}

impl LocalRunGuard {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunGuard for LocalRunGuard {
    async fn try_acquire(&self, user_id: Uuid, source: TriggerSource) -> Result<Option<LockToken>, RedisError> {
        let mut held = self.held.lock().await;
        if let Some(rerun) = held.get_mut(&user_id) {
            *rerun = Some(source);
            return Ok(None);
        }
        held.insert(user_id, None);

        let scope = user_id.to_string();
        Ok(Some(LockToken {
            key: SyncLock::key_for(&scope),
            token: scope.clone(),
            scope,
        }))
    }

    async fn release(&self, token: &LockToken) -> Option<TriggerSource> {
        let user_id = token.scope.parse::<Uuid>().ok()?;
        self.held.lock().await.remove(&user_id).flatten()
    }
}
