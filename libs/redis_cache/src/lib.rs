use deadpool_redis::{Config, Pool, Runtime};
use std::time::Duration;

pub type RedisPool = Pool;

#[derive(Debug, thiserror::Error)]
pub enum RedisError {
    #[error("Redis pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub async fn create_pool(redis_url: &str) -> Result<RedisPool, RedisError> {
    let cfg = Config::from_url(redis_url);
    let pool = cfg.create_pool(Some(Runtime::Tokio1))
        .map_err(|e| RedisError::Config(e.to_string()))?;
    Ok(pool)
}

// Takes the lock, or leaves a rerun request for the current holder. A fresh
// holder clears any stale request since its own run covers it.
const ACQUIRE_SCRIPT: &str = r#"
if redis.call("SET", KEYS[1], ARGV[1], "NX", "PX", ARGV[2]) then
    redis.call("DEL", KEYS[2])
    return 1
end
redis.call("SET", KEYS[2], ARGV[3], "PX", ARGV[2])
return 0
"#;

// Deletes the lock only if it still holds our token, so an expired lock
// re-taken by another run is never released by the previous holder. The
// rerun request is handed back in the same step.
const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) ~= ARGV[1] then
    return {0, false}
end
redis.call("DEL", KEYS[1])
local rerun = redis.call("GET", KEYS[2])
redis.call("DEL", KEYS[2])
return {1, rerun}
"#;

/// Proof of holding a `SyncLock` scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken {
    pub scope: String,
    pub key: String,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Release {
    /// The lock had expired and may belong to someone else now.
    Expired,
    /// Released. `rerun` is the latest request left while the lock was held.
    Released { rerun: Option<String> },
}

/// Single-flight guard keyed by scope (one scope per user).
///
/// A caller that finds the scope busy leaves a rerun request behind instead
/// of being dropped. The TTL bounds how long a crashed holder can block the
/// scope.
pub struct SyncLock {
    pool: RedisPool,
    ttl: Duration,
}

impl SyncLock {
    pub fn new(pool: RedisPool, ttl: Duration) -> Self {
        Self { pool, ttl }
    }

    pub fn key_for(scope: &str) -> String {
        format!("sync_lock:{}", scope)
    }

    pub fn rerun_key_for(scope: &str) -> String {
        format!("sync_rerun:{}", scope)
    }

    /// Returns `None` while another holder owns the scope; `request` is then
    /// stored for that holder to pick up on release.
    pub async fn try_acquire(&self, scope: &str, request: &str) -> Result<Option<LockToken>, RedisError> {
        let mut conn = self.pool.get().await?;
        let key = Self::key_for(scope);
        let token = uuid::Uuid::new_v4().to_string();

        let acquired: i32 = redis::Script::new(ACQUIRE_SCRIPT)
            .key(&key)
            .key(Self::rerun_key_for(scope))
            .arg(&token)
            .arg(self.ttl.as_millis() as u64)
            .arg(request)
            .invoke_async(&mut *conn)
            .await?;

        if acquired == 1 {
            tracing::debug!(key = %key, "Sync lock acquired");
            Ok(Some(LockToken {
                scope: scope.to_string(),
                key,
                token,
            }))
        } else {
            tracing::debug!(key = %key, request, "Sync lock busy, rerun requested");
            Ok(None)
        }
    }

    pub async fn release(&self, lock: &LockToken) -> Result<Release, RedisError> {
        let mut conn = self.pool.get().await?;
        let (released, rerun): (i32, Option<String>) = redis::Script::new(RELEASE_SCRIPT)
            .key(&lock.key)
            .key(Self::rerun_key_for(&lock.scope))
            .arg(&lock.token)
            .invoke_async(&mut *conn)
            .await?;
        Ok(if released == 1 {
            Release::Released { rerun }
        } else {
            Release::Expired
        })
    }
}
