//! Redis lock store implementation
//!
//! Lock records are stored as JSON values with a native expiry matching the
//! retention window; the per-owner active index is a plain key updated
//! through a compare-and-swap script so concurrent engine instances cannot
//! clobber each other's index writes. Native expiry is advisory; the engine
//! always re-checks the in-record `expires_at`.

use async_trait::async_trait;
use common::{LockId, OwnerId};
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::error::{LockError, Result};
use crate::store::traits::LockStore;
use crate::types::PriceLock;

// Atomically replaces the active index entry only when it still holds the
// expected value. Empty string arguments stand for "no entry".
const CAS_SCRIPT: &str = r#"
local cur = redis.call('GET', KEYS[1])
if cur == false then cur = '' end
if cur ~= ARGV[1] then
    return 0
end
if ARGV[2] == '' then
    redis.call('DEL', KEYS[1])
else
    redis.call('SET', KEYS[1], ARGV[2], 'EX', tonumber(ARGV[3]))
end
return 1
"#;

/// Redis-backed lock store
pub struct RedisLockStore {
    redis: Arc<tokio::sync::Mutex<redis::aio::ConnectionManager>>,
    cas: redis::Script,
    key_prefix: String,
    /// Expiry applied to active index entries; stale entries are also
    /// cleared lazily by the engine.
    index_ttl: Duration,
}

impl RedisLockStore {
    pub async fn new(url: &str, index_ttl: Duration) -> Result<Self> {
        info!("Connecting to Redis lock store");

        let client =
            redis::Client::open(url).map_err(|e| LockError::Storage(e.to_string()))?;
        let connection_manager = client
            .get_connection_manager()
            .await
            .map_err(|e| LockError::Storage(e.to_string()))?;

        Ok(Self {
            redis: Arc::new(tokio::sync::Mutex::new(connection_manager)),
            cas: redis::Script::new(CAS_SCRIPT),
            key_prefix: "price-lock".to_string(),
            index_ttl,
        })
    }

    fn lock_key(&self, id: LockId) -> String {
        format!("{}:lock:{}", self.key_prefix, id)
    }

    fn active_key(&self, owner: OwnerId) -> String {
        format!("{}:active:{}", self.key_prefix, owner)
    }
}

#[async_trait]
impl LockStore for RedisLockStore {
    async fn put(&self, lock: &PriceLock, retention: Duration) -> Result<()> {
        let key = self.lock_key(lock.id);
        let json =
            serde_json::to_string(lock).map_err(|e| LockError::Storage(e.to_string()))?;

        let mut redis = self.redis.lock().await;
        redis
            .set_ex::<_, _, ()>(&key, json, retention.as_secs())
            .await
            .map_err(|e| LockError::Storage(e.to_string()))?;

        Ok(())
    }

    async fn get(&self, id: LockId) -> Result<Option<PriceLock>> {
        let key = self.lock_key(id);

        let mut redis = self.redis.lock().await;
        let result: Option<String> = redis
            .get(&key)
            .await
            .map_err(|e| LockError::Storage(e.to_string()))?;

        match result {
            Some(json) => {
                let lock: PriceLock = serde_json::from_str(&json)
                    .map_err(|e| LockError::Storage(e.to_string()))?;
                Ok(Some(lock))
            }
            None => Ok(None),
        }
    }

    async fn remove(&self, id: LockId) -> Result<()> {
        let key = self.lock_key(id);

        let mut redis = self.redis.lock().await;
        redis
            .del::<_, ()>(&key)
            .await
            .map_err(|e| LockError::Storage(e.to_string()))?;

        Ok(())
    }

    async fn active_lock_id(&self, owner: OwnerId) -> Result<Option<LockId>> {
        let key = self.active_key(owner);

        let mut redis = self.redis.lock().await;
        let result: Option<String> = redis
            .get(&key)
            .await
            .map_err(|e| LockError::Storage(e.to_string()))?;

        match result {
            Some(raw) => {
                let uuid = Uuid::parse_str(&raw)
                    .map_err(|e| LockError::Storage(e.to_string()))?;
                Ok(Some(LockId::from_uuid(uuid)))
            }
            None => Ok(None),
        }
    }

    async fn set_active(
        &self,
        owner: OwnerId,
        expected: Option<LockId>,
        new: Option<LockId>,
    ) -> Result<bool> {
        let key = self.active_key(owner);
        let expected = expected.map(|id| id.to_string()).unwrap_or_default();
        let new = new.map(|id| id.to_string()).unwrap_or_default();

        let mut redis = self.redis.lock().await;
        let swapped: i64 = self
            .cas
            .key(&key)
            .arg(&expected)
            .arg(&new)
            .arg(self.index_ttl.as_secs())
            .invoke_async(&mut *redis)
            .await
            .map_err(|e| LockError::Storage(e.to_string()))?;

        Ok(swapped == 1)
    }
}
