//! In-memory lock store for testing and development

use async_trait::async_trait;
use common::{LockId, OwnerId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::store::traits::LockStore;
use crate::types::PriceLock;

struct StoredLock {
    lock: PriceLock,
    evict_at: Instant,
}

/// In-memory lock store
///
/// Records past their retention window are purged lazily on access.
pub struct InMemoryLockStore {
    locks: RwLock<HashMap<LockId, StoredLock>>,
    active: RwLock<HashMap<OwnerId, LockId>>,
}

impl InMemoryLockStore {
    pub fn new() -> Self {
        Self {
            locks: RwLock::new(HashMap::new()),
            active: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryLockStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LockStore for InMemoryLockStore {
    async fn put(&self, lock: &PriceLock, retention: Duration) -> Result<()> {
        let mut locks = self.locks.write();
        locks.insert(
            lock.id,
            StoredLock {
                lock: lock.clone(),
                evict_at: Instant::now() + retention,
            },
        );
        Ok(())
    }

    async fn get(&self, id: LockId) -> Result<Option<PriceLock>> {
        {
            let locks = self.locks.read();
            match locks.get(&id) {
                Some(stored) if stored.evict_at > Instant::now() => {
                    return Ok(Some(stored.lock.clone()));
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }

        // Retention elapsed; reclaim the record.
        let mut locks = self.locks.write();
        locks.remove(&id);
        Ok(None)
    }

    async fn remove(&self, id: LockId) -> Result<()> {
        let mut locks = self.locks.write();
        locks.remove(&id);
        Ok(())
    }

    async fn active_lock_id(&self, owner: OwnerId) -> Result<Option<LockId>> {
        let active = self.active.read();
        Ok(active.get(&owner).copied())
    }

    async fn set_active(
        &self,
        owner: OwnerId,
        expected: Option<LockId>,
        new: Option<LockId>,
    ) -> Result<bool> {
        let mut active = self.active.write();
        if active.get(&owner).copied() != expected {
            return Ok(false);
        }
        match new {
            Some(id) => {
                active.insert(owner, id);
            }
            None => {
                active.remove(&owner);
            }
        }
        Ok(true)
    }
}
