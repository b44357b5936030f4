//! LockStore trait definition

use async_trait::async_trait;
use common::{LockId, OwnerId};
use std::time::Duration;

use crate::error::Result;
use crate::types::PriceLock;

/// Key-value abstraction over lock storage with per-key TTL and an atomic
/// compare-and-swap on the per-owner active index.
///
/// The same engine logic runs unchanged against the in-process map (tests,
/// development) or Redis (production). Store-level expiry is advisory; the
/// engine always re-checks the in-record `expires_at`.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Insert or replace a lock record. `retention` bounds how long the
    /// record stays readable; the store may reclaim it afterwards.
    async fn put(&self, lock: &PriceLock, retention: Duration) -> Result<()>;

    /// Fetch a lock record by id
    async fn get(&self, id: LockId) -> Result<Option<PriceLock>>;

    /// Delete a lock record
    async fn remove(&self, id: LockId) -> Result<()>;

    /// Current entry in the per-owner active index
    async fn active_lock_id(&self, owner: OwnerId) -> Result<Option<LockId>>;

    /// Compare-and-swap the per-owner active index. Returns false when the
    /// current entry does not match `expected`; the index is unchanged in
    /// that case.
    async fn set_active(
        &self,
        owner: OwnerId,
        expected: Option<LockId>,
        new: Option<LockId>,
    ) -> Result<bool>;
}
