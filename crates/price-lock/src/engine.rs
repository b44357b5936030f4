//! Price lock engine
//!
//! Drives the lock lifecycle over a [`LockStore`]. Every operation on an
//! owner's locks is serialized through a per-owner gate, so the
//! single-active-lock-per-owner invariant holds under double-clicked
//! checkouts and a terminal record is never overwritten by a racing
//! supersede; every read re-checks the in-record `expires_at` and lazily
//! settles expired locks.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use common::{Country, LockId, OwnerId, Purity};
use observability::PriceMetrics;
use parking_lot::Mutex;
use price_feed::{calculate, CalculationInput, FeedError, PriceFeedCache};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{LockError, Result};
use crate::store::traits::LockStore;
use crate::types::{LockItem, LockStatus, PriceLock};

/// One item in a lock creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLockItem {
    pub product_id: String,
    pub variant_id: Option<String>,
    pub quantity: u32,
    pub gold_weight_grams: f64,
    pub purity: Purity,
    pub stone_value: f64,
    pub labor_cost: f64,
    pub making_charges_percent: f64,
}

/// Outcome of a non-throwing validity check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockValidation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Price lock engine
pub struct LockEngine {
    store: Arc<dyn LockStore>,
    cache: Arc<PriceFeedCache>,
    tax_rates: HashMap<Country, f64>,
    ttl: Duration,
    retention: Duration,
    calculation_validity: Duration,
    /// Per-owner gates. Every operation that can write a lock record holds
    /// the owner's gate, so read-modify-write sequences never interleave
    /// within a process. Without this a `create` superseding the prior lock
    /// could overwrite a concurrent `use_lock`'s terminal record.
    owner_gates: Mutex<HashMap<OwnerId, Arc<tokio::sync::Mutex<()>>>>,
}

impl LockEngine {
    pub fn new(
        store: Arc<dyn LockStore>,
        cache: Arc<PriceFeedCache>,
        tax_rates: HashMap<Country, f64>,
        ttl: Duration,
        retention: Duration,
        calculation_validity: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            tax_rates,
            ttl,
            retention,
            calculation_validity,
            owner_gates: Mutex::new(HashMap::new()),
        }
    }

    /// TTL applied to new locks, in seconds
    pub fn ttl_secs(&self) -> u64 {
        self.ttl.as_secs()
    }

    /// Create a lock, superseding any prior active lock of the same owner.
    pub async fn create(
        &self,
        owner: OwnerId,
        items: Vec<NewLockItem>,
        country: Country,
    ) -> Result<PriceLock> {
        if items.is_empty() {
            return Err(LockError::Validation(
                "a price lock needs at least one item".to_string(),
            ));
        }
        if items.iter().any(|i| i.quantity == 0) {
            return Err(LockError::Validation(
                "item quantity must be at least 1".to_string(),
            ));
        }

        let gate = self.owner_gate(owner);
        let _guard = gate.lock().await;

        let table = self.cache.price_table(country).await;
        let tax_rate = self.tax_rates.get(&country).copied().unwrap_or(0.0);
        let now = Utc::now();

        let mut lock_items = Vec::with_capacity(items.len());
        for item in items {
            let input = CalculationInput {
                gold_weight_grams: item.gold_weight_grams,
                purity: item.purity,
                stone_value: item.stone_value,
                labor_cost: item.labor_cost,
                making_charges_percent: item.making_charges_percent,
            };
            let calculation =
                calculate(&input, &table, tax_rate, self.calculation_validity, now)
                    .map_err(|e| match e {
                        FeedError::Validation(msg) => LockError::Validation(msg),
                        other => LockError::Storage(other.to_string()),
                    })?;

            lock_items.push(LockItem {
                product_id: item.product_id,
                variant_id: item.variant_id,
                quantity: item.quantity,
                locked_unit_price: calculation.total,
                calculation,
            });
        }

        let ttl = ChronoDuration::from_std(self.ttl)
            .map_err(|_| LockError::Validation("lock TTL out of range".to_string()))?;

        let lock = PriceLock {
            id: LockId::new(),
            owner_id: owner,
            items: lock_items,
            reference_price_at_lock: common::round2(table.base_price_per_gram()),
            country,
            currency: table.currency,
            status: LockStatus::Active,
            created_at: now,
            expires_at: now + ttl,
            used_at: None,
        };

        self.store.put(&lock, self.retention).await?;
        self.supersede_and_index(owner, lock.id, now).await?;

        PriceMetrics::lock_transition("active");
        info!(
            lock_id = %lock.id,
            owner = %owner,
            country = %country,
            total = lock.total(),
            expires_at = %lock.expires_at,
            "Price lock created"
        );

        Ok(lock)
    }

    /// Read a lock. Expired and foreign locks are both reported as
    /// NotFound so existence never leaks across owners.
    pub async fn get(&self, id: LockId, owner: OwnerId) -> Result<PriceLock> {
        let gate = self.owner_gate(owner);
        let _guard = gate.lock().await;

        let lock = self.load_owned(id, owner).await?;

        if lock.status == LockStatus::Active && lock.is_expired(Utc::now()) {
            self.settle_expired(lock).await?;
            return Err(LockError::NotFound(id));
        }

        Ok(lock)
    }

    /// Non-throwing validity check
    pub async fn validate(&self, id: LockId, owner: OwnerId) -> Result<LockValidation> {
        let gate = self.owner_gate(owner);
        let _guard = gate.lock().await;

        let lock = match self.load_owned(id, owner).await {
            Ok(lock) => lock,
            Err(LockError::NotFound(_)) => return Ok(invalid("not_found")),
            Err(e) => return Err(e),
        };

        match lock.effective_status(Utc::now()) {
            LockStatus::Active => Ok(LockValidation {
                valid: true,
                reason: None,
            }),
            LockStatus::Expired => {
                if lock.status == LockStatus::Active {
                    self.settle_expired(lock).await?;
                }
                Ok(invalid("expired"))
            }
            LockStatus::Used => Ok(invalid("already_used")),
            LockStatus::Cancelled => Ok(invalid("cancelled")),
        }
    }

    /// Consume the lock at checkout. Terminal transition; the lock id
    /// doubles as the idempotency key for the order the caller creates
    /// with the frozen price.
    pub async fn use_lock(&self, id: LockId, owner: OwnerId) -> Result<PriceLock> {
        let gate = self.owner_gate(owner);
        let _guard = gate.lock().await;

        let mut lock = self.load_owned(id, owner).await?;
        let now = Utc::now();

        match lock.status {
            LockStatus::Active if lock.is_expired(now) => {
                self.settle_expired(lock).await?;
                Err(LockError::Expired(id))
            }
            LockStatus::Active => {
                lock.status = LockStatus::Used;
                lock.used_at = Some(now);
                self.store.put(&lock, self.retention).await?;
                self.clear_index(owner, id).await?;

                PriceMetrics::lock_transition("used");
                info!(lock_id = %id, owner = %owner, total = lock.total(), "Price lock used");
                Ok(lock)
            }
            LockStatus::Expired => Err(LockError::Expired(id)),
            LockStatus::Used => Err(LockError::Validation(
                "price lock already used".to_string(),
            )),
            LockStatus::Cancelled => Err(LockError::Validation(
                "price lock was cancelled".to_string(),
            )),
        }
    }

    /// Cancel a lock. Cancelling an already-terminal lock is a silent
    /// no-op because cancellation commonly races with natural expiry.
    pub async fn cancel(&self, id: LockId, owner: OwnerId) -> Result<()> {
        let gate = self.owner_gate(owner);
        let _guard = gate.lock().await;

        let mut lock = self.load_owned(id, owner).await?;
        let now = Utc::now();

        if lock.status != LockStatus::Active {
            debug!(lock_id = %id, status = ?lock.status, "Cancel on terminal lock ignored");
            return Ok(());
        }

        lock.status = if lock.is_expired(now) {
            LockStatus::Expired
        } else {
            LockStatus::Cancelled
        };
        self.store.put(&lock, self.retention).await?;
        self.clear_index(owner, id).await?;

        PriceMetrics::lock_transition("cancelled");
        info!(lock_id = %id, owner = %owner, "Price lock cancelled");
        Ok(())
    }

    /// Active locks for an owner. At most one exists by construction;
    /// locks whose TTL lapsed are filtered out even if the store has not
    /// reclaimed them yet.
    pub async fn list_active(&self, owner: OwnerId) -> Result<Vec<PriceLock>> {
        let gate = self.owner_gate(owner);
        let _guard = gate.lock().await;

        let Some(id) = self.store.active_lock_id(owner).await? else {
            return Ok(Vec::new());
        };

        match self.store.get(id).await? {
            Some(lock) if lock.status == LockStatus::Active => {
                if lock.is_expired(Utc::now()) {
                    self.settle_expired(lock).await?;
                    Ok(Vec::new())
                } else {
                    Ok(vec![lock])
                }
            }
            _ => {
                // Stale index entry; drop it.
                self.store.set_active(owner, Some(id), None).await?;
                Ok(Vec::new())
            }
        }
    }

    async fn load_owned(&self, id: LockId, owner: OwnerId) -> Result<PriceLock> {
        let lock = self
            .store
            .get(id)
            .await?
            .ok_or(LockError::NotFound(id))?;

        if lock.owner_id != owner {
            debug!(lock_id = %id, "Lock owned by another user");
            return Err(LockError::NotFound(id));
        }

        Ok(lock)
    }

    /// Mark an active-but-expired lock as expired and release the index.
    /// Callers hold the owner gate.
    async fn settle_expired(&self, mut lock: PriceLock) -> Result<()> {
        let id = lock.id;
        let owner = lock.owner_id;

        lock.status = LockStatus::Expired;
        self.store.put(&lock, self.retention).await?;
        self.clear_index(owner, id).await?;

        PriceMetrics::lock_transition("expired");
        debug!(lock_id = %id, owner = %owner, "Price lock expired");
        Ok(())
    }

    /// Point the owner's active index at `new_id`, cancelling whatever
    /// active lock it referenced before.
    async fn supersede_and_index(
        &self,
        owner: OwnerId,
        new_id: LockId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        // Bounded retry: the owner gate serializes in-process callers, so
        // contention here only comes from other service instances.
        for _ in 0..8 {
            let prev = self.store.active_lock_id(owner).await?;

            if let Some(prev_id) = prev {
                if let Some(mut prev_lock) = self.store.get(prev_id).await? {
                    if prev_lock.status == LockStatus::Active {
                        let (status, transition) = if prev_lock.is_expired(now) {
                            (LockStatus::Expired, "expired")
                        } else {
                            (LockStatus::Cancelled, "cancelled")
                        };
                        prev_lock.status = status;
                        self.store.put(&prev_lock, self.retention).await?;
                        PriceMetrics::lock_transition(transition);
                        info!(
                            lock_id = %prev_id,
                            owner = %owner,
                            status = ?status,
                            "Prior active lock superseded"
                        );
                    }
                }
            }

            if self.store.set_active(owner, prev, Some(new_id)).await? {
                return Ok(());
            }
        }

        Err(LockError::Storage(
            "active index contention exceeded retry budget".to_string(),
        ))
    }

    /// Release the index entry if it still points at `id`
    async fn clear_index(&self, owner: OwnerId, id: LockId) -> Result<()> {
        self.store.set_active(owner, Some(id), None).await?;
        Ok(())
    }

    fn owner_gate(&self, owner: OwnerId) -> Arc<tokio::sync::Mutex<()>> {
        let mut gates = self.owner_gates.lock();
        Arc::clone(
            gates
                .entry(owner)
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }
}

fn invalid(reason: &str) -> LockValidation {
    LockValidation {
        valid: false,
        reason: Some(reason.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryLockStore;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use common::Currency;
    use price_feed::{FeedClient, SpotQuote, GRAMS_PER_TROY_OUNCE};
    use tokio::task::JoinSet;

    struct FixedFeed {
        base_per_gram: f64,
    }

    #[async_trait]
    impl FeedClient for FixedFeed {
        async fn fetch_spot(&self) -> price_feed::Result<SpotQuote> {
            Ok(SpotQuote {
                price_usd_per_oz: self.base_per_gram * GRAMS_PER_TROY_OUNCE,
                change_24h: 0.0,
                change_percent_24h: 0.0,
            })
        }

        async fn fetch_rates(&self) -> price_feed::Result<HashMap<Currency, f64>> {
            Ok([
                (Currency::USD, 1.0),
                (Currency::INR, 1.0),
                (Currency::AED, 1.0),
                (Currency::GBP, 1.0),
            ]
            .into_iter()
            .collect())
        }
    }

    fn engine_with_store(store: Arc<dyn LockStore>, ttl: Duration) -> LockEngine {
        // 24K base of exactly 6000 per gram in every currency.
        let cache = Arc::new(PriceFeedCache::new(
            Arc::new(FixedFeed {
                base_per_gram: 6000.0,
            }),
            Duration::from_secs(60),
            Duration::from_secs(3600),
        ));
        let tax_rates = HashMap::from([
            (Country::IN, 3.0),
            (Country::AE, 5.0),
            (Country::UK, 20.0),
        ]);
        LockEngine::new(
            store,
            cache,
            tax_rates,
            ttl,
            Duration::from_secs(3600),
            Duration::from_secs(60),
        )
    }

    fn engine_with_ttl(ttl: Duration) -> LockEngine {
        engine_with_store(Arc::new(InMemoryLockStore::new()), ttl)
    }

    /// Store that yields around every access, widening read-modify-write
    /// windows so interleaving bugs surface.
    struct SlowStore {
        inner: InMemoryLockStore,
    }

    #[async_trait]
    impl LockStore for SlowStore {
        async fn put(&self, lock: &PriceLock, retention: Duration) -> crate::error::Result<()> {
            tokio::time::sleep(Duration::from_millis(2)).await;
            self.inner.put(lock, retention).await
        }

        async fn get(&self, id: LockId) -> crate::error::Result<Option<PriceLock>> {
            tokio::time::sleep(Duration::from_millis(2)).await;
            self.inner.get(id).await
        }

        async fn remove(&self, id: LockId) -> crate::error::Result<()> {
            self.inner.remove(id).await
        }

        async fn active_lock_id(&self, owner: OwnerId) -> crate::error::Result<Option<LockId>> {
            self.inner.active_lock_id(owner).await
        }

        async fn set_active(
            &self,
            owner: OwnerId,
            expected: Option<LockId>,
            new: Option<LockId>,
        ) -> crate::error::Result<bool> {
            self.inner.set_active(owner, expected, new).await
        }
    }

    fn ring_item() -> NewLockItem {
        NewLockItem {
            product_id: "ring-001".to_string(),
            variant_id: None,
            quantity: 1,
            gold_weight_grams: 10.0,
            purity: Purity::K22,
            stone_value: 5000.0,
            labor_cost: 2000.0,
            making_charges_percent: 10.0,
        }
    }

    #[tokio::test]
    async fn test_create_freezes_calculated_total() {
        let engine = engine_with_ttl(Duration::from_secs(300));
        let owner = OwnerId::new();

        let lock = engine
            .create(owner, vec![ring_item()], Country::IN)
            .await
            .unwrap();

        assert_eq!(lock.status, LockStatus::Active);
        assert_eq!(lock.total(), 70_248.27);
        assert_eq!(lock.reference_price_at_lock, 6000.0);
        assert_eq!(lock.currency, Currency::INR);
        let remaining = lock.remaining_secs(Utc::now());
        assert!((299..=300).contains(&remaining));
    }

    #[tokio::test]
    async fn test_use_then_second_use_fails() {
        let engine = engine_with_ttl(Duration::from_secs(300));
        let owner = OwnerId::new();
        let lock = engine
            .create(owner, vec![ring_item()], Country::IN)
            .await
            .unwrap();

        let used = engine.use_lock(lock.id, owner).await.unwrap();
        assert_eq!(used.status, LockStatus::Used);
        assert!(used.used_at.is_some());

        let second = engine.use_lock(lock.id, owner).await;
        assert_matches!(second, Err(LockError::Validation(_)));
    }

    #[tokio::test]
    async fn test_use_after_expiry_fails_with_expired() {
        let engine = engine_with_ttl(Duration::ZERO);
        let owner = OwnerId::new();
        let lock = engine
            .create(owner, vec![ring_item()], Country::IN)
            .await
            .unwrap();

        let result = engine.use_lock(lock.id, owner).await;
        assert_matches!(result, Err(LockError::Expired(_)));
    }

    #[tokio::test]
    async fn test_get_folds_expiry_into_not_found() {
        let engine = engine_with_ttl(Duration::ZERO);
        let owner = OwnerId::new();
        let lock = engine
            .create(owner, vec![ring_item()], Country::IN)
            .await
            .unwrap();

        assert_matches!(
            engine.get(lock.id, owner).await,
            Err(LockError::NotFound(_))
        );

        let check = engine.validate(lock.id, owner).await.unwrap();
        assert!(!check.valid);
        assert_eq!(check.reason.as_deref(), Some("expired"));
    }

    #[tokio::test]
    async fn test_get_folds_foreign_owner_into_not_found() {
        let engine = engine_with_ttl(Duration::from_secs(300));
        let owner = OwnerId::new();
        let stranger = OwnerId::new();
        let lock = engine
            .create(owner, vec![ring_item()], Country::IN)
            .await
            .unwrap();

        assert_matches!(
            engine.get(lock.id, stranger).await,
            Err(LockError::NotFound(_))
        );
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let engine = engine_with_ttl(Duration::from_secs(300));
        let owner = OwnerId::new();
        let lock = engine
            .create(owner, vec![ring_item()], Country::IN)
            .await
            .unwrap();

        engine.cancel(lock.id, owner).await.unwrap();
        engine.cancel(lock.id, owner).await.unwrap();

        let check = engine.validate(lock.id, owner).await.unwrap();
        assert!(!check.valid);
        assert_eq!(check.reason.as_deref(), Some("cancelled"));
    }

    #[tokio::test]
    async fn test_new_lock_supersedes_prior_active() {
        let engine = engine_with_ttl(Duration::from_secs(300));
        let owner = OwnerId::new();

        let first = engine
            .create(owner, vec![ring_item()], Country::IN)
            .await
            .unwrap();
        let second = engine
            .create(owner, vec![ring_item()], Country::IN)
            .await
            .unwrap();

        let prior = engine.get(first.id, owner).await.unwrap();
        assert_eq!(prior.status, LockStatus::Cancelled);

        let active = engine.list_active(owner).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, second.id);
    }

    #[tokio::test]
    async fn test_use_racing_supersede_preserves_terminal_state() {
        for _ in 0..10 {
            let store = Arc::new(SlowStore {
                inner: InMemoryLockStore::new(),
            });
            let engine = Arc::new(engine_with_store(
                Arc::clone(&store) as Arc<dyn LockStore>,
                Duration::from_secs(300),
            ));
            let owner = OwnerId::new();
            let first = engine
                .create(owner, vec![ring_item()], Country::IN)
                .await
                .unwrap();

            let use_task = {
                let engine = Arc::clone(&engine);
                tokio::spawn(async move { engine.use_lock(first.id, owner).await })
            };
            let create_task = {
                let engine = Arc::clone(&engine);
                tokio::spawn(
                    async move { engine.create(owner, vec![ring_item()], Country::IN).await },
                )
            };

            let used = use_task.await.unwrap();
            create_task.await.unwrap().unwrap();

            let stored = store.inner.get(first.id).await.unwrap().unwrap();
            match used {
                // Consume won: its terminal record must survive the
                // supersede that followed.
                Ok(lock) => {
                    assert_eq!(lock.status, LockStatus::Used);
                    assert_eq!(stored.status, LockStatus::Used);
                }
                // Supersede won: the consume was rejected outright.
                Err(e) => {
                    assert_matches!(e, LockError::Validation(_));
                    assert_eq!(stored.status, LockStatus::Cancelled);
                }
            }
        }
    }

    #[tokio::test]
    async fn test_supersede_settles_expired_prior_as_expired() {
        let store = Arc::new(InMemoryLockStore::new());
        let engine = engine_with_store(Arc::clone(&store) as Arc<dyn LockStore>, Duration::ZERO);
        let owner = OwnerId::new();

        let first = engine
            .create(owner, vec![ring_item()], Country::IN)
            .await
            .unwrap();
        engine
            .create(owner, vec![ring_item()], Country::IN)
            .await
            .unwrap();

        // The prior lock's TTL had lapsed, so superseding records it as
        // expired rather than cancelled.
        let stored = store.get(first.id).await.unwrap().unwrap();
        assert_eq!(stored.status, LockStatus::Expired);
    }

    #[tokio::test]
    async fn test_concurrent_creates_leave_exactly_one_active() {
        let engine = Arc::new(engine_with_ttl(Duration::from_secs(300)));
        let owner = OwnerId::new();

        let mut tasks = JoinSet::new();
        for _ in 0..16 {
            let engine = Arc::clone(&engine);
            tasks.spawn(async move {
                engine
                    .create(owner, vec![ring_item()], Country::IN)
                    .await
                    .unwrap()
            });
        }
        while let Some(result) = tasks.join_next().await {
            result.unwrap();
        }

        let active = engine.list_active(owner).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].status, LockStatus::Active);
    }

    #[tokio::test]
    async fn test_locks_are_isolated_per_owner() {
        let engine = engine_with_ttl(Duration::from_secs(300));
        let alice = OwnerId::new();
        let bob = OwnerId::new();

        engine
            .create(alice, vec![ring_item()], Country::IN)
            .await
            .unwrap();
        engine
            .create(bob, vec![ring_item()], Country::AE)
            .await
            .unwrap();

        assert_eq!(engine.list_active(alice).await.unwrap().len(), 1);
        assert_eq!(engine.list_active(bob).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_items_rejected() {
        let engine = engine_with_ttl(Duration::from_secs(300));
        let result = engine.create(OwnerId::new(), Vec::new(), Country::IN).await;
        assert_matches!(result, Err(LockError::Validation(_)));
    }

    #[tokio::test]
    async fn test_zero_quantity_rejected() {
        let engine = engine_with_ttl(Duration::from_secs(300));
        let mut item = ring_item();
        item.quantity = 0;
        let result = engine
            .create(OwnerId::new(), vec![item], Country::IN)
            .await;
        assert_matches!(result, Err(LockError::Validation(_)));
    }

    #[tokio::test]
    async fn test_validate_unknown_lock() {
        let engine = engine_with_ttl(Duration::from_secs(300));
        let check = engine
            .validate(LockId::new(), OwnerId::new())
            .await
            .unwrap();
        assert!(!check.valid);
        assert_eq!(check.reason.as_deref(), Some("not_found"));
    }
}
