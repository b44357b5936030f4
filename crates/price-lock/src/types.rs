//! Price lock data types

use chrono::{DateTime, Utc};
use common::{round2, Country, Currency, LockId, OwnerId};
use price_feed::PriceCalculation;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a price lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockStatus {
    Active,
    Used,
    Expired,
    Cancelled,
}

impl LockStatus {
    /// Terminal states never transition further
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LockStatus::Active)
    }
}

/// One reserved line item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockItem {
    pub product_id: String,
    pub variant_id: Option<String>,
    pub quantity: u32,
    /// Frozen per-unit price; immutable for the lock's lifetime
    pub locked_unit_price: f64,
    pub calculation: PriceCalculation,
}

impl LockItem {
    pub fn line_total(&self) -> f64 {
        self.locked_unit_price * f64::from(self.quantity)
    }
}

/// A TTL-bound price reservation
///
/// The locked prices are immutable regardless of subsequent market
/// movement; only `status` and `used_at` ever change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLock {
    pub id: LockId,
    pub owner_id: OwnerId,
    pub items: Vec<LockItem>,
    /// 24K price per gram at lock time, for audit
    pub reference_price_at_lock: f64,
    pub country: Country,
    pub currency: Currency,
    pub status: LockStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

impl PriceLock {
    /// Frozen total across all items, rounded at exposure
    pub fn total(&self) -> f64 {
        round2(self.items.iter().map(LockItem::line_total).sum())
    }

    /// TTL check against the in-record `expires_at`. This is the source of
    /// truth even when a backing store with native expiry disagrees.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Seconds remaining before expiry, clamped at zero
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }

    /// Status with expiry recomputed at read time
    pub fn effective_status(&self, now: DateTime<Utc>) -> LockStatus {
        if self.status == LockStatus::Active && self.is_expired(now) {
            LockStatus::Expired
        } else {
            self.status
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_calculation(total: f64) -> PriceCalculation {
        let now = Utc::now();
        PriceCalculation {
            gold_value: total,
            stone_value: 0.0,
            labor_cost: 0.0,
            making_charges: 0.0,
            subtotal: total,
            tax_rate: 0.0,
            tax: 0.0,
            total,
            currency: Currency::INR,
            calculated_at: now,
            valid_until: now + Duration::seconds(60),
        }
    }

    fn sample_lock(ttl_secs: i64) -> PriceLock {
        let now = Utc::now();
        PriceLock {
            id: LockId::new(),
            owner_id: OwnerId::new(),
            items: vec![
                LockItem {
                    product_id: "ring-001".to_string(),
                    variant_id: None,
                    quantity: 2,
                    locked_unit_price: 70_248.27,
                    calculation: sample_calculation(70_248.27),
                },
                LockItem {
                    product_id: "chain-002".to_string(),
                    variant_id: Some("18in".to_string()),
                    quantity: 1,
                    locked_unit_price: 12_000.0,
                    calculation: sample_calculation(12_000.0),
                },
            ],
            reference_price_at_lock: 6000.0,
            country: Country::IN,
            currency: Currency::INR,
            status: LockStatus::Active,
            created_at: now,
            expires_at: now + Duration::seconds(ttl_secs),
            used_at: None,
        }
    }

    #[test]
    fn test_total_sums_line_items() {
        let lock = sample_lock(300);
        assert_eq!(lock.total(), 152_496.54);
    }

    #[test]
    fn test_effective_status_recomputes_expiry() {
        let lock = sample_lock(300);
        let now = Utc::now();
        assert_eq!(lock.effective_status(now), LockStatus::Active);
        assert_eq!(
            lock.effective_status(now + Duration::seconds(301)),
            LockStatus::Expired
        );
    }

    #[test]
    fn test_terminal_status_unaffected_by_expiry() {
        let mut lock = sample_lock(300);
        lock.status = LockStatus::Used;
        let late = Utc::now() + Duration::seconds(600);
        assert_eq!(lock.effective_status(late), LockStatus::Used);
    }

    #[test]
    fn test_remaining_secs_clamps_at_zero() {
        let lock = sample_lock(300);
        let now = Utc::now();
        assert!(lock.remaining_secs(now) >= 299);
        assert_eq!(lock.remaining_secs(now + Duration::seconds(400)), 0);
    }

    #[test]
    fn test_only_active_is_non_terminal() {
        assert!(!LockStatus::Active.is_terminal());
        assert!(LockStatus::Used.is_terminal());
        assert!(LockStatus::Expired.is_terminal());
        assert!(LockStatus::Cancelled.is_terminal());
    }
}
