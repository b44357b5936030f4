//! Alert store and matcher
//!
//! Alerts are double-indexed: by owner for the CRUD surface, and by
//! (country, purity) for the scheduler's periodic scan. Triggering holds a
//! single write lock across match-and-deactivate, so two overlapping ticks
//! can never fire the same alert twice.

use chrono::Utc;
use common::{AlertId, Country, OwnerId, Purity};
use observability::PriceMetrics;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::error::{AlertError, Result};
use crate::types::{AlertUpdate, NewAlert, PriceAlert};

#[derive(Default)]
struct Indexed {
    alerts: HashMap<AlertId, PriceAlert>,
    by_owner: HashMap<OwnerId, HashSet<AlertId>>,
    /// Only active alerts appear here; the scan never touches inactive ones.
    active_by_key: HashMap<(Country, Purity), HashSet<AlertId>>,
}

impl Indexed {
    fn index_active(&mut self, alert: &PriceAlert) {
        self.active_by_key
            .entry((alert.country, alert.purity))
            .or_default()
            .insert(alert.id);
    }

    fn unindex_active(&mut self, alert: &PriceAlert) {
        if let Some(set) = self.active_by_key.get_mut(&(alert.country, alert.purity)) {
            set.remove(&alert.id);
            if set.is_empty() {
                self.active_by_key.remove(&(alert.country, alert.purity));
            }
        }
    }
}

/// In-memory alert store with integrated matching
pub struct AlertStore {
    inner: RwLock<Indexed>,
}

impl AlertStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Indexed::default()),
        }
    }

    pub fn create(&self, owner: OwnerId, new: NewAlert) -> Result<PriceAlert> {
        validate_alert(new.target_price, &new.channels)?;

        let now = Utc::now();
        let alert = PriceAlert {
            id: AlertId::new(),
            owner_id: owner,
            target_price: new.target_price,
            direction: new.direction,
            purity: new.purity,
            country: new.country,
            channels: new.channels,
            is_active: true,
            triggered_at: None,
            created_at: now,
            updated_at: now,
        };

        let mut inner = self.inner.write();
        inner.by_owner.entry(owner).or_default().insert(alert.id);
        inner.index_active(&alert);
        inner.alerts.insert(alert.id, alert.clone());

        info!(alert_id = %alert.id, owner = %owner, target = alert.target_price, "Alert created");
        Ok(alert)
    }

    pub fn get(&self, id: AlertId, owner: OwnerId) -> Result<PriceAlert> {
        let inner = self.inner.read();
        owned(&inner, id, owner).cloned()
    }

    /// All alerts for an owner, newest first
    pub fn list(&self, owner: OwnerId) -> Vec<PriceAlert> {
        let inner = self.inner.read();
        let mut alerts: Vec<PriceAlert> = inner
            .by_owner
            .get(&owner)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.alerts.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        alerts
    }

    pub fn update(&self, id: AlertId, owner: OwnerId, update: AlertUpdate) -> Result<PriceAlert> {
        if let Some(target) = update.target_price {
            validate_target(target)?;
        }
        if let Some(channels) = &update.channels {
            validate_channels(channels)?;
        }

        let mut inner = self.inner.write();
        let current = owned(&inner, id, owner)?.clone();

        let mut updated = current.clone();
        if let Some(target) = update.target_price {
            updated.target_price = target;
        }
        if let Some(direction) = update.direction {
            updated.direction = direction;
        }
        if let Some(purity) = update.purity {
            updated.purity = purity;
        }
        if let Some(country) = update.country {
            updated.country = country;
        }
        if let Some(channels) = update.channels {
            updated.channels = channels;
        }
        updated.updated_at = Utc::now();

        // Re-key the active index if the scan key moved.
        if current.is_active {
            inner.unindex_active(&current);
            inner.index_active(&updated);
        }
        inner.alerts.insert(id, updated.clone());

        Ok(updated)
    }

    pub fn delete(&self, id: AlertId, owner: OwnerId) -> Result<()> {
        let mut inner = self.inner.write();
        let alert = owned(&inner, id, owner)?.clone();

        inner.unindex_active(&alert);
        if let Some(set) = inner.by_owner.get_mut(&owner) {
            set.remove(&id);
        }
        inner.alerts.remove(&id);

        info!(alert_id = %id, owner = %owner, "Alert deleted");
        Ok(())
    }

    pub fn enable(&self, id: AlertId, owner: OwnerId) -> Result<PriceAlert> {
        self.set_active(id, owner, true)
    }

    pub fn disable(&self, id: AlertId, owner: OwnerId) -> Result<PriceAlert> {
        self.set_active(id, owner, false)
    }

    fn set_active(&self, id: AlertId, owner: OwnerId, active: bool) -> Result<PriceAlert> {
        let mut inner = self.inner.write();
        let mut alert = owned(&inner, id, owner)?.clone();

        if alert.is_active != active {
            alert.is_active = active;
            alert.updated_at = Utc::now();
            if active {
                inner.index_active(&alert);
            } else {
                inner.unindex_active(&alert);
            }
            inner.alerts.insert(id, alert.clone());
        }

        Ok(alert)
    }

    /// Evaluate the active alerts for one (country, purity) pair against
    /// the current price. Matched alerts are deactivated and stamped in
    /// the same critical section and returned for notification dispatch.
    pub fn check_and_trigger(
        &self,
        country: Country,
        purity: Purity,
        current_price: f64,
    ) -> Vec<PriceAlert> {
        let mut inner = self.inner.write();

        let Some(candidates) = inner.active_by_key.get(&(country, purity)) else {
            return Vec::new();
        };

        let now = Utc::now();
        let matched_ids: Vec<AlertId> = candidates
            .iter()
            .filter(|id| {
                inner
                    .alerts
                    .get(id)
                    .map(|a| a.direction.matches(current_price, a.target_price))
                    .unwrap_or(false)
            })
            .copied()
            .collect();

        let mut triggered = Vec::with_capacity(matched_ids.len());
        for id in matched_ids {
            if let Some(alert) = inner.alerts.get_mut(&id) {
                alert.is_active = false;
                alert.triggered_at = Some(now);
                alert.updated_at = now;
                triggered.push(alert.clone());
            }
            if let Some(set) = inner.active_by_key.get_mut(&(country, purity)) {
                set.remove(&id);
            }
        }
        if inner
            .active_by_key
            .get(&(country, purity))
            .is_some_and(HashSet::is_empty)
        {
            inner.active_by_key.remove(&(country, purity));
        }

        if !triggered.is_empty() {
            PriceMetrics::alert_triggered(triggered.len() as u64);
            debug!(
                country = %country,
                purity = %purity,
                price = current_price,
                count = triggered.len(),
                "Alerts triggered"
            );
        }

        triggered
    }
}

impl Default for AlertStore {
    fn default() -> Self {
        Self::new()
    }
}

fn owned<'a>(inner: &'a Indexed, id: AlertId, owner: OwnerId) -> Result<&'a PriceAlert> {
    match inner.alerts.get(&id) {
        Some(alert) if alert.owner_id == owner => Ok(alert),
        _ => Err(AlertError::NotFound(id)),
    }
}

fn validate_alert(target: f64, channels: &[crate::types::NotificationChannel]) -> Result<()> {
    validate_target(target)?;
    validate_channels(channels)
}

fn validate_target(target: f64) -> Result<()> {
    if !target.is_finite() || target <= 0.0 {
        return Err(AlertError::Validation(
            "target price must be positive".to_string(),
        ));
    }
    Ok(())
}

fn validate_channels(channels: &[crate::types::NotificationChannel]) -> Result<()> {
    if channels.is_empty() {
        return Err(AlertError::Validation(
            "at least one notification channel is required".to_string(),
        ));
    }
    Ok(())
}
