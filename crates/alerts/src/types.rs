//! Price alert data types

use chrono::{DateTime, Utc};
use common::{AlertId, Country, OwnerId, Purity};
use serde::{Deserialize, Serialize};

/// Which side of the threshold fires the alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Above,
    Below,
}

impl Direction {
    /// Threshold test against the current price
    pub fn matches(&self, current_price: f64, target_price: f64) -> bool {
        match self {
            Direction::Above => current_price >= target_price,
            Direction::Below => current_price <= target_price,
        }
    }
}

/// Delivery channel for a triggered alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannel {
    Email,
    Push,
    Sms,
}

/// A user-defined threshold alert
///
/// One-shot: `is_active` flips to false atomically with the first match
/// and the alert never re-fires unless the user re-enables it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceAlert {
    pub id: AlertId,
    pub owner_id: OwnerId,
    pub target_price: f64,
    pub direction: Direction,
    pub purity: Purity,
    pub country: Country,
    pub channels: Vec<NotificationChannel>,
    pub is_active: bool,
    pub triggered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Inputs for creating an alert
#[derive(Debug, Clone)]
pub struct NewAlert {
    pub target_price: f64,
    pub direction: Direction,
    pub purity: Purity,
    pub country: Country,
    pub channels: Vec<NotificationChannel>,
}

/// Partial update to an alert; absent fields keep their value.
/// Concurrent updates from the same user resolve last-write-wins.
#[derive(Debug, Clone, Default)]
pub struct AlertUpdate {
    pub target_price: Option<f64>,
    pub direction: Option<Direction>,
    pub purity: Option<Purity>,
    pub country: Option<Country>,
    pub channels: Option<Vec<NotificationChannel>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_above() {
        assert!(!Direction::Above.matches(6400.0, 6500.0));
        assert!(Direction::Above.matches(6500.0, 6500.0));
        assert!(Direction::Above.matches(6501.0, 6500.0));
    }

    #[test]
    fn test_direction_below() {
        assert!(Direction::Below.matches(6400.0, 6500.0));
        assert!(Direction::Below.matches(6500.0, 6500.0));
        assert!(!Direction::Below.matches(6501.0, 6500.0));
    }
}
