//! API models for alert HTTP endpoints

use chrono::{DateTime, Utc};
use common::{AlertId, Country, Purity};
use serde::{Deserialize, Serialize};

use crate::types::{Direction, NotificationChannel, PriceAlert};

/// Request body for `POST /alerts`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAlertRequest {
    pub target_price: f64,
    pub direction: Direction,
    pub purity: Purity,
    pub country: Country,
    pub notification_channels: Vec<NotificationChannel>,
}

/// Request body for `PATCH /alerts/:id`
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAlertRequest {
    #[serde(default)]
    pub target_price: Option<f64>,
    #[serde(default)]
    pub direction: Option<Direction>,
    #[serde(default)]
    pub purity: Option<Purity>,
    #[serde(default)]
    pub country: Option<Country>,
    #[serde(default)]
    pub notification_channels: Option<Vec<NotificationChannel>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertResponse {
    pub id: AlertId,
    pub target_price: f64,
    pub direction: Direction,
    pub purity: Purity,
    pub country: Country,
    pub notification_channels: Vec<NotificationChannel>,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub triggered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PriceAlert> for AlertResponse {
    fn from(alert: PriceAlert) -> Self {
        Self {
            id: alert.id,
            target_price: alert.target_price,
            direction: alert.direction,
            purity: alert.purity,
            country: alert.country,
            notification_channels: alert.channels,
            is_active: alert.is_active,
            triggered_at: alert.triggered_at,
            created_at: alert.created_at,
            updated_at: alert.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListAlertsResponse {
    pub alerts: Vec<AlertResponse>,
}
