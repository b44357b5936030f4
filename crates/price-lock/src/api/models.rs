//! API models for price lock HTTP endpoints

use chrono::{DateTime, Utc};
use common::{Country, Currency, LockId, Purity};
use serde::{Deserialize, Serialize};

use crate::engine::LockValidation;
use crate::types::{LockItem, LockStatus, PriceLock};

/// One item in a lock creation request
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLockItem {
    pub product_id: String,
    #[serde(default)]
    pub variant_id: Option<String>,
    pub quantity: u32,
    pub gold_weight: f64,
    pub purity: Purity,
    #[serde(default)]
    pub stone_value: f64,
    #[serde(default)]
    pub labor_cost: f64,
    #[serde(default)]
    pub making_charges_percent: f64,
}

/// Request body for `POST /price-lock`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLockRequest {
    pub items: Vec<CreateLockItem>,
    pub country: Country,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockItemResponse {
    pub product_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<String>,
    pub quantity: u32,
    pub locked_unit_price: f64,
    pub line_total: f64,
}

impl From<&LockItem> for LockItemResponse {
    fn from(item: &LockItem) -> Self {
        Self {
            product_id: item.product_id.clone(),
            variant_id: item.variant_id.clone(),
            quantity: item.quantity,
            locked_unit_price: item.locked_unit_price,
            line_total: common::round2(item.line_total()),
        }
    }
}

/// A price lock as returned to its owner
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceLockResponse {
    pub id: LockId,
    pub items: Vec<LockItemResponse>,
    pub total: f64,
    pub reference_price_at_lock: f64,
    pub country: Country,
    pub currency: Currency,
    pub status: LockStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Seconds remaining before expiry at response time
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_at: Option<DateTime<Utc>>,
}

impl PriceLockResponse {
    pub fn from_lock(lock: &PriceLock, now: DateTime<Utc>) -> Self {
        Self {
            id: lock.id,
            items: lock.items.iter().map(LockItemResponse::from).collect(),
            total: lock.total(),
            reference_price_at_lock: lock.reference_price_at_lock,
            country: lock.country,
            currency: lock.currency,
            status: lock.status,
            created_at: lock.created_at,
            expires_at: lock.expires_at,
            expires_in: lock.remaining_secs(now),
            used_at: lock.used_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<LockValidation> for ValidateResponse {
    fn from(validation: LockValidation) -> Self {
        Self {
            valid: validation.valid,
            reason: validation.reason,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListLocksResponse {
    pub locks: Vec<PriceLockResponse>,
}
