//! API models for price feed HTTP endpoints

use chrono::{DateTime, NaiveDate, Utc};
use common::{round2, Country, Currency, Purity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::calc::PriceCalculation;
use crate::history::{HistoryPoint, HistorySummary};
use crate::types::{PriceTable, SpotPrice, TableSource};

/// Current spot price
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotPriceResponse {
    pub price: f64,
    pub currency: Currency,
    pub unit: String,
    pub change24h: f64,
    pub change_percent24h: f64,
    pub observed_at: DateTime<Utc>,
}

impl From<SpotPrice> for SpotPriceResponse {
    fn from(spot: SpotPrice) -> Self {
        Self {
            price: round2(spot.price_usd_per_oz),
            currency: Currency::USD,
            unit: "toz".to_string(),
            change24h: round2(spot.change_24h),
            change_percent24h: round2(spot.change_percent_24h),
            observed_at: spot.observed_at,
        }
    }
}

/// Per-purity price table for one country
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceTableResponse {
    pub country: Country,
    pub currency: Currency,
    /// Purity label → rounded price per gram
    pub prices: BTreeMap<String, f64>,
    pub spot_price_usd: f64,
    pub computed_at: DateTime<Utc>,
    pub source: TableSource,
}

impl From<&PriceTable> for PriceTableResponse {
    fn from(table: &PriceTable) -> Self {
        let prices = Purity::ALL
            .iter()
            .map(|p| (p.label().to_string(), round2(table.price_per_gram(*p))))
            .collect();
        Self {
            country: table.country,
            currency: table.currency,
            prices,
            spot_price_usd: round2(table.spot_usd_per_oz),
            computed_at: table.computed_at,
            source: table.source,
        }
    }
}

/// Query parameters selecting a country
#[derive(Debug, Default, Deserialize)]
pub struct CountryParams {
    #[serde(default)]
    pub country: Option<String>,
}

/// Query parameters for the history endpoint
#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPointResponse {
    pub date: NaiveDate,
    pub price: f64,
    pub high: f64,
    pub low: f64,
}

impl From<&HistoryPoint> for HistoryPointResponse {
    fn from(point: &HistoryPoint) -> Self {
        Self {
            date: point.date,
            price: point.price,
            high: point.high,
            low: point.low,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySummaryResponse {
    pub current: f64,
    pub change: f64,
    pub change_percent: f64,
    pub high: f64,
    pub low: f64,
    pub average: f64,
}

impl From<HistorySummary> for HistorySummaryResponse {
    fn from(summary: HistorySummary) -> Self {
        Self {
            current: summary.current,
            change: summary.change,
            change_percent: summary.change_percent,
            high: summary.high,
            low: summary.low,
            average: summary.average,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub period: String,
    pub country: Country,
    pub currency: Currency,
    pub summary: HistorySummaryResponse,
    pub points: Vec<HistoryPointResponse>,
}

/// Request body for `POST /price/calculate`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculateRequest {
    pub gold_weight: f64,
    pub purity: Purity,
    #[serde(default)]
    pub stone_value: f64,
    #[serde(default)]
    pub labor_cost: f64,
    #[serde(default)]
    pub making_charges_percent: f64,
    pub country: Country,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationResponse {
    pub gold_value: f64,
    pub stone_value: f64,
    pub labor_cost: f64,
    pub making_charges: f64,
    pub subtotal: f64,
    pub tax_rate: f64,
    pub tax: f64,
    pub total: f64,
    pub currency: Currency,
    pub calculated_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

impl From<PriceCalculation> for CalculationResponse {
    fn from(calc: PriceCalculation) -> Self {
        Self {
            gold_value: calc.gold_value,
            stone_value: calc.stone_value,
            labor_cost: calc.labor_cost,
            making_charges: calc.making_charges,
            subtotal: calc.subtotal,
            tax_rate: calc.tax_rate,
            tax: calc.tax,
            total: calc.total,
            currency: calc.currency,
            calculated_at: calc.calculated_at,
            valid_until: calc.valid_until,
        }
    }
}
