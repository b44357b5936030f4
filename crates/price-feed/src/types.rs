//! Core price feed data types

use chrono::{DateTime, Utc};
use common::{Country, Currency, Purity};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Grams in one troy ounce. Spot gold trades per troy ounce; retail prices
/// are per gram.
pub const GRAMS_PER_TROY_OUNCE: f64 = 31.1035;

/// Spot gold price in USD per troy ounce
///
/// Immutable once created; a newer observation supersedes it, nothing
/// mutates it in place.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpotPrice {
    pub price_usd_per_oz: f64,
    pub change_24h: f64,
    pub change_percent_24h: f64,
    pub observed_at: DateTime<Utc>,
}

/// Where a price table's inputs came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableSource {
    /// Freshly fetched from the upstream feed
    Upstream,
    /// Served from the last-known-good fallback snapshot
    Fallback,
    /// Hard-coded conservative defaults; no upstream data has ever landed
    Default,
}

/// Per-purity price table for one country
///
/// Derived deterministically from spot price, exchange rate, and the purity
/// multiplier table. Replaced wholesale on refresh, never mutated; readers
/// hold an `Arc` to a consistent snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTable {
    pub country: Country,
    pub currency: Currency,
    /// Price per gram in the country's currency, keyed by purity.
    /// Values are unrounded; rounding happens at the point of exposure.
    pub per_gram: HashMap<Purity, f64>,
    pub spot_usd_per_oz: f64,
    pub computed_at: DateTime<Utc>,
    pub source: TableSource,
}

impl PriceTable {
    /// Derive the table for a country from a spot observation and the
    /// USD→currency exchange rate.
    pub fn compute(
        country: Country,
        spot: &SpotPrice,
        usd_rate: f64,
        source: TableSource,
        now: DateTime<Utc>,
    ) -> Self {
        let base_per_gram = spot.price_usd_per_oz * usd_rate / GRAMS_PER_TROY_OUNCE;

        let per_gram = Purity::ALL
            .iter()
            .map(|p| (*p, base_per_gram * p.multiplier()))
            .collect();

        Self {
            country,
            currency: country.currency(),
            per_gram,
            spot_usd_per_oz: spot.price_usd_per_oz,
            computed_at: now,
            source,
        }
    }

    /// Unrounded price per gram for a purity. The table always carries an
    /// entry for every supported purity.
    pub fn price_per_gram(&self, purity: Purity) -> f64 {
        self.per_gram.get(&purity).copied().unwrap_or(0.0)
    }

    /// 24K-equivalent base price per gram
    pub fn base_price_per_gram(&self) -> f64 {
        self.price_per_gram(Purity::K24)
    }

    /// Rounded per-purity prices in fixed declaration order, for display
    pub fn rounded_prices(&self) -> Vec<(Purity, f64)> {
        Purity::ALL
            .iter()
            .map(|p| (*p, common::round2(self.price_per_gram(*p))))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spot(price: f64) -> SpotPrice {
        SpotPrice {
            price_usd_per_oz: price,
            change_24h: 0.0,
            change_percent_24h: 0.0,
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn test_table_covers_every_purity() {
        let table = PriceTable::compute(
            Country::IN,
            &spot(2400.0),
            84.0,
            TableSource::Upstream,
            Utc::now(),
        );
        for purity in Purity::ALL {
            assert!(table.price_per_gram(purity) > 0.0);
        }
    }

    #[test]
    fn test_table_purity_ratios() {
        let table = PriceTable::compute(
            Country::AE,
            &spot(2400.0),
            3.6725,
            TableSource::Upstream,
            Utc::now(),
        );
        let base = table.base_price_per_gram();
        assert!((table.price_per_gram(Purity::K22) - base * 0.9167).abs() < 1e-9);
        assert!((table.price_per_gram(Purity::K10) - base * 0.417).abs() < 1e-9);
    }

    #[test]
    fn test_table_base_price_conversion() {
        let table = PriceTable::compute(
            Country::IN,
            &spot(3110.35),
            1.0,
            TableSource::Upstream,
            Utc::now(),
        );
        // 3110.35 USD/oz at rate 1.0 is exactly 100 per gram.
        assert!((table.base_price_per_gram() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_table_currency_follows_country() {
        let table = PriceTable::compute(
            Country::UK,
            &spot(2400.0),
            0.79,
            TableSource::Fallback,
            Utc::now(),
        );
        assert_eq!(table.currency, Currency::GBP);
        assert_eq!(table.source, TableSource::Fallback);
    }
}
