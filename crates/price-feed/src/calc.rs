//! Price calculation
//!
//! Pure function from (weight, purity, stones, labor, making-charge %,
//! tax rate) plus a price table to a fully-taxed total. Intermediate math
//! runs unrounded; every exposed monetary field is rounded to 2 decimals
//! exactly once, so repeated calls never accumulate drift.

use chrono::{DateTime, Duration, Utc};
use common::{round2, Currency, Purity};
use serde::{Deserialize, Serialize};

use crate::error::{FeedError, Result};
use crate::types::PriceTable;

/// Inputs to a price calculation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalculationInput {
    pub gold_weight_grams: f64,
    pub purity: Purity,
    pub stone_value: f64,
    pub labor_cost: f64,
    pub making_charges_percent: f64,
}

/// Fully-taxed price breakdown
///
/// `valid_until` is advisory display metadata with a short window; the
/// price lock's TTL is the binding contract.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceCalculation {
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

/// Compute the taxed total for one item against a price table.
///
/// `now` is passed in rather than read from the clock so the result is
/// reproducible for identical inputs.
pub fn calculate(
    input: &CalculationInput,
    table: &PriceTable,
    tax_rate_percent: f64,
    validity: std::time::Duration,
    now: DateTime<Utc>,
) -> Result<PriceCalculation> {
    validate_input(input)?;

    let base = table.base_price_per_gram();
    let gold_value = input.gold_weight_grams * base * input.purity.multiplier();
    let making_charges =
        (gold_value + input.stone_value + input.labor_cost) * input.making_charges_percent / 100.0;
    let subtotal = gold_value + input.stone_value + input.labor_cost + making_charges;
    let tax = subtotal * tax_rate_percent / 100.0;
    let total = subtotal + tax;

    let valid_until = now
        + Duration::from_std(validity)
            .map_err(|_| FeedError::Validation("validity window out of range".to_string()))?;

    Ok(PriceCalculation {
        gold_value: round2(gold_value),
        stone_value: round2(input.stone_value),
        labor_cost: round2(input.labor_cost),
        making_charges: round2(making_charges),
        subtotal: round2(subtotal),
        tax_rate: tax_rate_percent,
        tax: round2(tax),
        total: round2(total),
        currency: table.currency,
        calculated_at: now,
        valid_until,
    })
}

fn validate_input(input: &CalculationInput) -> Result<()> {
    if !input.gold_weight_grams.is_finite() || input.gold_weight_grams <= 0.0 {
        return Err(FeedError::Validation(
            "gold weight must be positive".to_string(),
        ));
    }
    if !input.stone_value.is_finite() || input.stone_value < 0.0 {
        return Err(FeedError::Validation(
            "stone value must not be negative".to_string(),
        ));
    }
    if !input.labor_cost.is_finite() || input.labor_cost < 0.0 {
        return Err(FeedError::Validation(
            "labor cost must not be negative".to_string(),
        ));
    }
    if !input.making_charges_percent.is_finite()
        || input.making_charges_percent < 0.0
        || input.making_charges_percent > 100.0
    {
        return Err(FeedError::Validation(
            "making charges percent must be between 0 and 100".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SpotPrice, TableSource};
    use assert_matches::assert_matches;
    use common::Country;
    use std::collections::HashMap;
    use std::time::Duration as StdDuration;

    // Table with an exact 24K base price per gram, bypassing spot math.
    fn table_with_base(country: Country, base: f64) -> PriceTable {
        let per_gram: HashMap<Purity, f64> = Purity::ALL
            .iter()
            .map(|p| (*p, base * p.multiplier()))
            .collect();
        PriceTable {
            country,
            currency: country.currency(),
            per_gram,
            spot_usd_per_oz: 0.0,
            computed_at: Utc::now(),
            source: TableSource::Upstream,
        }
    }

    fn sample_input() -> CalculationInput {
        CalculationInput {
            gold_weight_grams: 10.0,
            purity: Purity::K22,
            stone_value: 5000.0,
            labor_cost: 2000.0,
            making_charges_percent: 10.0,
        }
    }

    #[test]
    fn test_full_breakdown_for_indian_order() {
        let table = table_with_base(Country::IN, 6000.0);
        let calc = calculate(
            &sample_input(),
            &table,
            3.0,
            StdDuration::from_secs(60),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(calc.gold_value, 55_002.0);
        assert_eq!(calc.making_charges, 6_200.2);
        assert_eq!(calc.subtotal, 68_202.2);
        assert_eq!(calc.tax, 2_046.07);
        assert_eq!(calc.total, 70_248.27);
        assert_eq!(calc.currency, Currency::INR);
    }

    #[test]
    fn test_valid_until_window() {
        let table = table_with_base(Country::IN, 6000.0);
        let now = Utc::now();
        let calc = calculate(
            &sample_input(),
            &table,
            3.0,
            StdDuration::from_secs(60),
            now,
        )
        .unwrap();
        assert_eq!(calc.calculated_at, now);
        assert_eq!((calc.valid_until - calc.calculated_at).num_seconds(), 60);
    }

    #[test]
    fn test_deterministic_for_identical_inputs() {
        let table = table_with_base(Country::AE, 283.5);
        let now = Utc::now();
        let input = sample_input();

        let a = calculate(&input, &table, 5.0, StdDuration::from_secs(60), now).unwrap();
        let b = calculate(&input, &table, 5.0, StdDuration::from_secs(60), now).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_no_drift_across_repeated_calls() {
        let table = table_with_base(Country::IN, 6123.456789);
        let now = Utc::now();
        let input = sample_input();

        let first = calculate(&input, &table, 3.0, StdDuration::from_secs(60), now).unwrap();
        for _ in 0..1000 {
            let next = calculate(&input, &table, 3.0, StdDuration::from_secs(60), now).unwrap();
            assert_eq!(next.total, first.total);
        }
    }

    #[test]
    fn test_rejects_non_positive_weight() {
        let table = table_with_base(Country::IN, 6000.0);
        let mut input = sample_input();
        input.gold_weight_grams = 0.0;

        let err = calculate(&input, &table, 3.0, StdDuration::from_secs(60), Utc::now());
        assert_matches!(err, Err(FeedError::Validation(_)));
    }

    #[test]
    fn test_rejects_negative_stone_value() {
        let table = table_with_base(Country::IN, 6000.0);
        let mut input = sample_input();
        input.stone_value = -1.0;

        let err = calculate(&input, &table, 3.0, StdDuration::from_secs(60), Utc::now());
        assert_matches!(err, Err(FeedError::Validation(_)));
    }

    #[test]
    fn test_rejects_making_charges_over_100_percent() {
        let table = table_with_base(Country::IN, 6000.0);
        let mut input = sample_input();
        input.making_charges_percent = 150.0;

        let err = calculate(&input, &table, 3.0, StdDuration::from_secs(60), Utc::now());
        assert_matches!(err, Err(FeedError::Validation(_)));
    }

    #[test]
    fn test_zero_extras_reduce_to_taxed_gold_value() {
        let table = table_with_base(Country::UK, 60.0);
        let input = CalculationInput {
            gold_weight_grams: 5.0,
            purity: Purity::K24,
            stone_value: 0.0,
            labor_cost: 0.0,
            making_charges_percent: 0.0,
        };
        let calc = calculate(&input, &table, 20.0, StdDuration::from_secs(60), Utc::now()).unwrap();
        assert_eq!(calc.gold_value, 300.0);
        assert_eq!(calc.subtotal, 300.0);
        assert_eq!(calc.tax, 60.0);
        assert_eq!(calc.total, 360.0);
    }
}
