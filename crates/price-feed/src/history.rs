//! Synthetic price history
//!
//! No historical store exists, so the history endpoint serves a synthetic
//! but internally consistent series: dates are monotone, fluctuation around
//! the current price is bounded, and the same request always produces the
//! same series. Each date's deviation is derived from a hash of the date
//! itself, so the series is finite, lazy, and restartable.

use chrono::{Duration, NaiveDate};
use common::round2;
use serde::{Deserialize, Serialize};

/// Requested history window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryPeriod {
    #[serde(rename = "7d")]
    Days7,
    #[serde(rename = "30d")]
    Days30,
    #[serde(rename = "90d")]
    Days90,
    #[serde(rename = "365d")]
    Days365,
}

impl HistoryPeriod {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "7d" => Some(Self::Days7),
            "30d" => Some(Self::Days30),
            "90d" => Some(Self::Days90),
            "365d" => Some(Self::Days365),
            _ => None,
        }
    }

    pub fn days(&self) -> i64 {
        match self {
            Self::Days7 => 7,
            Self::Days30 => 30,
            Self::Days90 => 90,
            Self::Days365 => 365,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Days7 => "7d",
            Self::Days30 => "30d",
            Self::Days90 => "90d",
            Self::Days365 => "365d",
        }
    }
}

/// One daily sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub date: NaiveDate,
    pub price: f64,
    pub high: f64,
    pub low: f64,
}

/// Aggregate view over a series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistorySummary {
    pub current: f64,
    pub change: f64,
    pub change_percent: f64,
    pub high: f64,
    pub low: f64,
    pub average: f64,
}

/// Daily deviation cap around the base price.
const MAX_FLUCTUATION: f64 = 0.02;
/// Intraday spread around a day's price.
const INTRADAY_SPREAD: f64 = 0.005;

/// Lazy series of daily samples, oldest first, ending today.
///
/// Today's sample is pinned to the base price so the summary's `current`
/// matches what the live endpoints report.
pub fn series(
    base_price: f64,
    period: HistoryPeriod,
    today: NaiveDate,
) -> impl Iterator<Item = HistoryPoint> {
    let days = period.days();
    (0..=days).map(move |offset| {
        let date = today - Duration::days(days - offset);
        let price = if date == today {
            base_price
        } else {
            base_price * (1.0 + deviation(date))
        };
        HistoryPoint {
            date,
            price: round2(price),
            high: round2(price * (1.0 + INTRADAY_SPREAD)),
            low: round2(price * (1.0 - INTRADAY_SPREAD)),
        }
    })
}

/// Materialize a series together with its summary
pub fn generate(
    base_price: f64,
    period: HistoryPeriod,
    today: NaiveDate,
) -> (Vec<HistoryPoint>, HistorySummary) {
    let points: Vec<HistoryPoint> = series(base_price, period, today).collect();

    // The series always has at least one point.
    let first = points.first().map(|p| p.price).unwrap_or(base_price);
    let current = points.last().map(|p| p.price).unwrap_or(base_price);
    let high = points.iter().map(|p| p.high).fold(f64::MIN, f64::max);
    let low = points.iter().map(|p| p.low).fold(f64::MAX, f64::min);
    let average = points.iter().map(|p| p.price).sum::<f64>() / points.len() as f64;

    let change = current - first;
    let change_percent = if first != 0.0 {
        change / first * 100.0
    } else {
        0.0
    };

    let summary = HistorySummary {
        current: round2(current),
        change: round2(change),
        change_percent: round2(change_percent),
        high: round2(high),
        low: round2(low),
        average: round2(average),
    };

    (points, summary)
}

/// Deterministic per-date deviation in [-MAX_FLUCTUATION, +MAX_FLUCTUATION],
/// via an FNV-1a hash of the ISO date string.
fn deviation(date: NaiveDate) -> f64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = FNV_OFFSET;
    for byte in date.to_string().bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }

    let unit = (hash % 10_000) as f64 / 10_000.0;
    (unit * 2.0 - 1.0) * MAX_FLUCTUATION
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()
    }

    #[test]
    fn test_series_is_deterministic() {
        let (a, _) = generate(6000.0, HistoryPeriod::Days30, today());
        let (b, _) = generate(6000.0, HistoryPeriod::Days30, today());
        assert_eq!(a, b);
    }

    #[test]
    fn test_dates_are_monotone_and_end_today() {
        let (points, _) = generate(6000.0, HistoryPeriod::Days90, today());
        assert_eq!(points.len(), 91);
        assert_eq!(points.last().map(|p| p.date), Some(today()));
        for pair in points.windows(2) {
            assert!(pair[0].date < pair[1].date);
        }
    }

    #[test]
    fn test_fluctuation_is_bounded() {
        let base = 6000.0;
        let (points, _) = generate(base, HistoryPeriod::Days365, today());
        for point in &points {
            assert!(point.price >= base * (1.0 - MAX_FLUCTUATION) - 0.01);
            assert!(point.price <= base * (1.0 + MAX_FLUCTUATION) + 0.01);
            assert!(point.low <= point.price);
            assert!(point.price <= point.high);
        }
    }

    #[test]
    fn test_current_is_pinned_to_base_price() {
        let (points, summary) = generate(6123.45, HistoryPeriod::Days7, today());
        assert_eq!(points.last().map(|p| p.price), Some(6123.45));
        assert_eq!(summary.current, 6123.45);
    }

    #[test]
    fn test_summary_envelope_contains_all_points() {
        let (points, summary) = generate(250.0, HistoryPeriod::Days30, today());
        for point in &points {
            assert!(summary.low <= point.price);
            assert!(point.price <= summary.high);
        }
        assert!(summary.low <= summary.average && summary.average <= summary.high);
    }

    #[test]
    fn test_period_parsing() {
        assert_eq!(HistoryPeriod::parse("7d"), Some(HistoryPeriod::Days7));
        assert_eq!(HistoryPeriod::parse("365d"), Some(HistoryPeriod::Days365));
        assert_eq!(HistoryPeriod::parse("14d"), None);
    }

    #[test]
    fn test_series_is_restartable() {
        let iter = series(6000.0, HistoryPeriod::Days7, today());
        let first_pass: Vec<_> = iter.collect();
        let second_pass: Vec<_> = series(6000.0, HistoryPeriod::Days7, today()).collect();
        assert_eq!(first_pass, second_pass);
    }
}
