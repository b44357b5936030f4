//! Price feed service
//!
//! Fetches and caches the gold spot price and currency exchange rates,
//! derives per-purity, per-country price tables, and computes fully-taxed
//! purchase totals. The cache degrades to last-known-good values on upstream
//! failure; callers never see an upstream error.

pub mod api;
pub mod cache;
pub mod calc;
pub mod client;
pub mod error;
pub mod history;
pub mod types;

pub use cache::PriceFeedCache;
pub use calc::{calculate, CalculationInput, PriceCalculation};
pub use client::{FeedClient, HttpFeedClient, SpotQuote};
pub use error::{FeedError, Result};
pub use history::{HistoryPeriod, HistoryPoint, HistorySummary};
pub use types::{PriceTable, SpotPrice, TableSource, GRAMS_PER_TROY_OUNCE};
