//! Price feed cache with fallback chain
//!
//! Serves spot prices, exchange rates, and derived per-country price tables.
//! Entries younger than their freshness window are served without an
//! upstream call. On a miss the upstream is queried; on upstream failure the
//! cache falls back to the last-known-good snapshot, and if none exists, to
//! hard-coded conservative defaults. An unavailable price blocks checkout,
//! so availability wins over freshness here.

use chrono::Utc;
use common::{Country, Currency};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use observability::PriceMetrics;

use crate::client::FeedClient;
use crate::types::{PriceTable, SpotPrice, TableSource};

/// Hard-coded defaults, used only before the first successful upstream fetch.
const DEFAULT_SPOT_USD_PER_OZ: f64 = 2400.0;
const DEFAULT_RATES: [(Currency, f64); 4] = [
    (Currency::USD, 1.0),
    (Currency::INR, 84.0),
    (Currency::AED, 3.6725),
    (Currency::GBP, 0.79),
];

/// Where a cached value came from, tracked per slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Upstream,
    Fallback,
    Default,
}

impl Origin {
    fn worse(self, other: Origin) -> Origin {
        use Origin::*;
        match (self, other) {
            (Default, _) | (_, Default) => Default,
            (Fallback, _) | (_, Fallback) => Fallback,
            _ => Upstream,
        }
    }

    fn table_source(self) -> TableSource {
        match self {
            Origin::Upstream => TableSource::Upstream,
            Origin::Fallback => TableSource::Fallback,
            Origin::Default => TableSource::Default,
        }
    }
}

struct Slot<T> {
    value: T,
    origin: Origin,
    stored_at: Instant,
}

impl<T> Slot<T> {
    fn fresh(&self, window: Duration) -> bool {
        self.stored_at.elapsed() < window
    }
}

#[derive(Default)]
struct FeedState {
    spot: Option<Slot<SpotPrice>>,
    rates: Option<Slot<HashMap<Currency, f64>>>,
    tables: HashMap<Country, Slot<Arc<PriceTable>>>,
    // Last-known-good snapshots, written on every successful upstream fetch
    // and on every table computation.
    fallback_spot: Option<SpotPrice>,
    fallback_rates: Option<HashMap<Currency, f64>>,
}

/// Shared price feed cache
///
/// Read by every request handler and both scheduler routines; written by
/// whichever caller observes a stale slot. Tables are replaced wholesale
/// behind an `Arc`, so readers never observe a half-updated table.
pub struct PriceFeedCache {
    client: Arc<dyn FeedClient>,
    state: RwLock<FeedState>,
    price_freshness: Duration,
    rates_freshness: Duration,
}

impl PriceFeedCache {
    pub fn new(
        client: Arc<dyn FeedClient>,
        price_freshness: Duration,
        rates_freshness: Duration,
    ) -> Self {
        Self {
            client,
            state: RwLock::new(FeedState::default()),
            price_freshness,
            rates_freshness,
        }
    }

    /// Current spot price. Never fails; the fallback chain absorbs upstream
    /// errors.
    pub async fn spot_price(&self) -> SpotPrice {
        self.spot_with_origin().await.0
    }

    /// Current USD→currency exchange rates. Never fails.
    pub async fn exchange_rates(&self) -> HashMap<Currency, f64> {
        self.rates_with_origin().await.0
    }

    /// Convert an amount between supported currencies using cached rates
    pub async fn convert(&self, amount: f64, from: Currency, to: Currency) -> f64 {
        if from == to {
            return amount;
        }
        let rates = self.exchange_rates().await;
        let from_rate = rates.get(&from).copied().unwrap_or(1.0);
        let to_rate = rates.get(&to).copied().unwrap_or(1.0);
        amount / from_rate * to_rate
    }

    /// Price table for a country, recomputed when stale
    pub async fn price_table(&self, country: Country) -> Arc<PriceTable> {
        {
            let state = self.state.read();
            if let Some(slot) = state.tables.get(&country) {
                if slot.fresh(self.price_freshness) {
                    return Arc::clone(&slot.value);
                }
            }
        }
        self.refresh(country).await
    }

    /// Force-recompute the table for a country from the freshest available
    /// spot and rates. Used by the scheduler's refresh tick. Never fails;
    /// the table's `source` tag records whether upstream data was used.
    pub async fn refresh(&self, country: Country) -> Arc<PriceTable> {
        let (spot, spot_origin) = self.spot_with_origin().await;
        let (rates, rates_origin) = self.rates_with_origin().await;

        let currency = country.currency();
        let usd_rate = rates.get(&currency).copied().unwrap_or(1.0);

        let origin = spot_origin.worse(rates_origin);
        let table = Arc::new(PriceTable::compute(
            country,
            &spot,
            usd_rate,
            origin.table_source(),
            Utc::now(),
        ));

        let mut state = self.state.write();
        state.tables.insert(
            country,
            Slot {
                value: Arc::clone(&table),
                origin,
                stored_at: Instant::now(),
            },
        );

        table
    }

    async fn spot_with_origin(&self) -> (SpotPrice, Origin) {
        {
            let state = self.state.read();
            if let Some(slot) = &state.spot {
                if slot.fresh(self.price_freshness) {
                    return (slot.value, slot.origin);
                }
            }
        }

        match self.client.fetch_spot().await {
            Ok(quote) => {
                let spot = SpotPrice {
                    price_usd_per_oz: quote.price_usd_per_oz,
                    change_24h: quote.change_24h,
                    change_percent_24h: quote.change_percent_24h,
                    observed_at: Utc::now(),
                };
                let mut state = self.state.write();
                state.spot = Some(Slot {
                    value: spot,
                    origin: Origin::Upstream,
                    stored_at: Instant::now(),
                });
                state.fallback_spot = Some(spot);
                (spot, Origin::Upstream)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Spot fetch failed, serving fallback");

                let mut state = self.state.write();
                let (spot, origin) = match state.fallback_spot {
                    Some(spot) => {
                        PriceMetrics::upstream_fallback("snapshot");
                        (spot, Origin::Fallback)
                    }
                    None => {
                        PriceMetrics::upstream_fallback("default");
                        (default_spot(), Origin::Default)
                    }
                };
                // Caching the fallback result rate-limits retries against a
                // dead upstream to once per freshness window.
                state.spot = Some(Slot {
                    value: spot,
                    origin,
                    stored_at: Instant::now(),
                });
                (spot, origin)
            }
        }
    }

    async fn rates_with_origin(&self) -> (HashMap<Currency, f64>, Origin) {
        {
            let state = self.state.read();
            if let Some(slot) = &state.rates {
                if slot.fresh(self.rates_freshness) {
                    return (slot.value.clone(), slot.origin);
                }
            }
        }

        match self.client.fetch_rates().await {
            Ok(rates) => {
                let mut state = self.state.write();
                state.rates = Some(Slot {
                    value: rates.clone(),
                    origin: Origin::Upstream,
                    stored_at: Instant::now(),
                });
                state.fallback_rates = Some(rates.clone());
                (rates, Origin::Upstream)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Rates fetch failed, serving fallback");

                let mut state = self.state.write();
                let (rates, origin) = match &state.fallback_rates {
                    Some(rates) => {
                        PriceMetrics::upstream_fallback("snapshot");
                        (rates.clone(), Origin::Fallback)
                    }
                    None => {
                        PriceMetrics::upstream_fallback("default");
                        (default_rates(), Origin::Default)
                    }
                };
                state.rates = Some(Slot {
                    value: rates.clone(),
                    origin,
                    stored_at: Instant::now(),
                });
                (rates, origin)
            }
        }
    }
}

fn default_spot() -> SpotPrice {
    SpotPrice {
        price_usd_per_oz: DEFAULT_SPOT_USD_PER_OZ,
        change_24h: 0.0,
        change_percent_24h: 0.0,
        observed_at: Utc::now(),
    }
}

fn default_rates() -> HashMap<Currency, f64> {
    DEFAULT_RATES.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::SpotQuote;
    use crate::error::{FeedError, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct StubClient {
        spot_price: f64,
        failing: AtomicBool,
        spot_calls: AtomicUsize,
    }

    impl StubClient {
        fn new(spot_price: f64) -> Self {
            Self {
                spot_price,
                failing: AtomicBool::new(false),
                spot_calls: AtomicUsize::new(0),
            }
        }

        fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl FeedClient for StubClient {
        async fn fetch_spot(&self) -> Result<SpotQuote> {
            self.spot_calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(FeedError::UpstreamUnavailable("stub down".to_string()));
            }
            Ok(SpotQuote {
                price_usd_per_oz: self.spot_price,
                change_24h: 12.5,
                change_percent_24h: 0.5,
            })
        }

        async fn fetch_rates(&self) -> Result<HashMap<Currency, f64>> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(FeedError::UpstreamUnavailable("stub down".to_string()));
            }
            Ok([
                (Currency::USD, 1.0),
                (Currency::INR, 84.0),
                (Currency::AED, 3.6725),
                (Currency::GBP, 0.8),
            ]
            .into_iter()
            .collect())
        }
    }

    fn cache_with(client: Arc<StubClient>) -> PriceFeedCache {
        PriceFeedCache::new(client, Duration::from_secs(60), Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn test_spot_served_from_cache_within_freshness_window() {
        let client = Arc::new(StubClient::new(2400.0));
        let cache = cache_with(Arc::clone(&client));

        let first = cache.spot_price().await;
        let second = cache.spot_price().await;

        assert_eq!(first.price_usd_per_oz, 2400.0);
        assert_eq!(first.price_usd_per_oz, second.price_usd_per_oz);
        assert_eq!(client.spot_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_freshness_refetches_every_call() {
        let client = Arc::new(StubClient::new(2400.0));
        let cache =
            PriceFeedCache::new(
                Arc::clone(&client) as Arc<dyn FeedClient>,
                Duration::ZERO,
                Duration::from_secs(3600),
            );

        cache.spot_price().await;
        cache.spot_price().await;
        assert_eq!(client.spot_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fallback_snapshot_serves_after_upstream_failure() {
        let client = Arc::new(StubClient::new(2500.0));
        let cache = PriceFeedCache::new(
            Arc::clone(&client) as Arc<dyn FeedClient>,
            Duration::ZERO,
            Duration::ZERO,
        );

        // Prime the fallback snapshot, then kill the upstream.
        let good = cache.spot_price().await;
        client.set_failing(true);
        let degraded = cache.spot_price().await;

        assert_eq!(degraded.price_usd_per_oz, good.price_usd_per_oz);

        let table = cache.refresh(Country::IN).await;
        assert_eq!(table.source, TableSource::Fallback);
    }

    #[tokio::test]
    async fn test_defaults_used_when_no_snapshot_exists() {
        let client = Arc::new(StubClient::new(2500.0));
        client.set_failing(true);
        let cache = PriceFeedCache::new(
            Arc::clone(&client) as Arc<dyn FeedClient>,
            Duration::ZERO,
            Duration::ZERO,
        );

        let spot = cache.spot_price().await;
        assert_eq!(spot.price_usd_per_oz, DEFAULT_SPOT_USD_PER_OZ);

        let table = cache.refresh(Country::AE).await;
        assert_eq!(table.source, TableSource::Default);
        assert!(table.base_price_per_gram() > 0.0);
    }

    #[tokio::test]
    async fn test_table_derives_from_spot_and_rate() {
        let client = Arc::new(StubClient::new(3110.35));
        let cache = cache_with(client);

        let table = cache.price_table(Country::IN).await;
        // 3110.35 USD/oz x 84 INR/USD is exactly 8400 INR per gram.
        assert!((table.base_price_per_gram() - 8400.0).abs() < 1e-6);
        assert_eq!(table.currency, Currency::INR);
        assert_eq!(table.source, TableSource::Upstream);
    }

    #[tokio::test]
    async fn test_price_table_hits_cache_when_fresh() {
        let client = Arc::new(StubClient::new(2400.0));
        let cache = cache_with(Arc::clone(&client));

        let first = cache.price_table(Country::UK).await;
        let second = cache.price_table(Country::UK).await;
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_convert_round_trips_through_usd() {
        let client = Arc::new(StubClient::new(2400.0));
        let cache = cache_with(client);

        let inr = cache.convert(100.0, Currency::USD, Currency::INR).await;
        assert!((inr - 8400.0).abs() < 1e-9);

        let gbp = cache.convert(8400.0, Currency::INR, Currency::GBP).await;
        assert!((gbp - 80.0).abs() < 1e-9);

        let same = cache.convert(42.0, Currency::AED, Currency::AED).await;
        assert_eq!(same, 42.0);
    }
}
