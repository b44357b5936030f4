//! Upstream feed client
//!
//! Thin HTTP client over the metals price API. All calls carry a bounded
//! timeout so a dead upstream trips the cache's fallback path instead of
//! hanging a request.

use async_trait::async_trait;
use common::Currency;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{FeedError, Result};

/// One spot observation as reported by the upstream feed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotQuote {
    pub price_usd_per_oz: f64,
    pub change_24h: f64,
    pub change_percent_24h: f64,
}

/// Upstream feed abstraction
///
/// The production implementation talks HTTP; tests substitute stubs.
#[async_trait]
pub trait FeedClient: Send + Sync {
    /// Fetch the current gold spot price in USD per troy ounce
    async fn fetch_spot(&self) -> Result<SpotQuote>;

    /// Fetch USD→currency exchange rates for all supported currencies
    async fn fetch_rates(&self) -> Result<HashMap<Currency, f64>>;
}

#[derive(Debug, Deserialize)]
struct SpotPayload {
    price: f64,
    #[serde(default)]
    change_24h: f64,
    #[serde(default)]
    change_percent_24h: f64,
}

#[derive(Debug, Deserialize)]
struct RatesPayload {
    rates: HashMap<String, f64>,
}

/// HTTP implementation of [`FeedClient`]
pub struct HttpFeedClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpFeedClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn url(&self, path: &str) -> String {
        match &self.api_key {
            Some(key) => format!("{}{}?api_key={}", self.base_url, path, key),
            None => format!("{}{}", self.base_url, path),
        }
    }
}

#[async_trait]
impl FeedClient for HttpFeedClient {
    async fn fetch_spot(&self) -> Result<SpotQuote> {
        let response = self.http.get(self.url("/gold/spot")).send().await?;

        if !response.status().is_success() {
            return Err(FeedError::UpstreamUnavailable(format!(
                "spot endpoint returned {}",
                response.status()
            )));
        }

        let payload: SpotPayload = response.json().await?;
        if !payload.price.is_finite() || payload.price <= 0.0 {
            return Err(FeedError::Payload(format!(
                "non-positive spot price: {}",
                payload.price
            )));
        }

        Ok(SpotQuote {
            price_usd_per_oz: payload.price,
            change_24h: payload.change_24h,
            change_percent_24h: payload.change_percent_24h,
        })
    }

    async fn fetch_rates(&self) -> Result<HashMap<Currency, f64>> {
        let response = self.http.get(self.url("/rates")).send().await?;

        if !response.status().is_success() {
            return Err(FeedError::UpstreamUnavailable(format!(
                "rates endpoint returned {}",
                response.status()
            )));
        }

        let payload: RatesPayload = response.json().await?;

        let mut rates = HashMap::new();
        rates.insert(Currency::USD, 1.0);
        for (code, rate) in payload.rates {
            let Some(currency) = Currency::parse(&code) else {
                continue;
            };
            if !rate.is_finite() || rate <= 0.0 {
                return Err(FeedError::Payload(format!(
                    "non-positive rate for {}: {}",
                    code, rate
                )));
            }
            rates.insert(currency, rate);
        }

        Ok(rates)
    }
}
