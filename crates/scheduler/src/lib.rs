//! Background loops driving the price pipeline
//!
//! The [`PriceScheduler`] owns two independent routines: a refresh loop that
//! recomputes per-country price tables and publishes them to the broadcast
//! hub, and an alert loop that evaluates active alerts against current
//! prices. Both are plain `tokio::time::interval` loops cancelled
//! cooperatively through a `CancellationToken`; a tick never overlaps with
//! itself and a slow tick skips missed firings instead of bursting.
//!
//! Tick-level failures are logged and absorbed. A bad upstream or a failed
//! notification must not stop the loops.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use alerts::{AlertStore, Notifier};
use common::{round2, Country, Purity};
use observability::PriceMetrics;
use price_feed::{PriceFeedCache, TableSource};
use server::broadcast::{BroadcastHub, PriceUpdate};

/// Intervals for the two scheduler routines
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// Period of the price refresh loop
    pub refresh_interval: Duration,
    /// Period of the alert scan loop
    pub alert_scan_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(60),
            alert_scan_interval: Duration::from_secs(30),
        }
    }
}

/// Owns the refresh and alert-scan loops
///
/// `start` is idempotent; a second call while running is a logged no-op.
/// `stop` cancels both loops and waits for them to finish.
pub struct PriceScheduler {
    cache: Arc<PriceFeedCache>,
    alerts: Arc<AlertStore>,
    notifier: Arc<dyn Notifier>,
    hub: Arc<BroadcastHub>,
    config: SchedulerConfig,
    running: AtomicBool,
    token: Mutex<Option<CancellationToken>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl PriceScheduler {
    pub fn new(
        cache: Arc<PriceFeedCache>,
        alerts: Arc<AlertStore>,
        notifier: Arc<dyn Notifier>,
        hub: Arc<BroadcastHub>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            cache,
            alerts,
            notifier,
            hub,
            config,
            running: AtomicBool::new(false),
            token: Mutex::new(None),
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start both loops. Idempotent while running.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Scheduler already running, start ignored");
            return;
        }

        let token = CancellationToken::new();

        let refresh_handle = tokio::spawn(refresh_loop(
            Arc::clone(&self.cache),
            Arc::clone(&self.hub),
            self.config.refresh_interval,
            token.child_token(),
        ));
        let alert_handle = tokio::spawn(alert_loop(
            Arc::clone(&self.cache),
            Arc::clone(&self.alerts),
            Arc::clone(&self.notifier),
            self.config.alert_scan_interval,
            token.child_token(),
        ));

        *self.token.lock() = Some(token);
        *self.handles.lock() = vec![refresh_handle, alert_handle];

        info!(
            refresh_secs = self.config.refresh_interval.as_secs(),
            alert_secs = self.config.alert_scan_interval.as_secs(),
            "Scheduler started"
        );
    }

    /// Cancel both loops and wait for them to exit. Idempotent.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        if let Some(token) = self.token.lock().take() {
            token.cancel();
        }

        let handles = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(%e, "Scheduler loop task failed to join");
            }
        }

        info!("Scheduler stopped");
    }
}

/// Refresh loop body: recompute every country's table and publish it.
async fn refresh_loop(
    cache: Arc<PriceFeedCache>,
    hub: Arc<BroadcastHub>,
    period: Duration,
    token: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                debug!("Refresh loop cancelled");
                break;
            }
            _ = interval.tick() => {
                refresh_tick(&cache, &hub).await;
            }
        }
    }
}

async fn refresh_tick(cache: &PriceFeedCache, hub: &BroadcastHub) {
    for country in Country::ALL {
        let table = cache.refresh(country).await;
        let upstream = table.source == TableSource::Upstream;
        PriceMetrics::refresh_tick(country.code(), upstream);

        if !upstream {
            // Stale tables still get published; clients prefer old prices
            // over no prices.
            warn!(
                country = %country,
                source = ?table.source,
                "Refresh served without fresh upstream data"
            );
        }

        let prices: BTreeMap<String, f64> = table
            .rounded_prices()
            .into_iter()
            .map(|(purity, price)| (purity.label().to_string(), price))
            .collect();

        let delivered = hub.broadcast_price_update(&PriceUpdate {
            country,
            prices,
            currency: table.currency,
            spot_price_usd: table.spot_usd_per_oz,
            timestamp: table.computed_at,
        });

        debug!(country = %country, delivered, "Published price update");
    }
}

/// Alert loop body: evaluate every (country, purity) pair and dispatch
/// notifications for matched alerts.
async fn alert_loop(
    cache: Arc<PriceFeedCache>,
    alerts: Arc<AlertStore>,
    notifier: Arc<dyn Notifier>,
    period: Duration,
    token: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                debug!("Alert loop cancelled");
                break;
            }
            _ = interval.tick() => {
                alert_tick(&cache, &alerts, notifier.as_ref()).await;
            }
        }
    }
}

async fn alert_tick(cache: &PriceFeedCache, alerts: &AlertStore, notifier: &dyn Notifier) {
    for country in Country::ALL {
        let table = cache.price_table(country).await;
        for purity in Purity::ALL {
            let current = round2(table.price_per_gram(purity));
            let triggered = alerts.check_and_trigger(country, purity, current);
            for alert in &triggered {
                notifier.notify(alert, current).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alerts::{Direction, NewAlert, NotificationChannel, PriceAlert};
    use async_trait::async_trait;
    use common::{Currency, OwnerId};
    use price_feed::{FeedClient, SpotQuote, GRAMS_PER_TROY_OUNCE};
    use std::collections::HashMap;
    use tokio::sync::mpsc;

    struct FixedFeed {
        spot_usd_per_oz: f64,
    }

    #[async_trait]
    impl FeedClient for FixedFeed {
        async fn fetch_spot(&self) -> price_feed::Result<SpotQuote> {
            Ok(SpotQuote {
                price_usd_per_oz: self.spot_usd_per_oz,
                change_24h: 0.0,
                change_percent_24h: 0.0,
            })
        }

        async fn fetch_rates(&self) -> price_feed::Result<HashMap<Currency, f64>> {
            Ok(HashMap::from([
                (Currency::USD, 1.0),
                (Currency::INR, 1.0),
                (Currency::AED, 1.0),
                (Currency::GBP, 1.0),
            ]))
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(PriceAlert, f64)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, alert: &PriceAlert, current_price: f64) {
            self.sent.lock().push((alert.clone(), current_price));
        }
    }

    fn scheduler_under_test(
        spot_usd_per_oz: f64,
        notifier: Arc<dyn Notifier>,
    ) -> (Arc<PriceScheduler>, Arc<AlertStore>, Arc<BroadcastHub>) {
        let cache = Arc::new(PriceFeedCache::new(
            Arc::new(FixedFeed { spot_usd_per_oz }),
            Duration::from_secs(3600),
            Duration::from_secs(3600),
        ));
        let alerts = Arc::new(AlertStore::new());
        let hub = Arc::new(BroadcastHub::new());
        let scheduler = Arc::new(PriceScheduler::new(
            cache,
            Arc::clone(&alerts),
            notifier,
            Arc::clone(&hub),
            SchedulerConfig {
                refresh_interval: Duration::from_millis(50),
                alert_scan_interval: Duration::from_millis(50),
            },
        ));
        (scheduler, alerts, hub)
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_tick_publishes_every_country() {
        let (scheduler, _alerts, hub) = scheduler_under_test(2400.0, Arc::new(RecordingNotifier::default()));

        let (tx, mut rx) = mpsc::unbounded_channel();
        hub.register(tx);

        scheduler.start();
        tokio::time::sleep(Duration::from_millis(80)).await;
        scheduler.stop().await;

        let mut seen = std::collections::HashSet::new();
        while let Ok(msg) = rx.try_recv() {
            let value: serde_json::Value =
                serde_json::from_str(msg.to_text().unwrap()).unwrap();
            assert_eq!(value["type"], "price_update");
            seen.insert(value["country"].as_str().unwrap().to_string());
        }
        assert_eq!(seen.len(), Country::ALL.len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_alert_tick_dispatches_matched_alerts() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (scheduler, alerts, _hub) = scheduler_under_test(2400.0, notifier.clone());

        // 24K at spot 2400, rate 1.0 is ~77.16 per gram; target below it
        // so the Above alert fires on the first scan.
        let base = 2400.0 / GRAMS_PER_TROY_OUNCE;
        alerts
            .create(
                OwnerId::new(),
                NewAlert {
                    target_price: base - 10.0,
                    direction: Direction::Above,
                    purity: Purity::K24,
                    country: Country::IN,
                    channels: vec![NotificationChannel::Email],
                },
            )
            .unwrap();

        scheduler.start();
        tokio::time::sleep(Duration::from_millis(200)).await;
        scheduler.stop().await;

        let sent = notifier.sent.lock();
        // One-shot: dispatched exactly once despite several scans.
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1 >= base - 10.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let (scheduler, _alerts, _hub) = scheduler_under_test(2400.0, Arc::new(RecordingNotifier::default()));

        scheduler.start();
        assert!(scheduler.is_running());
        scheduler.start();
        assert!(scheduler.is_running());

        // Exactly two loop tasks despite the double start.
        assert_eq!(scheduler.handles.lock().len(), 2);

        scheduler.stop().await;
        assert!(!scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent() {
        let (scheduler, _alerts, _hub) = scheduler_under_test(2400.0, Arc::new(RecordingNotifier::default()));

        scheduler.start();
        scheduler.stop().await;
        scheduler.stop().await;
        assert!(!scheduler.is_running());

        // Restart after stop works.
        scheduler.start();
        assert!(scheduler.is_running());
        scheduler.stop().await;
    }
}
