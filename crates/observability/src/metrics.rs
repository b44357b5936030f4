//! Prometheus metrics infrastructure
//!
//! This module initializes the Prometheus exporter and provides the named
//! recorder set for the price pipeline (refresh, locks, alerts, broadcast).

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize the Prometheus metrics exporter
///
/// Starts an HTTP listener on the specified port exposing metrics at
/// `/metrics`.
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    tracing::info!(%addr, "Metrics server listening");
    Ok(())
}

/// Named recorders for the price pipeline.
///
/// All methods are cheap and safe to call before `init_metrics`; recordings
/// are dropped until an exporter is installed.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriceMetrics;

impl PriceMetrics {
    pub fn refresh_tick(country: &str, ok: bool) {
        let outcome = if ok { "ok" } else { "error" };
        counter!("aurum_refresh_ticks_total", "country" => country.to_string(), "outcome" => outcome)
            .increment(1);
    }

    pub fn upstream_fallback(kind: &'static str) {
        counter!("aurum_feed_fallbacks_total", "kind" => kind).increment(1);
    }

    pub fn lock_transition(to: &'static str) {
        counter!("aurum_locks_total", "status" => to).increment(1);
    }

    pub fn alert_triggered(count: u64) {
        counter!("aurum_alerts_triggered_total").increment(count);
    }

    pub fn broadcast_delivered(count: u64) {
        counter!("aurum_broadcast_deliveries_total").increment(count);
    }

    pub fn broadcast_pruned() {
        counter!("aurum_broadcast_pruned_total").increment(1);
    }

    pub fn set_subscribers(count: u64) {
        gauge!("aurum_stream_subscribers").set(count as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorders_are_safe_without_exporter() {
        // Recording without an installed exporter must not panic.
        PriceMetrics::refresh_tick("IN", true);
        PriceMetrics::upstream_fallback("snapshot");
        PriceMetrics::lock_transition("active");
        PriceMetrics::alert_triggered(2);
        PriceMetrics::broadcast_delivered(5);
        PriceMetrics::broadcast_pruned();
        PriceMetrics::set_subscribers(3);
    }
}
