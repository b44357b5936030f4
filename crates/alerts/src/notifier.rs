//! Notification dispatch
//!
//! Delivery itself is an external collaborator (mail, push gateway); the
//! trait is the seam. Dispatch failures are logged, never propagated; a
//! failed notification must not fail the scheduler tick that found it.

use async_trait::async_trait;
use tracing::info;

use crate::types::PriceAlert;

/// Outbound notification seam
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Dispatch a triggered alert through its declared channels
    async fn notify(&self, alert: &PriceAlert, current_price: f64);
}

/// Notifier that only logs. Stands in until a real gateway is wired up
/// and doubles as the development default.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, alert: &PriceAlert, current_price: f64) {
        info!(
            alert_id = %alert.id,
            owner = %alert.owner_id,
            target = alert.target_price,
            direction = ?alert.direction,
            price = current_price,
            channels = ?alert.channels,
            "Price alert triggered"
        );
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use parking_lot::Mutex;

    /// Records every dispatched alert for assertions
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<(PriceAlert, f64)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, alert: &PriceAlert, current_price: f64) {
            self.sent.lock().push((alert.clone(), current_price));
        }
    }
}
