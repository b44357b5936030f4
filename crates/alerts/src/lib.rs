//! Price alert service
//!
//! Users register threshold alerts on a (country, purity) pair. The
//! scheduler's alert tick evaluates current prices against the active-alert
//! index; a matched alert flips to inactive atomically with the match, so
//! it fires exactly once.

pub mod api;
pub mod error;
pub mod notifier;
pub mod store;
pub mod types;

pub use error::{AlertError, Result};
pub use notifier::{LogNotifier, Notifier};
pub use store::AlertStore;
pub use types::{AlertUpdate, Direction, NewAlert, NotificationChannel, PriceAlert};
