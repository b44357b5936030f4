//! Common types used across Aurum
//!
//! This crate provides the fundamental domain types shared by the price
//! feed, price lock, and alert services.

#[cfg(feature = "api")]
pub mod auth;
pub mod envelope;
pub mod money;
pub mod types;

#[cfg(feature = "api")]
pub use auth::AuthOwner;
pub use envelope::{Envelope, ErrorDetail};
pub use money::round2;
pub use types::{AlertId, Country, Currency, LockId, OwnerId, Purity};
