//! Price lock service
//!
//! A price lock is a short-lived, single-owner reservation that freezes a
//! computed total price against market movement for one checkout attempt.
//! The engine guarantees at most one active lock per owner, enforces the
//! TTL on every read, and drives the monotone state machine
//! active → used | cancelled | expired.

pub mod api;
pub mod engine;
pub mod error;
pub mod store;
pub mod types;

pub use engine::{LockEngine, LockValidation, NewLockItem};
pub use error::{LockError, Result};
pub use store::traits::LockStore;
pub use store::memory::InMemoryLockStore;
pub use store::redis::RedisLockStore;
pub use types::{LockItem, LockStatus, PriceLock};
