//! Price lock error types

use common::LockId;
use thiserror::Error;

/// Errors that can occur in the price lock engine
///
/// Ownership failures are folded into `NotFound` so callers cannot probe
/// for the existence of other users' locks.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("Price lock not found: {0}")]
    NotFound(LockId),

    /// Surfaced distinctly so the checkout client knows to re-quote and
    /// re-lock instead of retrying blindly.
    #[error("Price lock expired: {0}. Request a new quote and lock again")]
    Expired(LockId),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type for price lock operations
pub type Result<T> = std::result::Result<T, LockError>;
