//! Error types for the price feed service

use thiserror::Error;

/// Errors raised by price feed operations
#[derive(Debug, Error)]
pub enum FeedError {
    /// The upstream feed could not be reached or answered with garbage.
    /// Absorbed by the cache's fallback chain; callers of the cache never
    /// see this variant.
    #[error("Upstream feed unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected upstream payload: {0}")]
    Payload(String),
}

/// Result type for price feed operations
pub type Result<T> = std::result::Result<T, FeedError>;
