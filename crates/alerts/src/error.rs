//! Alert error types

use common::AlertId;
use thiserror::Error;

/// Errors that can occur in the alert service
///
/// As with price locks, ownership failures fold into `NotFound`.
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("Alert not found: {0}")]
    NotFound(AlertId),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type for alert operations
pub type Result<T> = std::result::Result<T, AlertError>;
