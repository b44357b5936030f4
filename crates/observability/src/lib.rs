//! Observability infrastructure for Aurum
//!
//! This crate provides:
//! - Structured logging via tracing
//! - Prometheus metrics
//! - Named recorders for the price pipeline
//!
//! # Quick Start
//!
//! ```ignore
//! use observability::{init_logging, LogFormat};
//!
//! init_logging("aurum", LogFormat::Pretty)?;
//! observability::metrics::init_metrics(9090)?;
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat};
pub use metrics::{init_metrics, PriceMetrics};
