//! Server infrastructure for Aurum
//!
//! This crate provides the HTTP server and the WebSocket price stream
//! with unified lifecycle management and graceful shutdown.
//!
// Allow large error types - WebSocket errors are unavoidably large
#![allow(clippy::result_large_err)]
//!
//! # Architecture
//!
//! All servers implement the [`Server`] trait, which provides a consistent
//! interface for running and monitoring servers. The [`ServerExt`] trait
//! provides convenience methods like `spawn()` and `run_with_ctrl_c()`.
//!
//! Shutdown coordination uses `CancellationToken` from `tokio_util`, allowing
//! hierarchical shutdown where cancelling a parent token automatically cancels
//! all child tokens.
//!
//! The [`BroadcastHub`] sits between the scheduler and the stream: the
//! scheduler publishes one [`PriceUpdate`](broadcast::PriceUpdate) per country
//! per refresh tick and the hub fans it out to matching subscribers.
//!
//! # Modules
//!
//! - [`config`] - Server binding configuration
//! - [`traits`] - `Server` and `ServerExt` traits
//! - [`http`] - HTTP server using Axum
//! - [`websocket`] - WebSocket price stream using Tungstenite
//! - [`broadcast`] - Subscriber registry and price fan-out
//! - [`health`] - Health check endpoint
//! - [`shutdown`] - Graceful shutdown utilities

pub mod broadcast;
pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod shutdown;
pub mod traits;
pub mod websocket;

pub use broadcast::{BroadcastHub, PriceUpdate, SubscriberId, PRICE_UPDATE_TOPIC};
pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use health::{health_handler, simple_health_handler, HealthState};
pub use http::HttpServer;
pub use shutdown::{shutdown_signal, ShutdownController};
pub use traits::{Server, ServerExt};
pub use websocket::PriceStreamServer;
