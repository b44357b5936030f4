//! HTTP API for the price feed service

pub mod handlers;
pub mod models;
pub mod routes;

pub use handlers::PriceApiState;
pub use routes::create_router;
