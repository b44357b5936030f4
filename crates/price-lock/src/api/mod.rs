//! HTTP API for the price lock service

pub mod handlers;
pub mod models;
pub mod routes;

pub use handlers::LockApiState;
pub use routes::create_router;
