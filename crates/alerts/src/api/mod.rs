//! HTTP API for the alert service

pub mod handlers;
pub mod models;
pub mod routes;

pub use handlers::AlertApiState;
pub use routes::create_router;
