//! API routes for the price lock service

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::api::handlers::*;

/// Create the price lock router
pub fn create_router(state: Arc<LockApiState>) -> Router {
    Router::new()
        .route("/price-lock", post(create_lock).get(list_active_locks))
        .route("/price-lock/:id", get(get_lock).delete(cancel_lock))
        .route("/price-lock/:id/validate", post(validate_lock))
        .route("/price-lock/:id/use", post(use_lock))
        .with_state(state)
}
