//! API routes for the price feed service

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::api::handlers::*;

/// Create the price feed router
pub fn create_router(state: Arc<PriceApiState>) -> Router {
    Router::new()
        .route("/price/gold", get(get_price_table))
        .route("/price/gold/spot", get(get_spot_price))
        .route("/price/gold/history", get(get_history))
        .route("/price/calculate", post(calculate_price))
        .with_state(state)
}
