//! API routes for the alert service

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::api::handlers::*;

/// Create the alert router
pub fn create_router(state: Arc<AlertApiState>) -> Router {
    Router::new()
        .route("/alerts", post(create_alert).get(list_alerts))
        .route(
            "/alerts/:id",
            get(get_alert).patch(update_alert).delete(delete_alert),
        )
        .route("/alerts/:id/enable", post(enable_alert))
        .route("/alerts/:id/disable", post(disable_alert))
        .with_state(state)
}
