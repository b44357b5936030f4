//! API handlers for alert HTTP endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use common::{AlertId, AuthOwner, Envelope};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::models::*;
use crate::error::AlertError;
use crate::store::AlertStore;
use crate::types::{AlertUpdate, NewAlert};

type ApiError = (StatusCode, Json<Envelope<()>>);

pub struct AlertApiState {
    pub store: Arc<AlertStore>,
}

fn api_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
    (status, Json(Envelope::error(code, message)))
}

fn map_error(e: AlertError) -> ApiError {
    match e {
        AlertError::NotFound(_) => {
            api_error(StatusCode::NOT_FOUND, "ALERT_NOT_FOUND", "Alert not found")
        }
        AlertError::Validation(msg) => api_error(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg),
    }
}

fn parse_alert_id(raw: &str) -> Result<AlertId, ApiError> {
    Uuid::parse_str(raw).map(AlertId).map_err(|_| {
        api_error(
            StatusCode::BAD_REQUEST,
            "INVALID_ALERT_ID",
            "Invalid alert ID format",
        )
    })
}

/// `POST /alerts`
pub async fn create_alert(
    State(state): State<Arc<AlertApiState>>,
    AuthOwner(owner): AuthOwner,
    Json(req): Json<CreateAlertRequest>,
) -> Result<(StatusCode, Json<Envelope<AlertResponse>>), ApiError> {
    let alert = state
        .store
        .create(
            owner,
            NewAlert {
                target_price: req.target_price,
                direction: req.direction,
                purity: req.purity,
                country: req.country,
                channels: req.notification_channels,
            },
        )
        .map_err(map_error)?;

    Ok((
        StatusCode::CREATED,
        Json(Envelope::success(alert.into())),
    ))
}

/// `GET /alerts`
pub async fn list_alerts(
    State(state): State<Arc<AlertApiState>>,
    AuthOwner(owner): AuthOwner,
) -> Json<Envelope<ListAlertsResponse>> {
    let alerts = state.store.list(owner);
    Json(Envelope::success(ListAlertsResponse {
        alerts: alerts.into_iter().map(AlertResponse::from).collect(),
    }))
}

/// `GET /alerts/:id`
pub async fn get_alert(
    State(state): State<Arc<AlertApiState>>,
    AuthOwner(owner): AuthOwner,
    Path(id): Path<String>,
) -> Result<Json<Envelope<AlertResponse>>, ApiError> {
    let id = parse_alert_id(&id)?;
    let alert = state.store.get(id, owner).map_err(map_error)?;
    Ok(Json(Envelope::success(alert.into())))
}

/// `PATCH /alerts/:id`
pub async fn update_alert(
    State(state): State<Arc<AlertApiState>>,
    AuthOwner(owner): AuthOwner,
    Path(id): Path<String>,
    Json(req): Json<UpdateAlertRequest>,
) -> Result<Json<Envelope<AlertResponse>>, ApiError> {
    let id = parse_alert_id(&id)?;
    let alert = state
        .store
        .update(
            id,
            owner,
            AlertUpdate {
                target_price: req.target_price,
                direction: req.direction,
                purity: req.purity,
                country: req.country,
                channels: req.notification_channels,
            },
        )
        .map_err(map_error)?;

    Ok(Json(Envelope::success(alert.into())))
}

/// `DELETE /alerts/:id`
pub async fn delete_alert(
    State(state): State<Arc<AlertApiState>>,
    AuthOwner(owner): AuthOwner,
    Path(id): Path<String>,
) -> Result<Json<Envelope<()>>, ApiError> {
    let id = parse_alert_id(&id)?;
    state.store.delete(id, owner).map_err(map_error)?;
    Ok(Json(Envelope::success(())))
}

/// `POST /alerts/:id/enable`
pub async fn enable_alert(
    State(state): State<Arc<AlertApiState>>,
    AuthOwner(owner): AuthOwner,
    Path(id): Path<String>,
) -> Result<Json<Envelope<AlertResponse>>, ApiError> {
    let id = parse_alert_id(&id)?;
    let alert = state.store.enable(id, owner).map_err(map_error)?;
    Ok(Json(Envelope::success(alert.into())))
}

/// `POST /alerts/:id/disable`
pub async fn disable_alert(
    State(state): State<Arc<AlertApiState>>,
    AuthOwner(owner): AuthOwner,
    Path(id): Path<String>,
) -> Result<Json<Envelope<AlertResponse>>, ApiError> {
    let id = parse_alert_id(&id)?;
    let alert = state.store.disable(id, owner).map_err(map_error)?;
    Ok(Json(Envelope::success(alert.into())))
}
