//! API handlers for price lock HTTP endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use common::{AuthOwner, Envelope, LockId};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::models::*;
use crate::engine::{LockEngine, NewLockItem};
use crate::error::LockError;

type ApiError = (StatusCode, Json<Envelope<()>>);

pub struct LockApiState {
    pub engine: Arc<LockEngine>,
}

fn api_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
    (status, Json(Envelope::error(code, message)))
}

fn map_error(e: LockError) -> ApiError {
    match e {
        LockError::NotFound(_) => api_error(
            StatusCode::NOT_FOUND,
            "LOCK_NOT_FOUND",
            "Price lock not found",
        ),
        LockError::Expired(_) => api_error(StatusCode::GONE, "LOCK_EXPIRED", e.to_string()),
        LockError::Validation(msg) => {
            api_error(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg)
        }
        LockError::Storage(msg) => {
            tracing::error!(error = %msg, "Lock storage failure");
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal error",
            )
        }
    }
}

fn parse_lock_id(raw: &str) -> Result<LockId, ApiError> {
    Uuid::parse_str(raw).map(LockId::from_uuid).map_err(|_| {
        api_error(
            StatusCode::BAD_REQUEST,
            "INVALID_LOCK_ID",
            "Invalid lock ID format",
        )
    })
}

/// `POST /price-lock`
pub async fn create_lock(
    State(state): State<Arc<LockApiState>>,
    AuthOwner(owner): AuthOwner,
    Json(req): Json<CreateLockRequest>,
) -> Result<(StatusCode, Json<Envelope<PriceLockResponse>>), ApiError> {
    let items = req
        .items
        .into_iter()
        .map(|i| NewLockItem {
            product_id: i.product_id,
            variant_id: i.variant_id,
            quantity: i.quantity,
            gold_weight_grams: i.gold_weight,
            purity: i.purity,
            stone_value: i.stone_value,
            labor_cost: i.labor_cost,
            making_charges_percent: i.making_charges_percent,
        })
        .collect();

    let lock = state
        .engine
        .create(owner, items, req.country)
        .await
        .map_err(map_error)?;

    Ok((
        StatusCode::CREATED,
        Json(Envelope::success(PriceLockResponse::from_lock(
            &lock,
            Utc::now(),
        ))),
    ))
}

/// `GET /price-lock/:id`
pub async fn get_lock(
    State(state): State<Arc<LockApiState>>,
    AuthOwner(owner): AuthOwner,
    Path(id): Path<String>,
) -> Result<Json<Envelope<PriceLockResponse>>, ApiError> {
    let id = parse_lock_id(&id)?;
    let lock = state.engine.get(id, owner).await.map_err(map_error)?;

    Ok(Json(Envelope::success(PriceLockResponse::from_lock(
        &lock,
        Utc::now(),
    ))))
}

/// `GET /price-lock`
pub async fn list_active_locks(
    State(state): State<Arc<LockApiState>>,
    AuthOwner(owner): AuthOwner,
) -> Result<Json<Envelope<ListLocksResponse>>, ApiError> {
    let locks = state.engine.list_active(owner).await.map_err(map_error)?;

    let now = Utc::now();
    Ok(Json(Envelope::success(ListLocksResponse {
        locks: locks
            .iter()
            .map(|l| PriceLockResponse::from_lock(l, now))
            .collect(),
    })))
}

/// `POST /price-lock/:id/validate`
pub async fn validate_lock(
    State(state): State<Arc<LockApiState>>,
    AuthOwner(owner): AuthOwner,
    Path(id): Path<String>,
) -> Result<Json<Envelope<ValidateResponse>>, ApiError> {
    let id = parse_lock_id(&id)?;
    let validation = state.engine.validate(id, owner).await.map_err(map_error)?;

    Ok(Json(Envelope::success(validation.into())))
}

/// `POST /price-lock/:id/use`
pub async fn use_lock(
    State(state): State<Arc<LockApiState>>,
    AuthOwner(owner): AuthOwner,
    Path(id): Path<String>,
) -> Result<Json<Envelope<PriceLockResponse>>, ApiError> {
    let id = parse_lock_id(&id)?;
    let lock = state.engine.use_lock(id, owner).await.map_err(map_error)?;

    Ok(Json(Envelope::success(PriceLockResponse::from_lock(
        &lock,
        Utc::now(),
    ))))
}

/// `DELETE /price-lock/:id`
pub async fn cancel_lock(
    State(state): State<Arc<LockApiState>>,
    AuthOwner(owner): AuthOwner,
    Path(id): Path<String>,
) -> Result<Json<Envelope<()>>, ApiError> {
    let id = parse_lock_id(&id)?;
    state.engine.cancel(id, owner).await.map_err(map_error)?;

    Ok(Json(Envelope::success(())))
}
