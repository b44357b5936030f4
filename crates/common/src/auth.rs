//! Request authentication extractor
//!
//! Caller identity arrives in the `X-User-Id` header as a UUID. The gateway
//! in front of this service is responsible for validating credentials; here
//! we only parse the forwarded identity.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::envelope::{Envelope, ErrorDetail};
use crate::types::OwnerId;

const USER_ID_HEADER: &str = "x-user-id";

/// Authenticated owner of the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthOwner(pub OwnerId);

#[async_trait]
impl<S> FromRequestParts<S> for AuthOwner
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<Envelope<()>>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| rejection("MISSING_USER_ID", "X-User-Id header is required"))?;

        let id = Uuid::parse_str(raw)
            .map_err(|_| rejection("INVALID_USER_ID", "X-User-Id must be a UUID"))?;

        Ok(AuthOwner(OwnerId::from_uuid(id)))
    }
}

fn rejection(code: &str, message: &str) -> (StatusCode, Json<Envelope<()>>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(Envelope {
            success: false,
            data: None,
            error: Some(ErrorDetail {
                code: code.to_string(),
                message: message.to_string(),
                details: None,
            }),
        }),
    )
}
