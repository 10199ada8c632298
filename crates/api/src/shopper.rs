//! Shopper identity extraction.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::ShopperId;

use crate::error::ApiError;

/// Header set by the authentication layer in front of this service.
pub const SHOPPER_HEADER: &str = "x-shopper-id";

/// The authenticated shopper making the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shopper(pub ShopperId);

impl<S: Send + Sync> FromRequestParts<S> for Shopper {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(SHOPPER_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("Please log in to continue".to_string()))?;

        let uuid = value
            .to_str()
            .ok()
            .and_then(|v| uuid::Uuid::parse_str(v.trim()).ok())
            .ok_or_else(|| ApiError::Unauthorized("Invalid shopper identity".to_string()))?;

        Ok(Shopper(ShopperId::from_uuid(uuid)))
    }
}
