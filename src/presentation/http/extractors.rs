use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
};

use crate::presentation::http::dto::ApiResponse;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Caller identity taken from the `X-User-Id` header. Authentication happens
/// upstream; this layer only scopes every operation to the caller.
#[derive(Debug, Clone)]
pub struct UserId(pub String);

impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ApiResponse<()>>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| UserId(value.to_string()))
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(ApiResponse::error(
                        "MISSING_USER",
                        "X-User-Id header is required",
                        None,
                    )),
                )
            })
    }
}
