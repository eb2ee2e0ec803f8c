use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Closed error taxonomy for the API. Every handler failure maps onto one of
/// these; anything unexpected is absorbed into `Internal` and surfaced as a
/// generic 500 so storage or signing failures are never mistaken for an
/// authentication failure.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        ApiError::Conflict(msg.into())
    }

    /// Generic credentials failure. One message for unknown email and wrong
    /// password so responses cannot be used to enumerate accounts.
    pub fn invalid_credentials() -> Self {
        ApiError::Unauthorized("Invalid credentials")
    }

    pub fn invalid_token() -> Self {
        ApiError::Unauthorized("Invalid or expired token")
    }

    pub fn invalid_refresh() -> Self {
        ApiError::Unauthorized("Invalid refresh token")
    }

    pub fn not_found(resource: &'static str) -> Self {
        ApiError::NotFound(resource)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Internal(e) => {
                error!(error = %e, "internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_validation_to_400() {
        let res = ApiError::validation("Invalid email").into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn maps_conflict_to_409() {
        let res = ApiError::conflict("Email already registered").into_response();
        assert_eq!(res.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn maps_unauthorized_to_401() {
        let res = ApiError::invalid_credentials().into_response();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn maps_not_found_to_404() {
        let res = ApiError::not_found("Expense").into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn maps_internal_to_500_with_generic_body() {
        let err = ApiError::from(anyhow::anyhow!("pool exhausted"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        // The concrete cause stays server-side.
        let res = err.into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
