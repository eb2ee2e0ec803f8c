use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use super::jwt::JwtKeys;
use crate::error::ApiError;
use crate::state::AppState;

/// Identity attached to a request once the bearer token has passed
/// signature, expiry, and token-version checks.
#[derive(Debug, Clone, Serialize)]
pub struct AuthIdentity {
    pub user_id: Uuid,
    pub email: String,
    pub token_version: i32,
}

/// Extracts and validates the bearer token, cross-checking its embedded
/// generation counter against the stored one. A token from any earlier
/// generation is rejected even if its expiry has not passed, which is what
/// makes logout and rotation retroactive.
pub struct AuthUser(pub AuthIdentity);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Read Authorization header
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(ApiError::invalid_token)?;

        // Expect "Bearer <token>"
        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or_else(ApiError::invalid_token)?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify_access(token).map_err(|_| {
            warn!("invalid or expired access token");
            ApiError::invalid_token()
        })?;

        let user = state.users.find_by_id(claims.sub).await?.ok_or_else(|| {
            warn!(user_id = %claims.sub, "token subject no longer exists");
            ApiError::invalid_token()
        })?;

        if claims.token_version != user.token_version {
            warn!(
                user_id = %user.id,
                token_version = claims.token_version,
                current = user.token_version,
                "stale token generation"
            );
            return Err(ApiError::invalid_token());
        }

        Ok(AuthUser(AuthIdentity {
            user_id: user.id,
            email: user.email,
            token_version: user.token_version,
        }))
    }
}
