use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::instrument;

use super::dto::{
    AuthResponse, LoginRequest, LogoutResponse, PublicUser, RefreshRequest, RegisterRequest,
    TokenPair,
};
use super::extractors::{AuthIdentity, AuthUser};
use super::services;
use crate::error::ApiError;
use crate::state::AppState;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/profile", post(profile))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<PublicUser>), ApiError> {
    let user = services::register(&state, &payload.email, &payload.password).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let user = services::validate_credentials(&state, &payload.email, &payload.password)
        .await?
        .ok_or_else(ApiError::invalid_credentials)?;

    let (pair, user) = services::start_session(&state, user.id).await?;
    Ok(Json(AuthResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        user,
    }))
}

/// Echoes the authenticated identity; the extractor has already run the full
/// signature, expiry, and generation checks.
#[instrument(skip_all)]
pub async fn profile(AuthUser(identity): AuthUser) -> Json<AuthIdentity> {
    Json(identity)
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    let pair =
        services::refresh_session(&state, payload.user_id, &payload.refresh_token).await?;
    Ok(Json(pair))
}

#[instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> Result<Json<LogoutResponse>, ApiError> {
    services::end_session(&state, identity.user_id).await?;
    Ok(Json(LogoutResponse {
        message: "Logged out".into(),
    }))
}
