use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use super::dto::{PublicUser, TokenPair};
use super::jwt::JwtKeys;
use super::password::{hash_password, hash_refresh_token, verify_password, verify_refresh_token};
use super::repo_types::User;
use crate::error::ApiError;
use crate::state::AppState;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Local part of the email, used as the display username. Collisions between
/// equal local parts under different domains are accepted.
fn derive_username(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

fn public_view(user: User) -> PublicUser {
    PublicUser {
        id: user.id,
        email: user.email,
        username: user.username,
    }
}

/// Creates the account. Does not issue tokens: registration and login are
/// deliberately decoupled, so the only side effect here is the new record
/// with `token_version = 0` and no refresh token.
pub async fn register(
    state: &AppState,
    email: &str,
    password: &str,
) -> Result<PublicUser, ApiError> {
    let email = email.trim().to_lowercase();

    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(ApiError::validation("Invalid email"));
    }

    if password.len() < 8 {
        warn!("password too short");
        return Err(ApiError::validation("Password too short"));
    }

    // Ensure email is not taken
    if state.users.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(ApiError::conflict("Email already registered"));
    }

    let hash = hash_password(password)?;
    let username = derive_username(&email).to_string();
    let user = state.users.create(&email, &username, &hash).await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(public_view(user))
}

/// Checks a credentials pair. `None` covers both unknown email and wrong
/// password; the caller turns it into one uniform 401.
pub async fn validate_credentials(
    state: &AppState,
    email: &str,
    password: &str,
) -> Result<Option<User>, ApiError> {
    let email = email.trim().to_lowercase();

    if !is_valid_email(&email) {
        return Err(ApiError::validation("Invalid email"));
    }
    if password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }

    let Some(user) = state.users.find_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Ok(None);
    };

    if !verify_password(password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Ok(None);
    }

    Ok(Some(user))
}

/// Opens a new token generation for the user: bumps `token_version`, signs a
/// pair stamped with the new version, and stores the refresh token hash.
///
/// The version is re-read from the store so a stale caller copy cannot roll
/// the counter back, and the commit is a compare-and-swap, so of several
/// concurrent session mutations exactly one lands.
pub async fn start_session(
    state: &AppState,
    user_id: Uuid,
) -> Result<(TokenPair, PublicUser), ApiError> {
    let keys = JwtKeys::from_ref(state);

    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(ApiError::invalid_credentials)?;

    let next_version = user.token_version + 1;
    let pair = keys.issue_pair(user.id, &user.email, next_version)?;
    let refresh_hash = hash_refresh_token(&pair.refresh_token)?;

    let user = state
        .users
        .commit_session(user.id, user.token_version, Some(&refresh_hash))
        .await?
        .ok_or_else(|| {
            warn!(user_id = %user_id, "login lost version race");
            ApiError::invalid_credentials()
        })?;

    info!(user_id = %user.id, token_version = user.token_version, "session started");
    Ok((pair, public_view(user)))
}

/// One-time-use refresh rotation: authenticates the presented token against
/// the stored hash, then replaces it. After this call the presented token is
/// dead even if it leaked.
pub async fn refresh_session(
    state: &AppState,
    user_id: Uuid,
    presented: &str,
) -> Result<TokenPair, ApiError> {
    let keys = JwtKeys::from_ref(state);

    let claims = keys.verify_refresh(presented).map_err(|_| {
        warn!(user_id = %user_id, "refresh token failed verification");
        ApiError::invalid_refresh()
    })?;
    if claims.sub != user_id {
        warn!(user_id = %user_id, "refresh token subject mismatch");
        return Err(ApiError::invalid_refresh());
    }

    let Some(user) = state.users.find_by_id(user_id).await? else {
        warn!(user_id = %user_id, "refresh for unknown user");
        return Err(ApiError::invalid_refresh());
    };
    let Some(stored_hash) = user.refresh_token_hash.as_deref() else {
        warn!(user_id = %user_id, "refresh without active session");
        return Err(ApiError::invalid_refresh());
    };
    if !verify_refresh_token(presented, stored_hash)? {
        warn!(user_id = %user_id, "refresh token mismatch");
        return Err(ApiError::invalid_refresh());
    }

    let next_version = user.token_version + 1;
    let pair = keys.issue_pair(user.id, &user.email, next_version)?;
    let refresh_hash = hash_refresh_token(&pair.refresh_token)?;

    if state
        .users
        .commit_session(user.id, user.token_version, Some(&refresh_hash))
        .await?
        .is_none()
    {
        warn!(user_id = %user_id, "refresh lost version race");
        return Err(ApiError::invalid_refresh());
    }

    info!(user_id = %user.id, token_version = next_version, "tokens rotated");
    Ok(pair)
}

/// Drops the refresh token and bumps the generation counter, which also
/// retires every outstanding access token for the user.
pub async fn end_session(state: &AppState, user_id: Uuid) -> Result<(), ApiError> {
    state
        .users
        .clear_session(user_id)
        .await?
        .ok_or_else(ApiError::invalid_credentials)?;

    info!(user_id = %user_id, "session ended");
    Ok(())
}
