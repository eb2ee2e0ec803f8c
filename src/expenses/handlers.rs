use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{patch, post},
    Json, Router,
};
use tracing::{instrument, warn};
use uuid::Uuid;

use super::dto::{CreateExpenseRequest, Pagination, UpdateExpenseRequest};
use super::repo::Expense;
use crate::auth::extractors::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

pub fn expense_routes() -> Router<AppState> {
    Router::new()
        .route("/expenses", post(create_expense).get(list_expenses))
        .route("/expenses/:id", patch(update_expense).delete(delete_expense))
}

fn check_amount(amount: f64) -> Result<(), ApiError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(ApiError::validation("Amount must be positive"));
    }
    Ok(())
}

#[instrument(skip_all)]
pub async fn create_expense(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(payload): Json<CreateExpenseRequest>,
) -> Result<(StatusCode, HeaderMap, Json<Expense>), ApiError> {
    check_amount(payload.amount)?;
    if payload.category.trim().is_empty() {
        return Err(ApiError::validation("Category is required"));
    }

    let expense = Expense::create(
        &state.db,
        identity.user_id,
        payload.amount,
        &payload.category,
        payload.description.as_deref(),
        payload.date,
    )
    .await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        axum::http::header::LOCATION,
        format!("/expenses/{}", expense.id).parse().unwrap(),
    );

    Ok((StatusCode::CREATED, headers, Json(expense)))
}

#[instrument(skip_all)]
pub async fn list_expenses(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Query(p): Query<Pagination>,
) -> Result<Json<Vec<Expense>>, ApiError> {
    let expenses =
        Expense::list_by_user(&state.db, identity.user_id, p.limit, p.offset).await?;
    Ok(Json(expenses))
}

#[instrument(skip_all)]
pub async fn update_expense(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateExpenseRequest>,
) -> Result<Json<Expense>, ApiError> {
    if let Some(amount) = payload.amount {
        check_amount(amount)?;
    }

    match Expense::update(
        &state.db,
        identity.user_id,
        id,
        payload.amount,
        payload.category.as_deref(),
        payload.description.as_deref(),
        payload.date,
    )
    .await?
    {
        Some(expense) => Ok(Json(expense)),
        None => {
            warn!(user_id = %identity.user_id, %id, "update for missing expense");
            Err(ApiError::not_found("Expense"))
        }
    }
}

#[instrument(skip_all)]
pub async fn delete_expense(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if Expense::delete(&state.db, identity.user_id, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        warn!(user_id = %identity.user_id, %id, "delete for missing expense");
        Err(ApiError::not_found("Expense"))
    }
}
