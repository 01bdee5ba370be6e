//! `POST /api/v1/accounts` — merchant account bootstrap.
//!
//! The one account-management operation this gateway exposes: no profile
//! editing, no account CRUD beyond creation.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::auth::AuthError;
use crate::error::{AppError, AppResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub username: String,
    pub password: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct CreateAccountResponse {
    pub account_id: i64,
    pub username: String,
}

pub async fn create_account(
    State(state): State<AppState>,
    Json(request): Json<CreateAccountRequest>,
) -> AppResult<Json<CreateAccountResponse>> {
    let account = state
        .auth
        .create_account(&request.username, &request.password, &request.email)
        .await
        .map_err(|e| match e {
            AuthError::UserExists => AppError::Validation(format!("user {} exists", request.username)),
            AuthError::Database(e) => AppError::Database(e),
            other => AppError::Internal(other.to_string()),
        })?;

    Ok(Json(CreateAccountResponse {
        account_id: account.account_id,
        username: account.username,
    }))
}
