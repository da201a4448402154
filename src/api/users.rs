//! Current-user and administration handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;
use tracing::{info, warn};

use crate::api::{AppState, UserResponse};
use crate::api::error::ApiError;
use crate::auth::{Principal, hash_password, verify_password};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// The authenticated user's own record.
pub async fn profile(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state
        .users
        .find_by_id(principal.subject())
        .await
        .map_err(ApiError::internal)?
        .ok_or(ApiError::Unauthenticated)?;

    Ok(Json(user.into()))
}

pub async fn change_password(
    State(state): State<AppState>,
    principal: Principal,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    if req.new_password.len() < 8 {
        return Err(ApiError::BadRequest(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    let user = state
        .users
        .find_by_id(principal.subject())
        .await
        .map_err(ApiError::internal)?
        .ok_or(ApiError::Unauthenticated)?;

    // Federated-only accounts have no password to change.
    let stored_hash = user
        .password_hash
        .as_deref()
        .ok_or(ApiError::InvalidCredentials)?;

    match verify_password(&req.current_password, stored_hash) {
        Ok(true) => {}
        Ok(false) => return Err(ApiError::InvalidCredentials),
        Err(err) => {
            warn!(user = %user.key(), error = %err, "stored password hash unusable");
            return Err(ApiError::InvalidCredentials);
        }
    }

    let new_hash = hash_password(&req.new_password).map_err(ApiError::internal)?;
    state
        .users
        .update_password_hash(&user.key(), new_hash)
        .await
        .map_err(ApiError::internal)?;

    info!(user = %user.key(), "password changed");
    Ok(StatusCode::NO_CONTENT)
}

/// List all accounts. The route policy restricts this to ADMIN.
pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = state.users.list().await.map_err(ApiError::internal)?;

    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}
