//! Login, registration and federated-callback handlers.

use axum::Json;
use axum::extract::{Query, State};
use axum::response::Redirect;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use url::Url;

use crate::api::{AppState, UserResponse};
use crate::api::error::ApiError;
use crate::auth::{FederatedProfile, hash_password, normalize_email, verify_password};
use crate::db::schema::{UserCreate, UserRecord, UserRole};
use crate::db::users::UserStoreError;
use crate::types::{ExternalSubjectId, ProviderName};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub role: Option<UserRole>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Federated identity assertion, consumed at the callback boundary.
#[derive(Debug, Deserialize)]
pub struct FederatedCallback {
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub provider_id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

fn issue_token(state: &AppState, user: &UserRecord) -> Result<String, ApiError> {
    state
        .tokens
        .generate(&user.key(), vec![user.role.as_str().to_string()])
        .map_err(ApiError::internal)
}

fn auth_response(token: String, user: UserRecord) -> Json<Value> {
    Json(json!({
        "token": token,
        "user": UserResponse::from(user),
    }))
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<Value>, ApiError> {
    let email = normalize_email(&req.email);
    if email.is_empty() {
        return Err(ApiError::BadRequest("Email is required".to_string()));
    }
    if req.password.len() < 8 {
        return Err(ApiError::BadRequest(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    let password_hash = hash_password(&req.password).map_err(ApiError::internal)?;

    let create = UserCreate {
        email,
        password_hash: Some(password_hash),
        first_name: req.first_name.trim().to_string(),
        last_name: req.last_name.trim().to_string(),
        role: req.role.unwrap_or_default(),
        provider: ProviderName::local(),
        provider_id: None,
        avatar_url: None,
    };

    let user = state.users.create(create).await.map_err(|err| match err {
        UserStoreError::DuplicateEmail => {
            ApiError::BadRequest("Email already registered".to_string())
        }
        other => ApiError::internal(other),
    })?;

    info!(user = %user.key(), "registered local account");

    let token = issue_token(&state, &user)?;
    Ok(auth_response(token, user))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let email = normalize_email(&req.email);

    let user = state
        .users
        .find_by_email(&email)
        .await
        .map_err(ApiError::internal)?
        .ok_or(ApiError::InvalidCredentials)?;

    // Federated-only accounts have no hash; same generic failure.
    let stored_hash = user
        .password_hash
        .as_deref()
        .ok_or(ApiError::InvalidCredentials)?;

    match verify_password(&req.password, stored_hash) {
        Ok(true) => {}
        Ok(false) => return Err(ApiError::InvalidCredentials),
        Err(err) => {
            // Unreadable stored hash: log it, tell the client nothing.
            warn!(user = %user.key(), error = %err, "stored password hash unusable");
            return Err(ApiError::InvalidCredentials);
        }
    }

    debug!(user = %user.key(), "local login succeeded");

    let token = issue_token(&state, &user)?;
    Ok(auth_response(token, user))
}

/// Federated callback: link the asserted profile, then hand the token (or
/// a generic error) back through a redirect to the frontend.
pub async fn oauth2_callback(
    State(state): State<AppState>,
    Query(params): Query<FederatedCallback>,
) -> Redirect {
    let profile = FederatedProfile {
        provider: ProviderName::new(params.provider),
        provider_id: ExternalSubjectId::new(params.provider_id),
        email: params.email,
        display_name: params.display_name,
        avatar_url: params.avatar_url,
    };

    let redirect_uri = &state.config.oauth_redirect_uri;

    match state.linker.link(&profile).await {
        Ok(user) => match issue_token(&state, &user) {
            Ok(token) => {
                info!(user = %user.key(), provider = %user.provider, "federated login succeeded");
                Redirect::to(&redirect_with(redirect_uri, "token", &token))
            }
            Err(_) => Redirect::to(&redirect_with(
                redirect_uri,
                "error",
                "Authentication failed. Please try again.",
            )),
        },
        Err(err) => {
            warn!(error = %err, "federated callback failed");
            Redirect::to(&redirect_with(redirect_uri, "error", &err.redirect_message()))
        }
    }
}

fn redirect_with(base: &str, key: &str, value: &str) -> String {
    match Url::parse(base) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair(key, value);
            url.to_string()
        }
        Err(err) => {
            // Validated at startup; reaching this means the config changed
            // out from under us.
            tracing::error!(error = %err, "oauth redirect URI is not a valid URL");
            base.to_string()
        }
    }
}
