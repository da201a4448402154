// REST API surface of the gateway.

pub mod auth;
mod error;
pub mod users;

pub use error::ApiError;

use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use http::request::Parts;
use serde::Serialize;
use serde_json::Value;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use url::Url;

use crate::auth::{
    Decision, IdentityLinker, Principal, RequestAuthenticator, RoutePolicy, TokenCodec,
};
use crate::config::GatewayConfig;
use crate::db::connection::Db;
use crate::db::schema::{UserRecord, UserRole};
use crate::db::users::UserStore;
use crate::types::ProviderName;

/// Shared, read-only application state. Everything in here is fixed at
/// startup; per-request identity travels in request extensions instead.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<UserStore>,
    pub tokens: Arc<TokenCodec>,
    pub authenticator: Arc<RequestAuthenticator>,
    pub linker: Arc<IdentityLinker>,
    pub policy: Arc<RoutePolicy>,
    pub config: Arc<GatewayConfig>,
}

impl AppState {
    pub fn new(db: Db, config: GatewayConfig) -> anyhow::Result<Self> {
        Url::parse(&config.oauth_redirect_uri)
            .map_err(|e| anyhow::anyhow!("oauth_redirect_uri is not a valid URL: {}", e))?;

        let tokens = Arc::new(TokenCodec::from_config(&config)?);
        let users = Arc::new(UserStore::new(db));

        Ok(Self {
            authenticator: Arc::new(RequestAuthenticator::new(tokens.clone())),
            linker: Arc::new(IdentityLinker::new(users.clone())),
            policy: Arc::new(RoutePolicy::gateway_defaults()),
            config: Arc::new(config),
            users,
            tokens,
        })
    }
}

/// Client-facing user shape. Never carries the password hash.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    pub provider: ProviderName,
    pub avatar_url: Option<String>,
    pub created_at: Option<String>,
}

impl From<UserRecord> for UserResponse {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.key(),
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            role: user.role,
            provider: user.provider,
            avatar_url: user.avatar_url,
            created_at: user.created_at.map(|d| d.to_string()),
        }
    }
}

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or(ApiError::Unauthenticated)
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/oauth2/callback", get(auth::oauth2_callback))
        .route("/api/users/profile", get(users::profile))
        .route("/api/users/change-password", post(users::change_password))
        .route("/api/admin/users", get(users::list_users))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    attach_principal,
                ))
                .layer(middleware::from_fn_with_state(state.clone(), enforce_policy)),
        )
        .with_state(state)
}

/// Request authenticator. Attaches a [`Principal`] to the request's
/// extension map when a usable bearer token is present; otherwise lets
/// the request continue anonymous. Never rejects on its own.
async fn attach_principal(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let principal = {
        let authorization = request
            .headers()
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        state.authenticator.authenticate(authorization)
    };

    if let Some(principal) = principal {
        request.extensions_mut().insert(principal);
    }

    next.run(request).await
}

/// Authorization policy enforcement, evaluated after authentication.
async fn enforce_policy(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let decision = state
        .policy
        .decide(request.extensions().get::<Principal>(), request.uri().path());

    match decision {
        Decision::Allow => next.run(request).await,
        Decision::DenyUnauthenticated => ApiError::Unauthenticated.into_response(),
        Decision::DenyForbidden => ApiError::Forbidden.into_response(),
    }
}

async fn health_check() -> Result<Json<Value>, StatusCode> {
    Ok(Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DatabaseConfig, create_connection, ensure_schema};
    use axum::body::{Body, to_bytes};
    use axum::http::{Request as HttpRequest, header};
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use serde_json::json;
    use tower::ServiceExt;

    async fn test_router() -> Router {
        let db = create_connection(DatabaseConfig {
            url: "memory".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
        ensure_schema(&db).await.unwrap();

        let config = GatewayConfig {
            jwt_secret: BASE64.encode([5u8; 32]),
            token_ttl_secs: 3600,
            oauth_redirect_uri: "http://localhost:4200/oauth2/redirect".to_string(),
        };

        create_router(AppState::new(db, config).unwrap())
    }

    fn json_request(method: &str, uri: &str, body: Value) -> HttpRequest<Body> {
        HttpRequest::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str, token: Option<&str>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder().method("GET").uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn send(router: &Router, request: HttpRequest<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn register_body(email: &str, password: &str, role: Option<&str>) -> Value {
        let mut body = json!({
            "email": email,
            "password": password,
            "firstName": "Test",
            "lastName": "User",
        });
        if let Some(role) = role {
            body["role"] = json!(role);
        }
        body
    }

    async fn register_and_get_token(router: &Router, email: &str, role: Option<&str>) -> String {
        let (status, body) = send(
            router,
            json_request(
                "POST",
                "/api/auth/register",
                register_body(email, "password123", role),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let router = test_router().await;

        let (status, body) = send(&router, get_request("/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_register_returns_token_and_sanitized_user() {
        let router = test_router().await;

        let (status, body) = send(
            &router,
            json_request(
                "POST",
                "/api/auth/register",
                register_body("jane@example.com", "password123", None),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["token"].as_str().unwrap().split('.').count() == 3);

        let user = &body["user"];
        assert_eq!(user["email"], "jane@example.com");
        assert_eq!(user["role"], "USER");
        assert_eq!(user["provider"], "local");
        // The password hash never leaves the server.
        assert!(user.get("password").is_none());
        assert!(user.get("passwordHash").is_none());
    }

    #[tokio::test]
    async fn test_register_duplicate_email_rejected() {
        let router = test_router().await;

        register_and_get_token(&router, "jane@example.com", None).await;

        let (status, body) = send(
            &router,
            json_request(
                "POST",
                "/api/auth/register",
                register_body("jane@example.com", "password123", None),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Email already registered");
    }

    #[tokio::test]
    async fn test_login_succeeds_with_correct_credentials() {
        let router = test_router().await;
        register_and_get_token(&router, "jane@example.com", None).await;

        let (status, body) = send(
            &router,
            json_request(
                "POST",
                "/api/auth/login",
                json!({"email": "Jane@Example.com", "password": "password123"}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["token"].is_string());
        assert_eq!(body["user"]["email"], "jane@example.com");
    }

    #[tokio::test]
    async fn test_login_failures_are_byte_identical() {
        let router = test_router().await;
        register_and_get_token(&router, "jane@example.com", None).await;

        // Known email, wrong password.
        let wrong_password = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/auth/login",
                json!({"email": "jane@example.com", "password": "wrongpass1"}),
            ))
            .await
            .unwrap();

        // Unknown email.
        let unknown_email = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/auth/login",
                json!({"email": "nobody@example.com", "password": "password123"}),
            ))
            .await
            .unwrap();

        assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_password.status(), unknown_email.status());

        let a = to_bytes(wrong_password.into_body(), usize::MAX).await.unwrap();
        let b = to_bytes(unknown_email.into_body(), usize::MAX).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_protected_route_without_token_is_401() {
        let router = test_router().await;

        let (status, body) = send(&router, get_request("/api/users/profile", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Authentication required");
    }

    #[tokio::test]
    async fn test_invalid_token_treated_like_missing_token() {
        let router = test_router().await;

        let (status, _) = send(
            &router,
            get_request("/api/users/profile", Some("garbage.not.valid")),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_profile_with_valid_token() {
        let router = test_router().await;
        let token = register_and_get_token(&router, "jane@example.com", None).await;

        let (status, body) = send(&router, get_request("/api/users/profile", Some(&token))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "jane@example.com");
        assert!(body.get("passwordHash").is_none());
    }

    #[tokio::test]
    async fn test_admin_route_forbidden_for_user_role() {
        let router = test_router().await;
        let token = register_and_get_token(&router, "jane@example.com", None).await;

        let (status, body) = send(&router, get_request("/api/admin/users", Some(&token))).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Access denied");
    }

    #[tokio::test]
    async fn test_admin_route_allowed_for_admin_role() {
        let router = test_router().await;
        let token = register_and_get_token(&router, "root@example.com", Some("ADMIN")).await;

        let (status, body) = send(&router, get_request("/api/admin/users", Some(&token))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unmatched_route_defaults_to_authenticated() {
        let router = test_router().await;

        let (status, _) = send(&router, get_request("/metrics", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // With a principal the policy allows it; the router then 404s.
        let token = register_and_get_token(&router, "jane@example.com", None).await;
        let (status, _) = send(&router, get_request("/metrics", Some(&token))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_change_password_round_trip() {
        let router = test_router().await;
        let token = register_and_get_token(&router, "jane@example.com", None).await;

        let request = HttpRequest::builder()
            .method("POST")
            .uri("/api/users/change-password")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::from(
                json!({"currentPassword": "password123", "newPassword": "betterpass1"}).to_string(),
            ))
            .unwrap();
        let (status, _) = send(&router, request).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        // Old password no longer works...
        let (status, _) = send(
            &router,
            json_request(
                "POST",
                "/api/auth/login",
                json!({"email": "jane@example.com", "password": "password123"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // ...the new one does.
        let (status, _) = send(
            &router,
            json_request(
                "POST",
                "/api/auth/login",
                json!({"email": "jane@example.com", "password": "betterpass1"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_oauth_callback_redirects_with_token() {
        let router = test_router().await;

        let uri = "/api/auth/oauth2/callback?provider=google&provider_id=g-1\
                   &email=jane%40example.com&display_name=Jane%20Doe";
        let response = router.clone().oneshot(get_request(uri, None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(location.starts_with("http://localhost:4200/oauth2/redirect?token="));
    }

    #[tokio::test]
    async fn test_oauth_callback_without_email_redirects_with_error() {
        let router = test_router().await;

        let uri = "/api/auth/oauth2/callback?provider=google&provider_id=g-1";
        let response = router.clone().oneshot(get_request(uri, None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(location.contains("error="));
        assert!(!location.contains("token="));
    }

    #[tokio::test]
    async fn test_oauth_callback_provider_conflict_names_original_provider() {
        let router = test_router().await;

        // First contact under google.
        let uri = "/api/auth/oauth2/callback?provider=google&provider_id=g-1\
                   &email=jane%40example.com";
        router.clone().oneshot(get_request(uri, None)).await.unwrap();

        // Same email asserted by github.
        let uri = "/api/auth/oauth2/callback?provider=github&provider_id=h-1\
                   &email=jane%40example.com";
        let response = router.clone().oneshot(get_request(uri, None)).await.unwrap();

        let location = response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(location.contains("error="));
        assert!(location.contains("google"));
    }

    #[tokio::test]
    async fn test_federated_token_works_on_protected_routes() {
        let router = test_router().await;

        let uri = "/api/auth/oauth2/callback?provider=google&provider_id=g-1\
                   &email=jane%40example.com";
        let response = router.clone().oneshot(get_request(uri, None)).await.unwrap();
        let location = response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap();

        let url = Url::parse(location).unwrap();
        let token = url
            .query_pairs()
            .find(|(k, _)| k == "token")
            .map(|(_, v)| v.to_string())
            .unwrap();

        let (status, body) = send(&router, get_request("/api/users/profile", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "jane@example.com");
        assert_eq!(body["provider"], "google");
    }
}
