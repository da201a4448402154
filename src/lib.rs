// Core modules
mod config;
pub mod types;

pub mod api;
pub mod auth;
pub mod db;

// Re-export key types and functions
pub use api::{ApiError, AppState, UserResponse, create_router};
pub use auth::{
    AccessClass, Decision, FederatedProfile, IdentityLinker, Principal, RequestAuthenticator,
    RoutePolicy, TokenCodec, VerifiedClaims,
};
pub use config::{GatewayConfig, load_gateway_config};
pub use db::{DatabaseConfig, UserRecord, UserRole, UserStore, create_connection, ensure_schema};

use anyhow::Result;
use axum::Router;

/// Convenience function to create a fully configured gateway router.
///
/// Connects to the database, applies the schema, builds the shared state
/// and returns the router with authentication and authorization layers
/// installed.
pub async fn create_app(gateway: GatewayConfig, database: DatabaseConfig) -> Result<Router> {
    let db = create_connection(database).await?;
    ensure_schema(&db).await?;

    let state = AppState::new(db, gateway)?;
    Ok(create_router(state))
}
