//! HTTP surface for the query pipeline.

pub mod error;
pub mod jwt;
pub mod routes;

use std::sync::Arc;

use axum::{
    middleware as axum_mw,
    routing::{get, post},
    Extension, Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use jwt::{jwt_auth, JwtClaims, JwtConfig};
pub use routes::AppState;

/// Build the full axum router with all routes and middleware.
pub fn build_router(state: Arc<AppState>, jwt_config: JwtConfig) -> Router {
    // Routes that require a bearer token
    let protected = Router::new()
        .route("/api/chat/query", post(routes::chat_query))
        .route("/api/chat/download", post(routes::chat_download))
        .route("/api/chat/history", get(routes::chat_history))
        .layer(axum_mw::from_fn(jwt_auth))
        .layer(Extension(jwt_config));

    let public = Router::new().route("/health", get(routes::health));

    public
        .merge(protected)
        .fallback(routes::not_found)
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
