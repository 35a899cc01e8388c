//! HTTP API
//!
//! Thin transport over the matching engine. The reporting backend calls
//! these endpoints; all validation errors come back as 4xx with a JSON
//! error body, engine availability problems as 503.

pub mod handlers;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::state::AppState;

/// Build the axum router with all matching routes
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/match/instant", post(handlers::instant_match))
        .route("/api/match/background", post(handlers::background_match))
        .route("/api/match/similarity", post(handlers::similarity))
        .route("/api/match/stats", get(handlers::match_stats))
        .layer(cors)
        .with_state(state)
}
