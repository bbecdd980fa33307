//! Application route configuration.

use axum::{extract::State, middleware, routing::get, Router};
use serde::Serialize;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use super::handlers::auth_routes;
use super::middleware::{access_gate, boundary, panic_response};
use super::AppState;
use crate::errors::{AppError, AppResult};
use crate::types::ApiResponse;

/// Create the application router with all routes configured
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/auth", auth_routes())
        // Runs only for matched routes; public paths are skipped inside
        .route_layer(middleware::from_fn_with_state(state.clone(), access_gate))
        .fallback(not_found)
        // Global middleware, innermost first
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn_with_state(state.clone(), boundary))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Root endpoint
async fn root() -> ApiResponse<&'static str> {
    ApiResponse::ok("Welcome to the restaurant API")
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    store: &'static str,
}

/// Health check endpoint with identity store connectivity check
async fn health(State(state): State<AppState>) -> AppResult<ApiResponse<HealthResponse>> {
    state.store.ping().await?;

    Ok(ApiResponse::ok(HealthResponse {
        status: "healthy",
        store: "reachable",
    }))
}

async fn not_found() -> AppError {
    AppError::NotFound
}
