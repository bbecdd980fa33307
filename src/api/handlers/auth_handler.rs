//! Authentication handlers.

use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use validator::Validate;

use crate::api::extractors::ValidatedJson;
use crate::api::middleware::CurrentUser;
use crate::api::AppState;
use crate::domain::User;
use crate::errors::{AppResult, OptionExt};
use crate::services::AuthResponse;
use crate::types::{ApiResponse, Created};

/// User registration request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(
        length(min = 1, message = "should not be empty"),
        email(message = "must be a valid email address")
    )]
    pub email: String,
    #[validate(length(min = 6, message = "must be at least 6 characters"))]
    pub password: String,
    #[validate(length(min = 1, message = "should not be empty"))]
    pub name: String,
    /// Accepted for compatibility; self-registration always yields a customer
    #[serde(default)]
    pub role: Option<String>,
}

/// User login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(
        length(min = 1, message = "should not be empty"),
        email(message = "must be a valid email address")
    )]
    pub email: String,
    #[validate(length(min = 1, message = "should not be empty"))]
    pub password: String,
}

/// Create authentication routes
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/profile", get(profile))
}

/// Register a customer account and sign it in
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RegisterRequest>,
) -> AppResult<Created<AuthResponse>> {
    let session = state
        .auth_service
        .register(payload.email, payload.password, payload.name, payload.role)
        .await?;

    Ok(Created(session))
}

/// Login and get JWT token
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> AppResult<ApiResponse<AuthResponse>> {
    let session = state
        .auth_service
        .login(payload.email, payload.password)
        .await?;

    Ok(ApiResponse::ok(session))
}

/// Stored profile of the authenticated caller
pub async fn profile(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
) -> AppResult<ApiResponse<User>> {
    let user = state
        .identity_service
        .find_by_id(claims.user_id)
        .await?
        .ok_or_not_found()?;

    Ok(ApiResponse::ok(user))
}
