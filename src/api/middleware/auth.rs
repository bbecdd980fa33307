//! Access gate - Bearer token authentication for non-public routes.

use axum::{
    async_trait,
    extract::{FromRequestParts, MatchedPath, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::api::AppState;
use crate::config::{is_public_route, BEARER_SCHEME};
use crate::errors::AppError;
use crate::services::SessionClaims;

/// Authenticated caller, available to handlers behind the access gate.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub SessionClaims);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionClaims>()
            .cloned()
            .map(CurrentUser)
            .ok_or(AppError::Unauthorized)
    }
}

/// Auth scheme names are case-insensitive (RFC 7235), the token is not.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let (scheme, token) = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())?
        .split_once(' ')?;

    let token = token.trim();
    (scheme.eq_ignore_ascii_case(BEARER_SCHEME) && !token.is_empty()).then_some(token)
}

/// JWT authentication middleware.
///
/// Public routes pass through untouched. Anything else needs a valid bearer
/// token; its claims are attached to the request extensions.
pub async fn access_gate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| request.uri().path().to_owned());

    if is_public_route(&path) {
        return Ok(next.run(request).await);
    }

    let token = bearer_token(request.headers()).ok_or(AppError::Unauthorized)?;
    let claims = state.auth_service.verify_token(token)?;

    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}
