//! Centralized error handling.
//!
//! Provides a unified error type for the entire application, the
//! classification rules that turn any failure into an [`ErrorReport`], and
//! the automatic HTTP response conversion. The `boundary` middleware finishes
//! the report with request metadata before it leaves the process.

use std::collections::BTreeMap;

use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::config::{
    MSG_INTERNAL_ERROR, MSG_INVALID_CREDENTIALS, MSG_UNAUTHORIZED, MSG_VALIDATION_FAILED,
    UNKNOWN_FIELD,
};
use crate::infra::StoreError;
use crate::types::ErrorEnvelope;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication
    #[error("{}", MSG_UNAUTHORIZED)]
    Unauthorized,

    #[error("{}", MSG_INVALID_CREDENTIALS)]
    InvalidCredentials,

    // Resource errors
    #[error("Resource not found")]
    NotFound,

    #[error("{0} already exists")]
    AlreadyExists(String),

    // Validation
    #[error("{}", .0.join(", "))]
    Validation(Vec<String>),

    // External service errors
    #[error("Identity store error")]
    Store(#[from] StoreError),

    // Internal
    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    /// Get error code for client
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::NotFound => "NOT_FOUND",
            AppError::AlreadyExists(_) => "ALREADY_EXISTS",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Store(_) | AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get HTTP status code
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::AlreadyExists(_) => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Store(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get user-facing message (hides internal details)
    pub fn user_message(&self) -> String {
        match self {
            AppError::Validation(_) => MSG_VALIDATION_FAILED.to_string(),
            AppError::Store(_) | AppError::Internal(_) => MSG_INTERNAL_ERROR.to_string(),
            _ => self.to_string(),
        }
    }

    /// Server-side detail, never sent to clients.
    fn detail(&self) -> Option<String> {
        match self {
            AppError::Store(e) => Some(format!("{:?}", e)),
            AppError::Internal(msg) => Some(msg.clone()),
            _ => None,
        }
    }

    /// Whether this failure is part of the expected domain vocabulary
    /// (as opposed to an infrastructure fault).
    pub fn is_domain(&self) -> bool {
        !matches!(self, AppError::Store(_) | AppError::Internal(_))
    }
}

/// Result type alias
pub type AppResult<T> = Result<T, AppError>;

/// Extension trait for Option -> AppError conversion
pub trait OptionExt<T> {
    fn ok_or_not_found(self) -> AppResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self) -> AppResult<T> {
        self.ok_or(AppError::NotFound)
    }
}

/// Convenience constructors
impl AppError {
    pub fn already_exists(entity: impl Into<String>) -> Self {
        AppError::AlreadyExists(entity.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(vec![msg.into()])
    }

    pub fn validation_messages<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AppError::Validation(messages.into_iter().map(Into::into).collect())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }
}

// =============================================================================
// Classification
// =============================================================================

static PROPERTY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bproperty\s+([A-Za-z0-9_.\[\]]+)").expect("valid regex"));

/// Group validation messages by the field named in their `property <name>` marker.
///
/// Messages without a marker land under `unknown`.
pub fn group_validation_messages(messages: &[String]) -> BTreeMap<String, Vec<String>> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for message in messages {
        let field = PROPERTY_PATTERN
            .captures(message)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| UNKNOWN_FIELD.to_string());
        grouped.entry(field).or_default().push(message.clone());
    }
    grouped
}

/// A classified failure, carried on the response until the boundary writes it out.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub status: StatusCode,
    pub error_code: String,
    pub message: String,
    pub validation_errors: Option<BTreeMap<String, Vec<String>>>,
    detail: Option<String>,
}

impl ErrorReport {
    /// Classify a response that failed without an [`AppError`] behind it
    /// (router rejections, body limits and the like) by its status alone.
    pub fn from_status(status: StatusCode) -> Self {
        let status = if status.is_client_error() || status.is_server_error() {
            status
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        let message = if status.is_server_error() {
            MSG_INTERNAL_ERROR.to_string()
        } else {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        };

        Self {
            status,
            error_code: status_error_code(status),
            message,
            validation_errors: None,
            detail: None,
        }
    }

    /// A panic caught at the boundary.
    pub fn from_panic(detail: impl Into<String>) -> Self {
        Self {
            detail: Some(detail.into()),
            ..Self::from_status(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }

    /// Render the client-facing envelope.
    pub fn envelope(&self, method: Option<&Method>, path: Option<&str>) -> ErrorEnvelope {
        ErrorEnvelope::new(
            self.status,
            self.message.clone(),
            self.error_code.clone(),
            self.validation_errors.clone(),
            method.map(|m| m.to_string()),
            path.map(str::to_string),
        )
    }

    /// Log at a severity proportional to the status.
    pub fn log(&self, method: &Method, path: &str) {
        let status = self.status.as_u16();
        if self.status.is_server_error() {
            tracing::error!(
                status,
                %method,
                path,
                error_code = %self.error_code,
                detail = self.detail.as_deref().unwrap_or("-"),
                "Request failed"
            );
        } else if let Some(fields) = &self.validation_errors {
            tracing::warn!(
                status,
                %method,
                path,
                fields = ?fields.keys().collect::<Vec<_>>(),
                "Validation failed"
            );
        } else {
            tracing::info!(
                status,
                %method,
                path,
                error_code = %self.error_code,
                "Request rejected"
            );
        }
    }
}

impl From<&AppError> for ErrorReport {
    fn from(err: &AppError) -> Self {
        let validation_errors = match err {
            AppError::Validation(messages) => Some(group_validation_messages(messages)),
            _ => None,
        };

        Self {
            status: err.status(),
            error_code: err.code().to_string(),
            message: err.user_message(),
            validation_errors,
            detail: err.detail(),
        }
    }
}

fn status_error_code(status: StatusCode) -> String {
    match status {
        StatusCode::BAD_REQUEST => "BAD_REQUEST".to_string(),
        StatusCode::UNAUTHORIZED => "UNAUTHORIZED".to_string(),
        StatusCode::FORBIDDEN => "FORBIDDEN".to_string(),
        StatusCode::NOT_FOUND => "NOT_FOUND".to_string(),
        StatusCode::CONFLICT => "CONFLICT".to_string(),
        s if s.is_server_error() => "INTERNAL_ERROR".to_string(),
        s => s
            .canonical_reason()
            .map(|reason| reason.to_ascii_uppercase().replace([' ', '-'], "_"))
            .unwrap_or_else(|| "HTTP_ERROR".to_string()),
    }
}

// =============================================================================
// HTTP Response (Axum)
// =============================================================================

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let report = ErrorReport::from(&self);
        let mut response = (report.status, Json(report.envelope(None, None))).into_response();
        response.extensions_mut().insert(report);
        response
    }
}
