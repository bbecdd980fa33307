use std::collections::BTreeMap;
use std::time::Duration;

use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::AppError;

/// Uniform success body every endpoint answers with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessEnvelope<T> {
    pub success: bool,
    pub status_code: u16,
    pub message: String,
    pub data: T,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<String>,
}

/// Uniform failure body every endpoint answers with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub success: bool,
    pub status_code: u16,
    pub message: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_errors: Option<BTreeMap<String, Vec<String>>>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

impl ErrorEnvelope {
    pub fn new(
        status: StatusCode,
        message: String,
        error_code: String,
        validation_errors: Option<BTreeMap<String, Vec<String>>>,
        method: Option<String>,
        path: Option<String>,
    ) -> Self {
        Self {
            success: false,
            status_code: status.as_u16(),
            message,
            error_code,
            validation_errors,
            timestamp: Utc::now(),
            path,
            method,
        }
    }
}

/// Default success message derived from the HTTP verb and status.
pub fn default_message(method: Option<&Method>, status: StatusCode) -> &'static str {
    match method {
        Some(m) if *m == Method::POST && status == StatusCode::CREATED => {
            "Resource created successfully"
        }
        Some(m) if *m == Method::PUT || *m == Method::PATCH => "Resource updated successfully",
        Some(m) if *m == Method::DELETE => "Resource deleted successfully",
        _ => "Operation completed successfully",
    }
}

/// Handler result: either a raw value for the boundary to wrap, or a value
/// the handler already enveloped with its own message.
#[derive(Debug)]
pub enum ApiResponse<T: Serialize> {
    Raw { status: StatusCode, data: T },
    Enveloped { status: StatusCode, message: String, data: T },
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse::Raw {
            status: StatusCode::OK,
            data,
        }
    }

    pub fn created(data: T) -> Self {
        ApiResponse::Raw {
            status: StatusCode::CREATED,
            data,
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        ApiResponse::Enveloped {
            status: StatusCode::OK,
            message: message.into(),
            data,
        }
    }
}

/// Serialized handler output carried on the response until the boundary
/// writes the final envelope.
#[derive(Debug, Clone)]
pub struct SuccessPayload {
    pub message: Option<String>,
    pub data: Value,
}

impl SuccessPayload {
    /// Merge metadata into the payload. A handler-supplied message is kept
    /// verbatim; otherwise the verb-derived default applies.
    pub fn into_envelope(
        self,
        status: StatusCode,
        method: Option<&Method>,
        execution_time: Option<Duration>,
    ) -> SuccessEnvelope<Value> {
        SuccessEnvelope {
            success: true,
            status_code: status.as_u16(),
            message: self
                .message
                .unwrap_or_else(|| default_message(method, status).to_string()),
            data: self.data,
            timestamp: Utc::now(),
            execution_time: execution_time.map(|d| format!("{}ms", d.as_millis())),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let (status, message, data) = match self {
            ApiResponse::Raw { status, data } => (status, None, data),
            ApiResponse::Enveloped {
                status,
                message,
                data,
            } => (status, Some(message), data),
        };

        let data = match serde_json::to_value(&data) {
            Ok(value) => value,
            Err(e) => {
                return AppError::internal(format!("Response serialization failed: {}", e))
                    .into_response()
            }
        };

        let payload = SuccessPayload { message, data };
        let mut response =
            (status, Json(payload.clone().into_envelope(status, None, None))).into_response();
        response.extensions_mut().insert(payload);
        response
    }
}

/// Created response helper (DRY - common pattern for POST endpoints)
pub struct Created<T: Serialize>(pub T);

impl<T: Serialize> IntoResponse for Created<T> {
    fn into_response(self) -> Response {
        ApiResponse::created(self.0).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_messages() {
        assert_eq!(
            default_message(Some(&Method::POST), StatusCode::CREATED),
            "Resource created successfully"
        );
        assert_eq!(
            default_message(Some(&Method::POST), StatusCode::OK),
            "Operation completed successfully"
        );
        assert_eq!(
            default_message(Some(&Method::PATCH), StatusCode::OK),
            "Resource updated successfully"
        );
        assert_eq!(
            default_message(Some(&Method::DELETE), StatusCode::OK),
            "Resource deleted successfully"
        );
        assert_eq!(
            default_message(Some(&Method::GET), StatusCode::OK),
            "Operation completed successfully"
        );
    }

    #[test]
    fn test_enveloped_keeps_message_and_data() {
        let payload = SuccessPayload {
            message: Some("Menu published".to_string()),
            data: json!({"items": 3}),
        };

        let first = payload
            .clone()
            .into_envelope(StatusCode::OK, Some(&Method::POST), None);
        let second = payload.into_envelope(
            StatusCode::OK,
            Some(&Method::POST),
            Some(Duration::from_millis(7)),
        );

        assert_eq!(first.message, "Menu published");
        assert_eq!(first.message, second.message);
        assert_eq!(first.data, second.data);
        assert_eq!(second.execution_time.as_deref(), Some("7ms"));
    }

    #[test]
    fn test_error_envelope_serializes_camel_case() {
        let envelope = ErrorEnvelope::new(
            StatusCode::UNAUTHORIZED,
            "nope".to_string(),
            "UNAUTHORIZED".to_string(),
            None,
            Some("GET".to_string()),
            Some("/auth/profile".to_string()),
        );
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["success"], json!(false));
        assert_eq!(value["statusCode"], json!(401));
        assert_eq!(value["errorCode"], json!("UNAUTHORIZED"));
        assert!(value.get("validationErrors").is_none());
        assert_eq!(value["path"], json!("/auth/profile"));
    }

    #[test]
    fn test_api_response_carries_payload() {
        let response = ApiResponse::created(json!({"id": 1})).into_response();
        assert_eq!(response.status(), StatusCode::CREATED);

        let payload = response.extensions().get::<SuccessPayload>().unwrap();
        assert!(payload.message.is_none());
        assert_eq!(payload.data, json!({"id": 1}));
    }
}
