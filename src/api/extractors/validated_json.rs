//! Validated JSON extractor - Combines deserialization with validation.
//!
//! Every failure is reported as `property <field> <message>` so the boundary
//! can group messages by field.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    response::{IntoResponse, Response},
    Json,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::errors::AppError;

static MISSING_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"missing field `([^`]+)`").expect("valid regex"));

static FIELD_ERROR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"target type: ([A-Za-z0-9_.\[\]]+): (.+?)(?: at line \d+ column \d+)?$")
        .expect("valid regex")
});

/// Validated JSON extractor that automatically validates requests.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Deserialize, Validate)]
/// struct LoginRequest {
///     #[validate(email(message = "must be a valid email address"))]
///     email: String,
/// }
///
/// async fn login(ValidatedJson(payload): ValidatedJson<LoginRequest>) {
///     // payload is already validated
/// }
/// ```
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = match Json::<T>::from_request(req, state).await {
            Ok(json) => json,
            // Body limits and read failures keep their own status
            Err(rejection @ JsonRejection::BytesRejection(_)) => {
                return Err(rejection.into_response())
            }
            Err(rejection) => {
                return Err(AppError::validation(describe_rejection(&rejection)).into_response())
            }
        };

        value
            .validate()
            .map_err(|e| AppError::Validation(format_validation_errors(&e)).into_response())?;

        Ok(ValidatedJson(value))
    }
}

/// Turn a deserialization failure into a field-tagged message where possible.
fn describe_rejection(rejection: &JsonRejection) -> String {
    let text = rejection.body_text();

    if let Some(field) = MISSING_FIELD.captures(&text).and_then(|c| c.get(1)) {
        return format!("property {} should not be empty", field.as_str());
    }
    if let JsonRejection::JsonDataError(_) = rejection {
        if let Some(captures) = FIELD_ERROR.captures(&text) {
            return format!("property {} {}", &captures[1], &captures[2]);
        }
    }
    text
}

/// One message per failed rule, ordered by field.
fn format_validation_errors(errors: &validator::ValidationErrors) -> Vec<String> {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "is invalid".to_string());
                format!("property {} {}", field, message)
            })
        })
        .collect();
    messages.sort();
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request as HttpRequest};
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Validate)]
    struct Probe {
        #[validate(email(message = "must be a valid email address"))]
        email: String,
        #[validate(length(min = 6, message = "must be at least 6 characters"))]
        password: String,
    }

    fn request(body: &'static str) -> Request {
        HttpRequest::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn messages(body: &'static str) -> Vec<String> {
        let response = match ValidatedJson::<Probe>::from_request(request(body), &()).await {
            Ok(_) => panic!("expected rejection"),
            Err(response) => response,
        };
        let report = response
            .extensions()
            .get::<crate::errors::ErrorReport>()
            .cloned()
            .unwrap();
        report
            .validation_errors
            .unwrap()
            .into_values()
            .flatten()
            .collect()
    }

    #[tokio::test]
    async fn test_rule_violations_are_field_tagged() {
        let messages = messages(r#"{"email":"not-an-email","password":"123"}"#).await;
        assert_eq!(
            messages,
            vec![
                "property email must be a valid email address".to_string(),
                "property password must be at least 6 characters".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_field_is_field_tagged() {
        let messages = messages(r#"{"email":"a@b.io"}"#).await;
        assert_eq!(messages, vec!["property password should not be empty".to_string()]);
    }

    #[tokio::test]
    async fn test_valid_payload_passes() {
        let ValidatedJson(probe) = ValidatedJson::<Probe>::from_request(
            request(r#"{"email":"a@b.io","password":"123456"}"#),
            &(),
        )
        .await
        .ok()
        .unwrap();
        assert_eq!(probe.email, "a@b.io");
    }
}
