//! Response boundary - Writes every response in the uniform envelope.
//!
//! Handlers and the error type leave an [`ErrorReport`] or a
//! [`SuccessPayload`] in the response extensions. This layer adds request
//! metadata, logs failures and replaces the body. Failing responses that
//! carry no report (router 404/405, extractor rejections) are classified
//! by status, and bare JSON successes are wrapped with the default message.

use std::any::Any;
use std::time::Instant;

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{
        header::{CONTENT_LENGTH, CONTENT_TYPE},
        response::Parts,
        StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::api::AppState;
use crate::errors::ErrorReport;
use crate::types::SuccessPayload;

pub async fn boundary(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(request).await;
    let (mut parts, body) = response.into_parts();

    let report = parts.extensions.remove::<ErrorReport>().or_else(|| {
        let status = parts.status;
        (status.is_client_error() || status.is_server_error())
            .then(|| ErrorReport::from_status(status))
    });

    if let Some(report) = report {
        report.log(&method, &path);
        return rewrite(parts, &report.envelope(Some(&method), Some(&path)));
    }

    let payload = match parts.extensions.remove::<SuccessPayload>() {
        Some(payload) => payload,
        None if parts.status.is_success() && is_json(&parts) => {
            let bytes = match to_bytes(body, usize::MAX).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read response body");
                    let report = ErrorReport::from_status(StatusCode::INTERNAL_SERVER_ERROR);
                    report.log(&method, &path);
                    parts.status = report.status;
                    return rewrite(parts, &report.envelope(Some(&method), Some(&path)));
                }
            };
            match serde_json::from_slice::<Value>(&bytes) {
                Ok(data) => SuccessPayload { message: None, data },
                Err(_) => return Response::from_parts(parts, Body::from(bytes)),
            }
        }
        None => {
            tracing::debug!(status = parts.status.as_u16(), %path, "Response left unwrapped");
            return Response::from_parts(parts, body);
        }
    };

    let execution_time = (!state.config.is_production()).then(|| started.elapsed());
    let envelope = payload.into_envelope(parts.status, Some(&method), execution_time);
    rewrite(parts, &envelope)
}

fn is_json(parts: &Parts) -> bool {
    parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"))
}

/// Replace the body, keeping status and headers.
fn rewrite<T: Serialize>(mut parts: Parts, body: &T) -> Response {
    parts.headers.remove(CONTENT_LENGTH);
    let fresh = Json(body).into_response();
    let (fresh_parts, fresh_body) = fresh.into_parts();
    for (name, value) in fresh_parts.headers.iter() {
        parts.headers.insert(name.clone(), value.clone());
    }
    Response::from_parts(parts, fresh_body)
}

/// `CatchPanicLayer` handler: panics surface as an opaque 500.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    let report = ErrorReport::from_panic(format!("Handler panicked: {}", detail));
    let mut response = (report.status, Json(report.envelope(None, None))).into_response();
    response.extensions_mut().insert(report);
    response
}
