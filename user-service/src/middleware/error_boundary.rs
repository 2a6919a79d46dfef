//! Logs every normalized error and adds stack traces outside production

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use crate::error::{ApiError, Error, ErrorResponse};
use crate::normalize::NormalizedError;

/// Whether error bodies carry a `stack` field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackTraces(pub bool);

pub async fn error_boundary(
    State(StackTraces(include_stack)): State<StackTraces>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let mut response = next.run(request).await;

    let Some(normalized) = response.extensions_mut().remove::<NormalizedError>() else {
        return response;
    };

    for source in &normalized.error_source {
        tracing::warn!(
            status = normalized.status_code,
            name = %normalized.name,
            %method,
            path = %path,
            source = %source.path,
            "{}",
            source.message
        );
    }

    if !include_stack {
        return response;
    }

    let status = response.status();
    let body = ErrorResponse::from_normalized(&normalized, true);
    let mut rebuilt = (status, Json(body)).into_response();
    for (name, value) in response.headers() {
        if !rebuilt.headers().contains_key(name) {
            rebuilt.headers_mut().insert(name.clone(), value.clone());
        }
    }
    rebuilt
}

/// Gives the bare 408 and 413 responses of the timeout and body-limit layers the error body
pub async fn transport_errors(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let response = next.run(request).await;

    if is_json(&response) {
        return response;
    }
    let error = match response.status() {
        StatusCode::REQUEST_TIMEOUT => ApiError::request_timeout(path.as_str()),
        StatusCode::PAYLOAD_TOO_LARGE => ApiError::payload_too_large(),
        _ => return response,
    };
    tracing::warn!(
        status = error.status.as_u16(),
        name = %error.name,
        %method,
        path = %path,
        "{}",
        error.message
    );

    let mut rebuilt = Error::from(error).into_response();
    for (name, value) in response.headers() {
        if name != header::CONTENT_LENGTH && !rebuilt.headers().contains_key(name) {
            rebuilt.headers_mut().insert(name.clone(), value.clone());
        }
    }
    rebuilt
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"))
}

/// Body for a handler panic
pub fn panic_response(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    Error::Internal(detail).into_response()
}
