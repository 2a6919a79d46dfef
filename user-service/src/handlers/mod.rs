//! HTTP handlers

pub mod auth;
pub mod extract;
pub mod users;

use axum::http::{Method, StatusCode, Uri};

use crate::error::{ApiError, Error};
use crate::responses::Envelope;

pub use extract::ValidJson;

/// `GET /` and `GET /api`
pub async fn server_status() -> Envelope<()> {
    Envelope::message("User service is running!")
}

/// Fallback for unmatched routes
pub async fn not_found(method: Method, uri: Uri) -> Error {
    let path = uri.path();
    ApiError::not_found(
        format!("Requested End-Point “{}: {}” Not Found!", method, path),
        path,
    )
    .into()
}

/// Fallback for known paths hit with an unsupported method
pub async fn method_not_allowed(method: Method, uri: Uri) -> Error {
    let path = uri.path();
    ApiError::new(
        "Method Not Allowed Error",
        format!("Method “{}” is not allowed on “{}”!", method, path),
        StatusCode::METHOD_NOT_ALLOWED,
        path,
    )
    .into()
}
