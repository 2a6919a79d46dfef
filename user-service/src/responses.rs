//! Success response envelope
//!
//! Every successful endpoint answers with
//! `{ "success": true, "message": .., "status": .., "data": .. }`.
//!
//! ```rust,ignore
//! use user_service::responses::Envelope;
//!
//! async fn profile() -> Envelope<UserView> {
//!     Envelope::ok("User retrieved successfully!", view)
//! }
//! ```

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Response body of a successful request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessBody<T> {
    /// Always `true`
    pub success: bool,
    pub message: String,
    /// HTTP status code
    pub status: u16,
    /// `null` when there is nothing to return
    pub data: Option<T>,
}

/// Success response with optional `Set-Cookie` headers
#[derive(Debug)]
pub struct Envelope<T> {
    status: StatusCode,
    message: String,
    data: Option<T>,
    cookies: Vec<HeaderValue>,
}

impl<T> Envelope<T> {
    pub fn new(status: StatusCode, message: impl Into<String>, data: Option<T>) -> Self {
        Self {
            status,
            message: message.into(),
            data,
            cookies: Vec::new(),
        }
    }

    /// 200 OK
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self::new(StatusCode::OK, message, Some(data))
    }

    /// 201 Created
    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self::new(StatusCode::CREATED, message, Some(data))
    }

    /// Attach a `Set-Cookie` header
    pub fn with_cookie(mut self, cookie: HeaderValue) -> Self {
        self.cookies.push(cookie);
        self
    }
}

impl Envelope<()> {
    /// 200 OK with `data: null`
    pub fn message(message: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, message, None)
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        let body = SuccessBody {
            success: true,
            message: self.message,
            status: self.status.as_u16(),
            data: self.data,
        };

        let mut response = (self.status, Json(body)).into_response();
        for cookie in self.cookies {
            response.headers_mut().append(header::SET_COOKIE, cookie);
        }
        response
    }
}
