//! Refresh-token cookie

use axum::http::{header, HeaderMap, HeaderValue};
use cookie::Cookie;

use crate::error::{Error, Result};

/// Cookie carrying the refresh token
pub const REFRESH_COOKIE: &str = "refresh_token";

/// `Set-Cookie` value for a refresh token; `Secure` only in production
pub fn refresh_cookie(token: &str, secure: bool) -> Result<HeaderValue> {
    let cookie = Cookie::build((REFRESH_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .build();
    HeaderValue::from_str(&cookie.to_string())
        .map_err(|err| Error::Internal(format!("Invalid cookie value: {}", err)))
}

/// Value of cookie `name` across all `Cookie` headers
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(|cookie| cookie.ok())
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value_trimmed().to_string())
}
