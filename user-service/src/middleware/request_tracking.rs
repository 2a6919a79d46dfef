//! Request ID generation, propagation and sensitive header masking

use http::{header, HeaderName, HeaderValue, Request};
use tower_http::{
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    sensitive_headers::SetSensitiveRequestHeadersLayer,
};
use uuid::Uuid;

/// Prefix of generated request IDs
pub const REQUEST_ID_PREFIX: &str = "req";

/// Headers masked in trace output
pub const SENSITIVE_HEADERS: &[HeaderName] = &[
    header::AUTHORIZATION,
    header::COOKIE,
    header::SET_COOKIE,
];

/// Generates `req_<uuid v7>` request IDs, sortable by creation time
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeTypedRequestId;

impl MakeRequestId for MakeTypedRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = format!("{}_{}", REQUEST_ID_PREFIX, Uuid::now_v7().simple());
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Parse the configured request ID header, falling back to `x-request-id`
pub fn request_id_header(name: &str) -> HeaderName {
    HeaderName::try_from(name).unwrap_or_else(|_| {
        tracing::warn!(header = name, "Invalid request ID header, using x-request-id");
        HeaderName::from_static("x-request-id")
    })
}

/// Assign a request ID to requests that arrive without one
pub fn request_id_layer(header: HeaderName) -> SetRequestIdLayer<MakeTypedRequestId> {
    SetRequestIdLayer::new(header, MakeTypedRequestId)
}

/// Copy the request ID onto the response
pub fn request_id_propagation_layer(header: HeaderName) -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(header)
}

pub fn sensitive_headers_layer() -> SetSensitiveRequestHeadersLayer {
    SetSensitiveRequestHeadersLayer::new(SENSITIVE_HEADERS.iter().cloned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_request_id() {
        let request = Request::builder().body(()).unwrap();
        let id = MakeTypedRequestId.make_request_id(&request).unwrap();
        let value = id.header_value().to_str().unwrap();

        assert!(value.starts_with("req_"));
        // prefix + underscore + 32 hex digits
        assert_eq!(value.len(), 36);
    }

    #[test]
    fn test_request_ids_are_unique() {
        let request = Request::builder().body(()).unwrap();
        let a = MakeTypedRequestId.make_request_id(&request).unwrap();
        let b = MakeTypedRequestId.make_request_id(&request).unwrap();
        assert_ne!(a.header_value(), b.header_value());
    }

    #[test]
    fn test_request_id_header_fallback() {
        assert_eq!(request_id_header("x-correlation-id"), "x-correlation-id");
        assert_eq!(request_id_header("not a header"), "x-request-id");
    }
}
