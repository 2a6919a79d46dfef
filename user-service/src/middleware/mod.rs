//! HTTP middleware

pub mod error_boundary;
pub mod request_tracking;

pub use error_boundary::{error_boundary, panic_response, transport_errors, StackTraces};
pub use request_tracking::{
    request_id_header, request_id_layer, request_id_propagation_layer, sensitive_headers_layer,
    MakeTypedRequestId, SENSITIVE_HEADERS,
};
