//! Error types and HTTP response conversion

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mongodb::bson::Document;
use mongodb::error::{ErrorKind, WriteFailure};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::normalize::{self, NormalizedError, SourcePath};

/// Server error code MongoDB reports for a unique index violation
pub const DUPLICATE_KEY_CODE: i32 = 11000;

/// Text rendered in place of a missing stack trace
pub const STACK_UNAVAILABLE: &str = "Stack Trace Not Available!";

// ============================================================================
// Persistence-model errors
// ============================================================================

/// A value that could not be cast to the declared type of a field
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cast to {kind} failed for value \"{value}\" at path \"{path}\"")]
pub struct CastError {
    /// Field path that received the value
    pub path: String,
    /// The raw value
    pub value: String,
    /// Target type name
    pub kind: String,
}

impl CastError {
    /// Create a cast error for an identifier that is not a valid ObjectId
    pub fn object_id(path: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
            kind: "ObjectId".to_string(),
        }
    }
}

/// One failing field of a stored document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// Rejected by a field validator (required, enum, length)
    Validator { path: String, message: String },
    /// Could not be cast to the field type
    Cast(CastError),
}

impl FieldError {
    /// Path of the failing field
    pub fn path(&self) -> &str {
        match self {
            Self::Validator { path, .. } => path,
            Self::Cast(cast) => &cast.path,
        }
    }

    /// Message for the failing field
    pub fn message(&self) -> String {
        match self {
            Self::Validator { message, .. } => message.clone(),
            Self::Cast(cast) => cast.to_string(),
        }
    }
}

/// Validation failure of a document against its persistence model,
/// one entry per failing field in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentValidationError {
    pub errors: Vec<FieldError>,
}

impl DocumentValidationError {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a validator failure for `path`
    pub fn with_field(mut self, path: impl Into<String>, message: impl Into<String>) -> Self {
        self.errors.push(FieldError::Validator {
            path: path.into(),
            message: message.into(),
        });
        self
    }

    /// Add a cast failure
    pub fn with_cast(mut self, cast: CastError) -> Self {
        self.errors.push(FieldError::Cast(cast));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// First nested cast failure, if any
    pub fn cast_error(&self) -> Option<&CastError> {
        self.errors.iter().find_map(|e| match e {
            FieldError::Cast(cast) => Some(cast),
            FieldError::Validator { .. } => None,
        })
    }
}

impl fmt::Display for DocumentValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed")?;
        for (i, err) in self.errors.iter().enumerate() {
            let sep = if i == 0 { ": " } else { ", " };
            write!(f, "{}{}: {}", sep, err.path(), err.message())?;
        }
        Ok(())
    }
}

impl std::error::Error for DocumentValidationError {}

/// Unique index violation reported by the document store
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct DuplicateKeyError {
    /// Driver error code, always [`DUPLICATE_KEY_CODE`]
    pub code: i32,
    /// Driver diagnostic, e.g.
    /// `E11000 duplicate key error collection: app.users index: email_1 dup key: { email: "a@b.com" }`
    pub message: String,
    /// Structured offending key, when the driver supplies one
    pub key_value: Option<Document>,
}

impl DuplicateKeyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: DUPLICATE_KEY_CODE,
            message: message.into(),
            key_value: None,
        }
    }

    pub fn with_key_value(mut self, key_value: Document) -> Self {
        self.key_value = Some(key_value);
        self
    }
}

/// Duplicate-key details carried by a driver error, if it is one
fn duplicate_key(err: &mongodb::error::Error) -> Option<DuplicateKeyError> {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY_CODE => {
            let key_value = write
                .details
                .as_ref()
                .and_then(|details| details.get_document("keyValue").ok())
                .cloned();
            Some(DuplicateKeyError {
                code: write.code,
                message: write.message.clone(),
                key_value,
            })
        }
        ErrorKind::Command(command) if command.code == DUPLICATE_KEY_CODE => {
            Some(DuplicateKeyError::new(command.message.clone()))
        }
        _ => None,
    }
}

// ============================================================================
// Request errors
// ============================================================================

/// Which stage of body extraction failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyParseKind {
    /// Body is not valid JSON
    Syntax,
    /// JSON does not fit the expected shape
    Shape,
    /// Missing `Content-Type: application/json`
    ContentType,
    /// Body could not be read
    Body,
}

impl fmt::Display for BodyParseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax => write!(f, "syntax"),
            Self::Shape => write!(f, "shape"),
            Self::ContentType => write!(f, "content_type"),
            Self::Body => write!(f, "body"),
        }
    }
}

/// Request body could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to parse request body ({kind}): {message}")]
pub struct BodyParseError {
    pub kind: BodyParseKind,
    pub message: String,
}

impl BodyParseError {
    pub fn new(kind: BodyParseKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Non-numeric `min`/`max` bound in a range filter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid range values for field '{field}', must be numeric.")]
pub struct RangeValidationError {
    pub field: String,
}

/// Error raised on purpose by application code, rendered as-is
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{name}: {message}")]
pub struct ApiError {
    pub name: String,
    pub message: String,
    pub status: StatusCode,
    pub path: SourcePath,
}

impl ApiError {
    pub fn new(
        name: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
        path: impl Into<SourcePath>,
    ) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            status,
            path: path.into(),
        }
    }

    /// 400 with the given name
    pub fn bad_request(
        name: impl Into<String>,
        message: impl Into<String>,
        path: impl Into<SourcePath>,
    ) -> Self {
        Self::new(name, message, StatusCode::BAD_REQUEST, path)
    }

    /// 401 "Authorization Error"
    pub fn unauthorized(message: impl Into<String>, path: impl Into<SourcePath>) -> Self {
        Self::new("Authorization Error", message, StatusCode::UNAUTHORIZED, path)
    }

    /// 403 with the given name
    pub fn forbidden(
        name: impl Into<String>,
        message: impl Into<String>,
        path: impl Into<SourcePath>,
    ) -> Self {
        Self::new(name, message, StatusCode::FORBIDDEN, path)
    }

    /// 404 "Not Found Error"
    pub fn not_found(message: impl Into<String>, path: impl Into<SourcePath>) -> Self {
        Self::new("Not Found Error", message, StatusCode::NOT_FOUND, path)
    }

    /// 413 on the request body
    pub fn payload_too_large() -> Self {
        Self::new(
            "Payload Too Large Error",
            "Request body is too large!",
            StatusCode::PAYLOAD_TOO_LARGE,
            "body",
        )
    }

    /// 408 for a request that outlived the configured timeout
    pub fn request_timeout(path: impl Into<SourcePath>) -> Self {
        Self::new(
            "Request Timeout Error",
            "Request took too long to complete!",
            StatusCode::REQUEST_TIMEOUT,
            path,
        )
    }

    /// 500 "Internal Server Error"
    pub fn internal(message: impl Into<String>, path: impl Into<SourcePath>) -> Self {
        Self::new(
            "Internal Server Error",
            message,
            StatusCode::INTERNAL_SERVER_ERROR,
            path,
        )
    }
}

// ============================================================================
// Crate error
// ============================================================================

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure that can reach the HTTP boundary
#[derive(Debug, Error)]
pub enum Error {
    /// Document failed persistence-model validation
    #[error(transparent)]
    Validation(#[from] DocumentValidationError),

    /// Value could not be cast to a field type
    #[error(transparent)]
    Cast(#[from] CastError),

    /// Unique index violation
    #[error(transparent)]
    Duplicate(#[from] DuplicateKeyError),

    /// Request payload failed schema validation
    #[error("Schema validation failed: {0}")]
    Schema(#[from] validator::ValidationErrors),

    /// Request body could not be parsed
    #[error(transparent)]
    BodyParse(#[from] BodyParseError),

    /// Explicit application error
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Invalid range bounds in a query
    #[error(transparent)]
    Range(#[from] RangeValidationError),

    /// Document store failure
    #[error("Database error: {0}")]
    Database(Box<mongodb::error::Error>),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server error
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

impl From<mongodb::error::Error> for Error {
    fn from(err: mongodb::error::Error) -> Self {
        match duplicate_key(&err) {
            Some(duplicate) => Error::Duplicate(duplicate),
            None => Error::Database(Box::new(err)),
        }
    }
}

// ============================================================================
// Response body
// ============================================================================

/// One entry of the `errors` array
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorDetail {
    pub name: String,
    pub path: SourcePath,
    pub message: String,
}

/// Error response body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    /// Always `false`
    pub success: bool,

    /// All source messages joined by ` | `
    pub message: String,

    /// HTTP status code
    pub status: u16,

    pub errors: Vec<ErrorDetail>,

    /// Error chain, only outside production
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorResponse {
    /// Build the body for a normalized error
    pub fn from_normalized(normalized: &NormalizedError, include_stack: bool) -> Self {
        let message = normalized
            .error_source
            .iter()
            .map(|source| source.message.as_str())
            .collect::<Vec<_>>()
            .join(" | ");

        let errors = normalized
            .error_source
            .iter()
            .map(|source| ErrorDetail {
                name: normalized.name.clone(),
                path: source.path.clone(),
                message: source.message.clone(),
            })
            .collect();

        let stack = include_stack.then(|| {
            normalized
                .stack
                .clone()
                .unwrap_or_else(|| STACK_UNAVAILABLE.to_string())
        });

        Self {
            success: false,
            message,
            status: normalized.status_code,
            errors,
            stack,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let normalized = normalize::normalize(&self);

        if normalized.status_code >= 500 {
            tracing::error!(error = %self, "Unhandled error: {}", normalized.name);
        }

        let status = StatusCode::from_u16(normalized.status_code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse::from_normalized(&normalized, false);

        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(normalized);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use mongodb::bson::doc;

    #[test]
    fn test_document_validation_error_display() {
        let err = DocumentValidationError::new()
            .with_field("email", "Path `email` is required.")
            .with_field("first_name", "Path `first_name` is required.");
        assert_eq!(
            err.to_string(),
            "Validation failed: email: Path `email` is required., first_name: Path `first_name` is required."
        );
        assert!(err.cast_error().is_none());
    }

    #[test]
    fn test_nested_cast_error_is_found() {
        let err = DocumentValidationError::new()
            .with_field("email", "Path `email` is required.")
            .with_cast(CastError::object_id("owner", "abc"));
        let cast = err.cast_error().unwrap();
        assert_eq!(cast.path, "owner");
        assert_eq!(cast.value, "abc");
    }

    #[test]
    fn test_range_error_message() {
        let err = RangeValidationError {
            field: "price".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid range values for field 'price', must be numeric."
        );
    }

    #[test]
    fn test_api_error_constructors() {
        let err = ApiError::not_found("No user found with email: a@b.com!", "user");
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.name, "Not Found Error");
        assert_eq!(err.path, SourcePath::Key("user".to_string()));
    }

    #[test]
    fn test_duplicate_key_builder() {
        let err = DuplicateKeyError::new("E11000 duplicate key error")
            .with_key_value(doc! { "email": "a@b.com" });
        assert_eq!(err.code, DUPLICATE_KEY_CODE);
        assert_eq!(err.key_value.unwrap().get_str("email").unwrap(), "a@b.com");
    }

    #[tokio::test]
    async fn test_into_response_renders_envelope() {
        let err = Error::Api(ApiError::unauthorized("Bad or Invalid token!", "auth"));
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.extensions().get::<NormalizedError>().is_some());

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert!(!body.success);
        assert_eq!(body.status, 401);
        assert_eq!(body.message, "Bad or Invalid token!");
        assert_eq!(body.errors.len(), 1);
        assert_eq!(body.errors[0].name, "Authorization Error");
        assert!(body.stack.is_none());
    }

    #[test]
    fn test_error_response_joins_messages() {
        let normalized = NormalizedError {
            status_code: 400,
            name: "Validation Error".to_string(),
            error_source: vec![
                normalize::ErrorSource::new("email", "Email is required"),
                normalize::ErrorSource::new("password", "Password is required"),
            ],
            stack: None,
        };
        let body = ErrorResponse::from_normalized(&normalized, true);
        assert_eq!(body.message, "Email is required | Password is required");
        assert_eq!(body.stack.as_deref(), Some(STACK_UNAVAILABLE));
        assert!(body.errors.iter().all(|e| e.name == "Validation Error"));
    }
}
