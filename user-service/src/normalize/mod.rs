//! Error normalization
//!
//! Every error reaching the HTTP boundary is reduced to one
//! [`NormalizedError`] in two total steps: [`classify`] picks exactly one
//! [`ErrorClass`] and [`render`] turns that class into status, name and
//! error sources. Neither step performs I/O or can fail.

mod duplicate;
mod schema;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{BodyParseKind, Error};

pub use duplicate::{singular_document_name, DuplicateInfo};
pub use schema::flatten_schema_errors;

/// Location of an error cause: a field name or a list index
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourcePath {
    Index(usize),
    Key(String),
}

impl fmt::Display for SourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{}", index),
            Self::Key(key) => write!(f, "{}", key),
        }
    }
}

impl From<&str> for SourcePath {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<String> for SourcePath {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<usize> for SourcePath {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// One localized error cause
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSource {
    pub path: SourcePath,
    pub message: String,
}

impl ErrorSource {
    pub fn new(path: impl Into<SourcePath>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Canonical error record produced once per failed request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedError {
    pub status_code: u16,
    pub name: String,
    pub error_source: Vec<ErrorSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// The closed set of error kinds the boundary knows how to render
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorClass {
    /// Persistence-model validation, one source per field
    Validation(Vec<ErrorSource>),
    /// Direct cast failure, or one nested in a validation error
    Cast { path: String, value: String },
    /// Unique index violation
    Duplicate(DuplicateInfo),
    /// Request schema validation, one source per issue
    Schema(Vec<ErrorSource>),
    /// Request body could not be parsed
    BodyParse { message: String },
    /// Explicit application error
    Application {
        status: u16,
        name: String,
        source: ErrorSource,
    },
    /// Anything else
    Unknown,
}

/// Pick the error class for `err`
pub fn classify(err: &Error) -> ErrorClass {
    match err {
        Error::Validation(validation) => match validation.cast_error() {
            Some(cast) => ErrorClass::Cast {
                path: cast.path.clone(),
                value: cast.value.clone(),
            },
            None => ErrorClass::Validation(
                validation
                    .errors
                    .iter()
                    .map(|field| ErrorSource::new(field.path(), field.message()))
                    .collect(),
            ),
        },
        Error::Cast(cast) => ErrorClass::Cast {
            path: cast.path.clone(),
            value: cast.value.clone(),
        },
        Error::Duplicate(duplicate) => ErrorClass::Duplicate(DuplicateInfo::extract(duplicate)),
        Error::Schema(errors) => ErrorClass::Schema(flatten_schema_errors(errors)),
        Error::BodyParse(parse) if parse.kind == BodyParseKind::Shape => {
            ErrorClass::Schema(vec![ErrorSource::new("body", parse.message.clone())])
        }
        Error::BodyParse(parse) => ErrorClass::BodyParse {
            message: parse.message.clone(),
        },
        Error::Api(api) => ErrorClass::Application {
            status: api.status.as_u16(),
            name: api.name.clone(),
            source: ErrorSource::new(api.path.clone(), api.message.clone()),
        },
        Error::Range(range) => ErrorClass::Application {
            status: StatusCode::BAD_REQUEST.as_u16(),
            name: "Range Validation Error".to_string(),
            source: ErrorSource::new(range.field.as_str(), range.to_string()),
        },
        Error::Database(_) | Error::Config(_) | Error::Io(_) | Error::Internal(_) => {
            ErrorClass::Unknown
        }
    }
}

/// Render an error class into the canonical record (without stack)
pub fn render(class: ErrorClass) -> NormalizedError {
    let (status_code, name, error_source) = match class {
        ErrorClass::Validation(sources) => (400, "Validation Error".to_string(), sources),
        ErrorClass::Cast { path, value } => (
            400,
            "Invalid identifier".to_string(),
            vec![ErrorSource::new(path, format!("Invalid ObjectId “{}”!", value))],
        ),
        ErrorClass::Duplicate(info) => {
            let message = info.message();
            (
                409,
                "Duplicate Error".to_string(),
                vec![ErrorSource::new(info.field, message)],
            )
        }
        ErrorClass::Schema(sources) => (400, "Validation Error".to_string(), sources),
        ErrorClass::BodyParse { message } => (
            400,
            "Invalid JSON Payload".to_string(),
            vec![ErrorSource::new("body", message)],
        ),
        ErrorClass::Application {
            status,
            name,
            source,
        } => (status.max(400), name, vec![source]),
        ErrorClass::Unknown => (
            500,
            "Internal Server Error".to_string(),
            vec![ErrorSource::new("server", "Something went wrong!")],
        ),
    };

    NormalizedError {
        status_code,
        name,
        error_source,
        stack: None,
    }
}

/// Classify and render `err`, attaching its source chain as the stack
pub fn normalize(err: &Error) -> NormalizedError {
    let mut normalized = render(classify(err));
    normalized.stack = Some(error_chain(err));
    normalized
}

/// `Error: outer` followed by one `caused by:` line per source
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut chain = format!("Error: {}", err);
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push_str(&format!("\n    caused by: {}", cause));
        source = cause.source();
    }
    chain
}
