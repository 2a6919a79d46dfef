//! Request body extraction with schema validation

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use validator::Validate;

use crate::error::{ApiError, BodyParseError, BodyParseKind, Error};

/// JSON body that is parsed and then checked against its `Validate` rules
///
/// Parse failures become [`Error::BodyParse`], rule failures [`Error::Schema`].
/// A body over the configured size limit is a 413.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(body_parse_error)?;
        value.validate()?;
        Ok(Self(value))
    }
}

fn body_parse_error(rejection: JsonRejection) -> Error {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::payload_too_large().into();
    }
    let kind = match &rejection {
        JsonRejection::JsonSyntaxError(_) => BodyParseKind::Syntax,
        JsonRejection::JsonDataError(_) => BodyParseKind::Shape,
        JsonRejection::MissingJsonContentType(_) => BodyParseKind::ContentType,
        _ => BodyParseKind::Body,
    };
    tracing::debug!(%kind, "Rejected request body");
    BodyParseError::new(kind, rejection.body_text()).into()
}

/// Deserialize an optional string with surrounding whitespace removed
pub(crate) fn trimmed<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.map(|s| s.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        extract::DefaultBodyLimit,
        http::header,
        routing::post,
        Router,
    };
    use tower::ServiceExt;

    #[derive(Debug, Deserialize, Validate)]
    struct Greeting {
        #[serde(default, deserialize_with = "trimmed")]
        #[validate(required(message = "Name is required!"), length(min = 2, message = "Too short!"))]
        name: Option<String>,
    }

    fn request(content_type: Option<&str>, body: &'static str) -> Request {
        let mut builder = Request::builder().method("POST").uri("/");
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        builder.body(Body::from(body)).unwrap()
    }

    async fn extract(content_type: Option<&str>, body: &'static str) -> Result<ValidJson<Greeting>, Error> {
        ValidJson::<Greeting>::from_request(request(content_type, body), &()).await
    }

    #[tokio::test]
    async fn test_valid_body_is_trimmed() {
        let ValidJson(greeting) = extract(Some("application/json"), r#"{"name":"  Ann "}"#)
            .await
            .unwrap();
        assert_eq!(greeting.name.as_deref(), Some("Ann"));
    }

    #[tokio::test]
    async fn test_malformed_json_is_body_parse_error() {
        let err = extract(Some("application/json"), r#"{"name":"#).await.unwrap_err();
        match err {
            Error::BodyParse(parse) => assert_eq!(parse.kind, BodyParseKind::Syntax),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_content_type() {
        let err = extract(None, r#"{"name":"Ann"}"#).await.unwrap_err();
        match err {
            Error::BodyParse(parse) => assert_eq!(parse.kind, BodyParseKind::ContentType),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_wrong_field_type_is_shape_error() {
        let err = extract(Some("application/json"), r#"{"name":5}"#).await.unwrap_err();
        match err {
            Error::BodyParse(parse) => assert_eq!(parse.kind, BodyParseKind::Shape),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_body_over_limit_is_payload_too_large() {
        let app = Router::new()
            .route("/", post(|ValidJson(_): ValidJson<Greeting>| async { "ok" }))
            .layer(DefaultBodyLimit::max(4));

        let response = app
            .oneshot(request(Some("application/json"), r#"{"name":"Annabelle"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["errors"][0]["name"], "Payload Too Large Error");
        assert_eq!(body["errors"][0]["path"], "body");
    }

    #[tokio::test]
    async fn test_rule_failures_are_schema_errors() {
        let err = extract(Some("application/json"), r#"{}"#).await.unwrap_err();
        assert!(matches!(err, Error::Schema(_)));

        let err = extract(Some("application/json"), r#"{"name":" A "}"#).await.unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }
}
