//! HTTP server with graceful shutdown

use axum::{middleware::from_fn, Router};
use http::{header, HeaderValue, Method, StatusCode};
use regex::Regex;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

use crate::{
    config::Config,
    error::{Error, Result},
    middleware::{
        panic_response, request_id_header, request_id_layer, request_id_propagation_layer,
        sensitive_headers_layer, transport_errors,
    },
};

/// Server instance
pub struct Server {
    config: Config,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Wrap `app` in the transport layers
    ///
    /// Layers are added innermost first: panic recovery sits closest to the
    /// handlers and CORS sees the request before anything else. Bare 408 and
    /// 413 responses from the timeout and body limit get the error body.
    pub fn layered(&self, app: Router) -> Result<Router> {
        let middleware = &self.config.middleware;
        let request_id = request_id_header(&middleware.request_id_header);
        let cors = self.build_cors_layer()?;

        let mut app = app;
        if middleware.catch_panic {
            app = app.layer(CatchPanicLayer::custom(panic_response));
        }

        let app = app
            .layer(request_id_propagation_layer(request_id.clone()))
            .layer(request_id_layer(request_id))
            .layer(sensitive_headers_layer())
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().include_headers(true))
                    .on_response(DefaultOnResponse::new().include_headers(true)),
            )
            .layer(RequestBodyLimitLayer::new(middleware.body_limit_bytes()))
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                self.config.service.timeout(),
            ))
            .layer(from_fn(transport_errors));

        let app = if middleware.compression {
            app.layer(CompressionLayer::new())
        } else {
            app
        };

        Ok(app.layer(cors))
    }

    /// Run the server with the given router
    pub async fn serve(self, app: Router) -> Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.service.port));

        tracing::info!("Starting {} on {}", self.config.service.name, addr);
        self.log_middleware_config();

        let app = self.layered(app)?;
        let listener = TcpListener::bind(&addr).await?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");

        Ok(())
    }

    fn log_middleware_config(&self) {
        let middleware = &self.config.middleware;
        tracing::info!("Middleware configuration:");
        tracing::info!("  - Panic recovery: {}", middleware.catch_panic);
        tracing::info!("  - Request ID header: {}", middleware.request_id_header);
        tracing::info!("  - Request body limit: {} MB", middleware.body_limit_mb);
        tracing::info!("  - Compression: {}", middleware.compression);
        if middleware.cors_allowed_origins.is_empty() {
            tracing::info!("  - CORS: permissive");
        } else {
            tracing::info!(
                "  - CORS origins: {}",
                middleware.cors_allowed_origins.join(", ")
            );
        }
        tracing::info!(
            "  - Request timeout: {} seconds",
            self.config.service.timeout_secs
        );
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Credentialed CORS for origins matching any configured pattern
    fn build_cors_layer(&self) -> Result<CorsLayer> {
        let patterns = &self.config.middleware.cors_allowed_origins;
        if patterns.is_empty() {
            tracing::debug!("Enabling permissive CORS");
            return Ok(CorsLayer::permissive());
        }

        let allowed = patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|err| {
                    Error::Internal(format!("invalid CORS origin pattern {:?}: {}", pattern, err))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(CorsLayer::new()
            .allow_origin(AllowOrigin::predicate(
                move |origin: &HeaderValue, _parts| origin_allowed(&allowed, origin),
            ))
            .allow_credentials(true)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT]))
    }
}

fn origin_allowed(patterns: &[Regex], origin: &HeaderValue) -> bool {
    origin
        .to_str()
        .map(|origin| patterns.iter().any(|pattern| pattern.is_match(origin)))
        .unwrap_or(false)
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl+C), starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }

    tracing::info!("Shutdown signal received, draining requests...");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::Request,
        routing::{get, post},
    };
    use tower::ServiceExt;

    async fn explode() -> &'static str {
        panic!("boom")
    }

    fn app(config: Config) -> Router {
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .route("/panic", get(explode))
            .route("/echo", post(|body: String| async move { body }));
        Server::new(config).layered(app).unwrap()
    }

    fn from_origin(uri: &str, origin: &'static str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::ORIGIN, origin)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_server_creation() {
        let config = Config::default();
        let server = Server::new(config.clone());
        assert_eq!(server.config().service.port, config.service.port);
    }

    #[test]
    fn test_origin_patterns() {
        let patterns = vec![Regex::new(r"^http://localhost:\d+$").unwrap()];
        assert!(origin_allowed(&patterns, &HeaderValue::from_static("http://localhost:3000")));
        assert!(!origin_allowed(&patterns, &HeaderValue::from_static("https://evil.example")));
    }

    #[test]
    fn test_invalid_origin_pattern() {
        let mut config = Config::default();
        config.middleware.cors_allowed_origins = vec!["(".into()];
        assert!(Server::new(config).layered(Router::new()).is_err());
    }

    #[tokio::test]
    async fn test_cors_allows_listed_origin_with_credentials() {
        let response = app(Config::default())
            .oneshot(from_origin("/", "http://localhost:5173"))
            .await
            .unwrap();
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://localhost:5173");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    }

    #[tokio::test]
    async fn test_cors_ignores_unlisted_origin() {
        let response = app(Config::default())
            .oneshot(from_origin("/", "https://evil.example"))
            .await
            .unwrap();
        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }

    #[tokio::test]
    async fn test_request_id_is_returned() {
        let response = app(Config::default())
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let id = response.headers()["x-request-id"].to_str().unwrap();
        assert!(id.starts_with("req_"));
    }

    #[tokio::test]
    async fn test_oversized_body_gets_error_body() {
        let mut config = Config::default();
        config.middleware.body_limit_mb = 1;
        let size = 2 * 1024 * 1024;

        let response = app(config)
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/echo")
                    .header(header::CONTENT_LENGTH, size)
                    .body(Body::from(vec![b'a'; size]))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["errors"][0]["name"], "Payload Too Large Error");
    }

    #[tokio::test]
    async fn test_panic_becomes_500() {
        let response = app(Config::default())
            .oneshot(Request::builder().uri("/panic").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
