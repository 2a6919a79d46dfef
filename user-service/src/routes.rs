//! Route table

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};

use crate::auth::{authorize, RoleGuard};
use crate::handlers::{self, auth, users};
use crate::health;
use crate::middleware::{error_boundary, StackTraces};
use crate::models::{ADMIN_ROLES, USER_ROLES};
use crate::state::AppState;

/// Complete application router, without the transport layers added by [`crate::server::Server`]
pub fn router(state: AppState) -> Router {
    let stack_traces = StackTraces(!state.is_production());

    Router::new()
        .route("/", get(handlers::server_status))
        .route("/api", get(handlers::server_status))
        .route("/health", get(health::health))
        .route("/ready", get(health::readiness))
        .nest("/api/auth", auth_routes(&state))
        .nest("/api/users", user_routes(&state))
        .fallback(handlers::not_found)
        .method_not_allowed_fallback(handlers::method_not_allowed)
        .layer(from_fn_with_state(stack_traces, error_boundary))
        .with_state(state)
}

fn auth_routes(state: &AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/profile", get(auth::profile))
        .route_layer(from_fn_with_state(
            RoleGuard::new(state.clone(), USER_ROLES),
            authorize,
        ));

    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh-token", post(auth::refresh_token))
        .merge(protected)
}

fn user_routes(state: &AppState) -> Router<AppState> {
    let admin = Router::new().route("/", get(users::list)).route_layer(from_fn_with_state(
        RoleGuard::new(state.clone(), ADMIN_ROLES),
        authorize,
    ));

    let any_user = Router::new()
        .route("/profile", get(users::profile))
        .route_layer(from_fn_with_state(
            RoleGuard::new(state.clone(), USER_ROLES),
            authorize,
        ));

    admin.merge(any_user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::PasswordHasher;
    use crate::models::{NewUser, Role, User};
    use crate::repository::{InMemoryUserRepository, UserRepository};
    use crate::state::testing;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn send(app: &Router, request: Request<Body>) -> Response {
        app.clone().oneshot(request).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_with_token(uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap()
    }

    async fn seed(repo: &InMemoryUserRepository, first_name: &str, email: &str, role: Role) {
        seed_user(repo, first_name, email, role, true).await;
    }

    async fn seed_user(
        repo: &InMemoryUserRepository,
        first_name: &str,
        email: &str,
        role: Role,
        is_active: bool,
    ) {
        let hash = PasswordHasher::new(&testing::config().password)
            .hash("secret1")
            .await
            .unwrap();
        let mut user = User::create(
            NewUser {
                email: email.into(),
                first_name: first_name.into(),
                last_name: "Doe".into(),
                password: "secret1".into(),
                ..Default::default()
            },
            first_name.to_lowercase(),
            hash,
        );
        user.role = role;
        user.is_active = is_active;
        repo.insert(user).await.unwrap();
    }

    async fn login(app: &Router, email: &str) -> Response {
        send(
            app,
            post_json("/api/auth/login", json!({ "email": email, "password": "secret1" })),
        )
        .await
    }

    async fn access_token(app: &Router, email: &str) -> String {
        let body = json_body(login(app, email).await).await;
        body["data"]["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_status_routes() {
        let (state, _) = testing::state();
        let app = router(state);

        for uri in ["/", "/api"] {
            let response = send(&app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await;
            assert_eq!(response.status(), StatusCode::OK);
            let body = json_body(response).await;
            assert_eq!(body["success"], true);
            assert_eq!(body["data"], Value::Null);
        }

        let response = send(&app, Request::builder().uri("/ready").body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let (state, _) = testing::state();
        let app = router(state);

        let response = send(
            &app,
            Request::builder()
                .method(Method::DELETE)
                .uri("/api/nothing")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = json_body(response).await;
        assert_eq!(body["message"], "Requested End-Point “DELETE: /api/nothing” Not Found!");
        assert_eq!(body["errors"][0]["name"], "Not Found Error");
        assert_eq!(body["errors"][0]["path"], "/api/nothing");
        assert!(body["stack"].is_string());
    }

    #[tokio::test]
    async fn test_wrong_method_on_known_route() {
        let (state, _) = testing::state();
        let app = router(state);

        let response = send(
            &app,
            Request::builder()
                .uri("/api/auth/login")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );

        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["status"], 405);
        assert_eq!(body["message"], "Method “GET” is not allowed on “/api/auth/login”!");
        assert_eq!(body["errors"][0]["name"], "Method Not Allowed Error");
        assert_eq!(body["errors"][0]["path"], "/api/auth/login");
    }

    #[tokio::test]
    async fn test_register_then_duplicate() {
        let (state, _) = testing::state();
        let app = router(state);
        let payload = json!({
            "email": "ann@example.com",
            "password": "secret1",
            "first_name": "Ann Marie",
            "last_name": "Lee"
        });

        let response = send(&app, post_json("/api/auth/register", payload.clone())).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_body(response).await;
        assert_eq!(body["message"], "User registered successfully!");
        assert_eq!(body["data"]["user_name"], "ann_marie");
        assert_eq!(body["data"]["email"], "ann@example.com");

        let response = send(&app, post_json("/api/auth/register", payload)).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = json_body(response).await;
        assert_eq!(body["errors"][0]["name"], "Duplicate Error");
        assert_eq!(body["message"], "User already exists with email: ann@example.com");
    }

    #[tokio::test]
    async fn test_register_schema_errors() {
        let (state, _) = testing::state();
        let app = router(state);

        let response = send(
            &app,
            post_json("/api/auth/register", json!({ "email": "bad", "password": "123" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json_body(response).await;
        let paths: Vec<&str> = body["errors"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["path"].as_str().unwrap())
            .collect();
        assert_eq!(paths, ["email", "first_name", "last_name", "password"]);
        assert_eq!(body["errors"][0]["name"], "Validation Error");
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let (state, _) = testing::state();
        let app = router(state);

        let response = send(
            &app,
            Request::builder()
                .method(Method::POST)
                .uri("/api/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{\"email\":"))
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["errors"][0]["name"], "Invalid JSON Payload");
        assert_eq!(body["errors"][0]["path"], "body");
    }

    #[tokio::test]
    async fn test_login_sets_refresh_cookie_and_refresh_works() {
        let (state, repo) = testing::state();
        seed(&repo, "Ann", "ann@example.com", Role::User).await;
        let app = router(state);

        let response = login(&app, "ann@example.com").await;
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(cookie.starts_with("refresh_token="));
        assert!(cookie.contains("HttpOnly"));
        assert!(!cookie.contains("Secure"));

        let body = json_body(response).await;
        assert_eq!(body["message"], "Login successful!");
        assert!(body["data"]["user"].get("password").is_none());

        let pair = cookie.split(';').next().unwrap().to_string();
        let response = send(
            &app,
            Request::builder()
                .method(Method::POST)
                .uri("/api/auth/refresh-token")
                .header(header::COOKIE, pair)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert!(body["data"]["token"].is_string());
    }

    #[tokio::test]
    async fn test_refresh_without_cookie() {
        let (state, _) = testing::state();
        let app = router(state);

        let response = send(
            &app,
            Request::builder()
                .method(Method::POST)
                .uri("/api/auth/refresh-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["message"], "Bad or Invalid token!");
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let (state, repo) = testing::state();
        seed(&repo, "Ann", "ann@example.com", Role::User).await;
        let app = router(state);

        let response = send(
            &app,
            post_json(
                "/api/auth/login",
                json!({ "email": "ann@example.com", "password": "not-the-one" }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["message"], "Invalid credentials!");
    }

    #[tokio::test]
    async fn test_profile_requires_token() {
        let (state, _) = testing::state();
        let app = router(state);

        let response = send(
            &app,
            Request::builder()
                .uri("/api/auth/profile")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["message"], "Bad or Invalid token!");

        let response = send(&app, get_with_token("/api/users/profile", "garbage")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            json_body(response).await["message"],
            "Your token is invalid or expired!"
        );
    }

    #[tokio::test]
    async fn test_profile_with_token() {
        let (state, repo) = testing::state();
        seed(&repo, "Ann", "ann@example.com", Role::User).await;
        let app = router(state);
        let token = access_token(&app, "ann@example.com").await;

        for uri in ["/api/auth/profile", "/api/users/profile"] {
            let response = send(&app, get_with_token(uri, &token)).await;
            assert_eq!(response.status(), StatusCode::OK);
            let body = json_body(response).await;
            assert_eq!(body["data"]["email"], "ann@example.com");
            assert!(body["data"].get("password").is_none());
        }
    }

    #[tokio::test]
    async fn test_user_listing_is_admin_only() {
        let (state, repo) = testing::state();
        seed(&repo, "Ann", "ann@example.com", Role::User).await;
        seed(&repo, "Root", "root@example.com", Role::Admin).await;
        let app = router(state);

        let user_token = access_token(&app, "ann@example.com").await;
        let response = send(&app, get_with_token("/api/users", &user_token)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["message"], "You're not authorized!");

        let admin_token = access_token(&app, "root@example.com").await;
        let response = send(&app, get_with_token("/api/users", &admin_token)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        let users = body["data"].as_array().unwrap();
        assert_eq!(users.len(), 2);
        assert!(users.iter().all(|user| user.get("password").is_none()));
    }

    #[tokio::test]
    async fn test_user_listing_query() {
        let (state, repo) = testing::state();
        seed(&repo, "Root", "root@example.com", Role::Admin).await;
        seed(&repo, "Ann", "ann@example.com", Role::User).await;
        seed(&repo, "Bob", "bob@example.com", Role::User).await;
        let app = router(state);
        let token = access_token(&app, "root@example.com").await;

        let response = send(&app, get_with_token("/api/users?search=ann", &token)).await;
        let body = json_body(response).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"][0]["first_name"], "Ann");

        let response = send(
            &app,
            get_with_token("/api/users?role=user&sort_by=first_name&sort_order=asc&exclude=email", &token),
        )
        .await;
        let body = json_body(response).await;
        let names: Vec<&str> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|user| user["first_name"].as_str().unwrap())
            .collect();
        assert_eq!(names, ["Ann", "Bob"]);
        assert!(body["data"][0].get("email").is_none());

        let response = send(&app, get_with_token("/api/users?page=2&limit=2", &token)).await;
        let body = json_body(response).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let response = send(
            &app,
            get_with_token("/api/users?password=secret1&%24where=true&sort_by=password", &token),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 3);

        let response = send(&app, get_with_token("/api/users?ids=not-an-id", &token)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["errors"][0]["name"], "Invalid identifier");
        assert_eq!(body["message"], "Invalid ObjectId “not-an-id”!");
    }

    #[tokio::test]
    async fn test_inactive_user_is_rejected() {
        let (state, repo) = testing::state();
        seed_user(&repo, "Ann", "ann@example.com", Role::User, false).await;
        let token = state
            .tokens()
            .issue_access("ann@example.com", Role::User)
            .unwrap();
        let app = router(state);

        let response = send(&app, get_with_token("/api/auth/profile", &token)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            json_body(response).await["message"],
            "User with email ann@example.com is not active!"
        );
    }
}
