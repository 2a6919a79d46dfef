//! Role-based route protection
//!
//! ```rust,ignore
//! use axum::{middleware, routing::get, Router};
//! use user_service::auth::{authorize, RoleGuard};
//! use user_service::models::ADMIN_ROLES;
//!
//! let admin = Router::new()
//!     .route("/", get(list_users))
//!     .route_layer(middleware::from_fn_with_state(
//!         RoleGuard::new(state.clone(), ADMIN_ROLES),
//!         authorize,
//!     ));
//! ```

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};

use super::jwt::{Claims, MISSING_TOKEN};
use crate::error::{ApiError, Error, Result};
use crate::models::Role;
use crate::services::users::validate_user;
use crate::state::AppState;

/// Middleware state: shared application state plus the roles a route accepts
#[derive(Clone)]
pub struct RoleGuard {
    state: AppState,
    roles: &'static [Role],
}

impl RoleGuard {
    /// Accept any of `roles`; an empty list accepts every authenticated user
    pub fn new(state: AppState, roles: &'static [Role]) -> Self {
        Self { state, roles }
    }

    fn allows(&self, role: Role) -> bool {
        self.roles.is_empty() || self.roles.contains(&role)
    }
}

/// Second whitespace-separated part of the `Authorization` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split_whitespace().nth(1))
}

/// Verify the access token, reload the user and check their current role
///
/// The role is read from the stored user, not from the token. On success
/// the token [`Claims`] are available to handlers as an extractor.
pub async fn authorize(
    State(guard): State<RoleGuard>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let claims = guard
        .state
        .tokens()
        .verify_access(bearer_token(request.headers()))?;

    let user = validate_user(guard.state.users(), Some(&claims.email)).await?;

    if !guard.allows(user.role) {
        tracing::info!(
            email = %user.email,
            role = %user.role,
            path = %request.uri().path(),
            "Role not permitted"
        );
        return Err(ApiError::unauthorized("You're not authorized!", "auth").into());
    }

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for Claims
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized(MISSING_TOKEN, "auth").into())
    }
}
