//! # user-service
//!
//! REST API for user registration, authentication and listing, backed by
//! MongoDB.
//!
//! ## Features
//!
//! - **Auth**: bcrypt password hashing, JWT access tokens, refresh tokens in
//!   an HttpOnly cookie, role-based route protection
//! - **Listing queries**: search, filters, numeric ranges, sorting,
//!   pagination and field exclusion compiled from the query string
//! - **Error normalization**: every failure renders as the same
//!   `{ success: false, message, status, errors }` envelope
//! - **Middleware stack**: request IDs, tracing, CORS allow-list,
//!   compression, timeouts, body limits, panic recovery
//! - **Graceful shutdown**: SIGTERM and SIGINT
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use user_service::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     let users = MongoUserRepository::connect(&config.database).await?;
//!     users.ensure_indexes().await?;
//!
//!     let state = AppState::new(config.clone(), Arc::new(users));
//!     Server::new(config).serve(router(state)).await
//! }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod models;
pub mod normalize;
pub mod observability;
pub mod query;
pub mod repository;
pub mod responses;
pub mod routes;
pub mod server;
pub mod services;
pub mod state;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::auth::{Claims, PasswordHasher, RoleGuard, TokenIssuer};
    pub use crate::config::Config;
    pub use crate::error::{ApiError, Error, Result};
    pub use crate::handlers::ValidJson;
    pub use crate::health::{health, readiness};
    pub use crate::models::{Role, User, UserView, ADMIN_ROLES, USER_ROLES};
    pub use crate::normalize::{normalize, NormalizedError};
    pub use crate::observability::init_tracing;
    pub use crate::query::{Query, QueryBuilder, QueryParams};
    pub use crate::repository::{InMemoryUserRepository, MongoUserRepository, UserRepository};
    pub use crate::responses::Envelope;
    pub use crate::routes::router;
    pub use crate::server::Server;
    pub use crate::state::AppState;

    pub use axum::{
        extract::State,
        routing::{get, post},
        Json, Router,
    };
}
