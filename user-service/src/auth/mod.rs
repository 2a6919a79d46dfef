//! Authentication: password hashing, tokens and route protection
//!
//! # Example
//!
//! ```rust,ignore
//! use user_service::auth::{PasswordHasher, TokenIssuer};
//! use user_service::models::Role;
//!
//! let hasher = PasswordHasher::new(&config.password);
//! let hash = hasher.hash("my_secure_password").await?;
//!
//! let tokens = TokenIssuer::new(&config.jwt);
//! let access = tokens.issue_access("ann@example.com", Role::User)?;
//! let claims = tokens.verify_access(Some(&access))?;
//! ```

// Refresh-token cookie
pub mod cookies;

// Role-based route protection
pub mod guard;

// Access and refresh tokens
pub mod jwt;

// Password hashing (bcrypt)
pub mod password;

pub use cookies::{cookie_value, refresh_cookie, REFRESH_COOKIE};
pub use guard::{authorize, bearer_token, RoleGuard};
pub use jwt::{Claims, TokenIssuer};
pub use password::PasswordHasher;
