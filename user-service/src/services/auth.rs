//! Registration, login and token refresh

use serde::{Deserialize, Serialize};

use super::users::validate_user;
use crate::error::{ApiError, Result};
use crate::models::{user_name_candidate, NewUser, User, UserView};
use crate::state::AppState;

/// Email and password submitted at login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

/// Identity of a freshly registered user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredUser {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_name: String,
    pub email: String,
}

/// Result of a successful login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserView,
}

/// A new access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub token: String,
}

/// Store a new user with a generated user name and a hashed password
pub async fn register_user(state: &AppState, new: NewUser) -> Result<RegisteredUser> {
    new.validate()?;

    let base = new.user_name_base();
    let mut attempt = 0;
    let user_name = loop {
        let candidate = user_name_candidate(&base, attempt);
        if !state.users().user_name_exists(&candidate).await? {
            break candidate;
        }
        attempt += 1;
    };

    let password_hash = state.passwords().hash(&new.password).await?;
    let user = state
        .users()
        .insert(User::create(new, user_name, password_hash))
        .await?;

    tracing::info!(user_name = %user.user_name, "User registered");

    Ok(RegisteredUser {
        id: user.id.to_hex(),
        user_name: user.user_name,
        email: user.email,
    })
}

/// Check credentials and issue an access/refresh token pair
pub async fn login_user(state: &AppState, credentials: LoginCredentials) -> Result<LoginOutcome> {
    let user = validate_user(state.users(), Some(&credentials.email)).await?;

    let matched = state
        .passwords()
        .verify(&credentials.password, &user.password)
        .await?;
    if !matched {
        tracing::info!(email = %user.email, "Login rejected");
        return Err(ApiError::unauthorized("Invalid credentials!", "auth").into());
    }

    let tokens = state.tokens();
    Ok(LoginOutcome {
        access_token: tokens.issue_access(&user.email, user.role)?,
        refresh_token: tokens.issue_refresh(&user.email, user.role)?,
        user: UserView::from(&user),
    })
}

/// Exchange a refresh token for a new access token
pub async fn refresh_token(state: &AppState, token: Option<&str>) -> Result<AccessToken> {
    let claims = state.tokens().verify_refresh(token)?;
    let user = validate_user(state.users(), Some(&claims.email)).await?;

    Ok(AccessToken {
        token: state.tokens().issue_access(&user.email, user.role)?,
    })
}
