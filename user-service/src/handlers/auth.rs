//! Registration, login, token refresh and profile endpoints

use std::borrow::Cow;

use axum::{extract::State, http::HeaderMap};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::extract::{trimmed, ValidJson};
use crate::auth::{cookie_value, refresh_cookie, Claims, REFRESH_COOKIE};
use crate::error::Result;
use crate::models::{NewUser, UserView};
use crate::responses::Envelope;
use crate::services::auth::{self as service, AccessToken, LoginCredentials, RegisteredUser};
use crate::services::users::current_user;
use crate::state::AppState;

const PASSWORD_MIN_CHARS: usize = 6;
const PASSWORD_MAX_CHARS: usize = 56;

/// `POST /api/auth/login` body
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(
        required(message = "Please provide a valid email address!"),
        email(message = "Please provide a valid email address!")
    )]
    pub email: Option<String>,

    #[serde(default, deserialize_with = "trimmed")]
    #[validate(
        required(message = "Password is required!"),
        custom(function = "password_length")
    )]
    pub password: Option<String>,
}

impl From<LoginRequest> for LoginCredentials {
    fn from(request: LoginRequest) -> Self {
        Self {
            email: request.email.unwrap_or_default(),
            password: request.password.unwrap_or_default(),
        }
    }
}

/// `POST /api/auth/register` body
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct RegisterRequest {
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(
        required(message = "Please provide a valid email address!"),
        email(message = "Please provide a valid email address!")
    )]
    pub email: Option<String>,

    #[serde(default, deserialize_with = "trimmed")]
    #[validate(
        required(message = "Password is required!"),
        custom(function = "password_length")
    )]
    pub password: Option<String>,

    #[serde(default, deserialize_with = "trimmed")]
    #[validate(
        required(message = "First name is required!"),
        length(min = 1, message = "First name cannot be empty!")
    )]
    pub first_name: Option<String>,

    #[serde(default, deserialize_with = "trimmed")]
    #[validate(
        required(message = "Last name is required!"),
        length(min = 1, message = "Last name cannot be empty!")
    )]
    pub last_name: Option<String>,

    #[serde(default, deserialize_with = "trimmed")]
    pub phone_number: Option<String>,

    #[serde(default, deserialize_with = "trimmed")]
    pub profession: Option<String>,

    #[serde(default, deserialize_with = "trimmed")]
    pub profile_image: Option<String>,
}

impl From<RegisterRequest> for NewUser {
    fn from(request: RegisterRequest) -> Self {
        Self {
            email: request.email.unwrap_or_default(),
            first_name: request.first_name.unwrap_or_default(),
            last_name: request.last_name.unwrap_or_default(),
            password: request.password.unwrap_or_default(),
            phone_number: request.phone_number,
            profession: request.profession,
            profile_image: request.profile_image,
        }
    }
}

fn password_length(password: &str) -> std::result::Result<(), ValidationError> {
    let chars = password.chars().count();
    let message = if chars < PASSWORD_MIN_CHARS {
        "Password must be at least 6 characters long!"
    } else if chars > PASSWORD_MAX_CHARS {
        "Password cannot be more than 56 characters!"
    } else {
        return Ok(());
    };
    Err(ValidationError::new("length").with_message(Cow::Borrowed(message)))
}

/// Login response payload; the refresh token travels in a cookie
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub user: UserView,
    pub token: String,
}

pub async fn register(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<RegisterRequest>,
) -> Result<Envelope<RegisteredUser>> {
    let registered = service::register_user(&state, request.into()).await?;
    Ok(Envelope::created("User registered successfully!", registered))
}

pub async fn login(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<LoginRequest>,
) -> Result<Envelope<LoginResponse>> {
    let outcome = service::login_user(&state, request.into()).await?;
    let cookie = refresh_cookie(&outcome.refresh_token, state.is_production())?;

    Ok(Envelope::ok(
        "Login successful!",
        LoginResponse {
            user: outcome.user,
            token: outcome.access_token,
        },
    )
    .with_cookie(cookie))
}

pub async fn refresh_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Envelope<AccessToken>> {
    let cookie = cookie_value(&headers, REFRESH_COOKIE);
    let token = service::refresh_token(&state, cookie.as_deref()).await?;
    Ok(Envelope::ok("Successfully retrieved new access token!", token))
}

/// Profile of the caller identified by the access token
pub async fn profile(State(state): State<AppState>, claims: Claims) -> Result<Envelope<UserView>> {
    let user = current_user(&state, Some(&claims.email)).await?;
    Ok(Envelope::ok("User profile retrieved successfully!", user))
}
