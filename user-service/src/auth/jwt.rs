//! JWT access and refresh tokens
//!
//! Both kinds are HS256 tokens carrying `{ email, role }`; they differ only
//! in secret and lifetime.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::JwtConfig;
use crate::error::{ApiError, Error, Result};
use crate::models::Role;

/// Message for a request without a token
pub const MISSING_TOKEN: &str = "Bad or Invalid token!";

/// Message for a token that fails verification
pub const INVALID_TOKEN: &str = "Your token is invalid or expired!";

/// Decoded token payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub email: String,
    pub role: Role,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

#[derive(Clone)]
struct SigningKeys {
    encoding: Arc<EncodingKey>,
    decoding: Arc<DecodingKey>,
    lifetime: Duration,
}

impl SigningKeys {
    fn new(secret: &str, lifetime_secs: u64) -> Self {
        Self {
            encoding: Arc::new(EncodingKey::from_secret(secret.as_bytes())),
            decoding: Arc::new(DecodingKey::from_secret(secret.as_bytes())),
            lifetime: Duration::from_secs(lifetime_secs),
        }
    }
}

/// Issues and verifies access and refresh tokens
#[derive(Clone)]
pub struct TokenIssuer {
    access: SigningKeys,
    refresh: SigningKeys,
    validation: Validation,
}

impl TokenIssuer {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            access: SigningKeys::new(&config.access_secret, config.access_expires_in_secs),
            refresh: SigningKeys::new(&config.refresh_secret, config.refresh_expires_in_secs),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn issue_access(&self, email: &str, role: Role) -> Result<String> {
        issue(&self.access, email, role)
    }

    pub fn issue_refresh(&self, email: &str, role: Role) -> Result<String> {
        issue(&self.refresh, email, role)
    }

    pub fn verify_access(&self, token: Option<&str>) -> Result<Claims> {
        verify(&self.access, &self.validation, token)
    }

    pub fn verify_refresh(&self, token: Option<&str>) -> Result<Claims> {
        verify(&self.refresh, &self.validation, token)
    }

    /// Access token lifetime
    pub fn access_lifetime(&self) -> Duration {
        self.access.lifetime
    }
}

fn issue(keys: &SigningKeys, email: &str, role: Role) -> Result<String> {
    let now = Utc::now().timestamp();
    let lifetime = i64::try_from(keys.lifetime.as_secs()).unwrap_or(i64::MAX);
    let claims = Claims {
        email: email.to_string(),
        role,
        iat: now,
        exp: now.saturating_add(lifetime),
    };

    encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding).map_err(|err| {
        tracing::error!("Token generation failed: {}", err);
        Error::from(ApiError::internal("Cannot generate token!", "auth"))
    })
}

fn verify(keys: &SigningKeys, validation: &Validation, token: Option<&str>) -> Result<Claims> {
    let token = token
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::unauthorized(MISSING_TOKEN, "auth"))?;

    decode::<Claims>(token, &keys.decoding, validation)
        .map(|data| data.claims)
        .map_err(|err| {
            tracing::debug!("Token rejected: {}", err);
            ApiError::unauthorized(INVALID_TOKEN, "auth").into()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(&JwtConfig {
            access_secret: "access-secret".into(),
            access_expires_in_secs: 900,
            refresh_secret: "refresh-secret".into(),
            refresh_expires_in_secs: 3600,
        })
    }

    fn api_message(err: Error) -> String {
        match err {
            Error::Api(api) => api.message,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_access_token_round_trip() {
        let issuer = issuer();
        let token = issuer.issue_access("ann@example.com", Role::Admin).unwrap();
        let claims = issuer.verify_access(Some(&token)).unwrap();

        assert_eq!(claims.email, "ann@example.com");
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn test_kinds_do_not_cross_verify() {
        let issuer = issuer();
        let refresh = issuer.issue_refresh("ann@example.com", Role::User).unwrap();

        assert!(issuer.verify_refresh(Some(&refresh)).is_ok());
        let err = issuer.verify_access(Some(&refresh)).unwrap_err();
        assert_eq!(api_message(err), INVALID_TOKEN);
    }

    #[test]
    fn test_missing_token() {
        let err = issuer().verify_access(None).unwrap_err();
        assert_eq!(api_message(err), MISSING_TOKEN);

        let err = issuer().verify_refresh(Some("  ")).unwrap_err();
        assert_eq!(api_message(err), MISSING_TOKEN);
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let now = Utc::now().timestamp();
        let claims = Claims {
            email: "ann@example.com".into(),
            role: Role::User,
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"access-secret"),
        )
        .unwrap();

        let err = issuer().verify_access(Some(&token)).unwrap_err();
        assert_eq!(api_message(err), INVALID_TOKEN);
    }

    #[test]
    fn test_garbage_token_is_rejected() {
        let err = issuer().verify_access(Some("abc.def.ghi")).unwrap_err();
        assert_eq!(api_message(err), INVALID_TOKEN);
    }
}
