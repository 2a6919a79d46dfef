//! Password hashing using bcrypt
//!
//! Hashing and verification run on the blocking thread pool so the async
//! workers are never held for the duration of a bcrypt round.
//!
//! # Example
//!
//! ```rust,ignore
//! use user_service::auth::PasswordHasher;
//!
//! let hasher = PasswordHasher::new(&config.password);
//! let hash = hasher.hash("my_secure_password").await?;
//! assert!(hasher.verify("my_secure_password", &hash).await?);
//! ```

use crate::config::PasswordConfig;
use crate::error::{ApiError, Error, Result};

/// Password hasher using bcrypt
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(&PasswordConfig::default())
    }
}

impl PasswordHasher {
    pub fn new(config: &PasswordConfig) -> Self {
        Self {
            cost: config.bcrypt_cost,
        }
    }

    /// Hash a password
    ///
    /// Returns a modular crypt string (`$2b$<cost>$...`).
    pub async fn hash(&self, password: &str) -> Result<String> {
        let password = password.to_owned();
        let cost = self.cost;

        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|err| {
                tracing::error!("Password hashing task failed: {}", err);
                hashing_failed()
            })?
            .map_err(|err| {
                tracing::error!("Password hashing failed: {}", err);
                hashing_failed()
            })
    }

    /// Check a password against a stored hash
    pub async fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let password = password.to_owned();
        let hash = hash.to_owned();

        tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|err| {
                tracing::error!("Password verification task failed: {}", err);
                comparison_failed()
            })?
            .map_err(|err| {
                tracing::warn!("Password verification failed: {}", err);
                comparison_failed()
            })
    }
}

fn hashing_failed() -> Error {
    ApiError::internal("Error hashing password!", "password").into()
}

fn comparison_failed() -> Error {
    ApiError::internal("Error comparing password!", "password").into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(&PasswordConfig { bcrypt_cost: 4 })
    }

    #[tokio::test]
    async fn test_hash_and_verify() {
        let hasher = hasher();
        let hash = hasher.hash("secret1").await.unwrap();

        assert!(hash.starts_with("$2"));
        assert_ne!(hash, "secret1");
        assert!(hasher.verify("secret1", &hash).await.unwrap());
        assert!(!hasher.verify("secret2", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_same_password_different_hashes() {
        let hasher = hasher();
        let first = hasher.hash("secret1").await.unwrap();
        let second = hasher.hash("secret1").await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_malformed_hash_is_a_server_error() {
        let err = hasher().verify("secret1", "not-a-hash").await.unwrap_err();
        let normalized = normalize(&err);
        assert_eq!(normalized.status_code, 500);
        assert_eq!(normalized.error_source[0].message, "Error comparing password!");
    }
}
