//! Application state management

use std::sync::Arc;

use crate::auth::{PasswordHasher, TokenIssuer};
use crate::config::Config;
use crate::repository::UserRepository;

/// Application state shared across handlers
///
/// Cloning is cheap; every component is reference counted or small.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    users: Arc<dyn UserRepository>,
    tokens: TokenIssuer,
    passwords: PasswordHasher,
}

impl AppState {
    /// Build the state from configuration and a user store
    pub fn new(config: Config, users: Arc<dyn UserRepository>) -> Self {
        let tokens = TokenIssuer::new(&config.jwt);
        let passwords = PasswordHasher::new(&config.password);
        Self {
            config: Arc::new(config),
            users,
            tokens,
            passwords,
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn users(&self) -> &dyn UserRepository {
        self.users.as_ref()
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    pub fn passwords(&self) -> &PasswordHasher {
        &self.passwords
    }

    /// Whether responses should carry the `Secure` cookie flag and omit stacks
    pub fn is_production(&self) -> bool {
        self.config.service.is_production()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! State backed by the in-memory store

    use super::*;
    use crate::repository::InMemoryUserRepository;

    pub fn config() -> Config {
        let mut config = Config::default();
        config.jwt.access_secret = "test-access-secret".into();
        config.jwt.refresh_secret = "test-refresh-secret".into();
        config.password.bcrypt_cost = 4;
        config
    }

    pub fn state() -> (AppState, InMemoryUserRepository) {
        let repo = InMemoryUserRepository::new();
        (AppState::new(config(), Arc::new(repo.clone())), repo)
    }
}
