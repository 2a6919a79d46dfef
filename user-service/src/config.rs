//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to lowest):
//! 1. Environment variables (prefix: `USER_SERVICE_`, sections separated by `__`)
//! 2. A TOML file: `./config.toml`, or the path given to [`Config::load_from`]
//! 3. Default values
//!
//! For example `USER_SERVICE_JWT__ACCESS_SECRET` sets `jwt.access_secret`.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "USER_SERVICE_";

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// bcrypt accepts costs in this range
const BCRYPT_COST_RANGE: std::ops::RangeInclusive<u32> = 4..=31;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service configuration
    pub service: ServiceConfig,

    /// MongoDB configuration
    pub database: DatabaseConfig,

    /// JWT configuration
    pub jwt: JwtConfig,

    /// Password hashing configuration
    #[serde(default)]
    pub password: PasswordConfig,

    /// Middleware configuration
    #[serde(default)]
    pub middleware: MiddlewareConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name
    pub name: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level or `EnvFilter` directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Environment (development, production)
    #[serde(default = "default_environment")]
    pub environment: String,
}

impl ServiceConfig {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// MongoDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection string
    pub uri: String,

    /// Database name
    #[serde(default = "default_database_name")]
    pub name: String,

    /// Server selection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl DatabaseConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// JWT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// HS256 secret for access tokens
    pub access_secret: String,

    /// Access token lifetime in seconds
    #[serde(default = "default_access_expiry")]
    pub access_expires_in_secs: u64,

    /// HS256 secret for refresh tokens
    pub refresh_secret: String,

    /// Refresh token lifetime in seconds
    #[serde(default = "default_refresh_expiry")]
    pub refresh_expires_in_secs: u64,
}

/// Password hashing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordConfig {
    /// bcrypt cost (salt rounds)
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            bcrypt_cost: default_bcrypt_cost(),
        }
    }
}

/// Middleware configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiddlewareConfig {
    /// Request body size limit in MB
    #[serde(default = "default_body_limit_mb")]
    pub body_limit_mb: usize,

    /// Enable panic recovery middleware
    #[serde(default = "default_true")]
    pub catch_panic: bool,

    /// Enable compression
    #[serde(default = "default_true")]
    pub compression: bool,

    /// Request ID header name
    #[serde(default = "default_request_id_header")]
    pub request_id_header: String,

    /// Regular expressions matched against the whole `Origin` header;
    /// any origin is allowed when empty
    #[serde(default = "default_cors_allowed_origins")]
    pub cors_allowed_origins: Vec<String>,
}

impl MiddlewareConfig {
    pub fn body_limit_bytes(&self) -> usize {
        self.body_limit_mb.saturating_mul(1024 * 1024)
    }
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            body_limit_mb: default_body_limit_mb(),
            catch_panic: true,
            compression: true,
            request_id_header: default_request_id_header(),
            cors_allowed_origins: default_cors_allowed_origins(),
        }
    }
}

// Default value functions
fn default_port() -> u16 {
    4242
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_database_name() -> String {
    "user_service".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_access_expiry() -> u64 {
    60 * 60
}

fn default_refresh_expiry() -> u64 {
    30 * 24 * 60 * 60
}

fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

fn default_true() -> bool {
    true
}

fn default_body_limit_mb() -> usize {
    10
}

fn default_request_id_header() -> String {
    "x-request-id".to_string()
}

fn default_cors_allowed_origins() -> Vec<String> {
    vec![
        r"^http://localhost:\d+$".to_string(),
        r"^http://192\.168\.0\.\d+:\d+$".to_string(),
    ]
}

impl Config {
    /// Load configuration from `./config.toml` (if present) and the environment
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load configuration from a specific file
    ///
    /// A missing file is not an error; defaults and the environment still apply.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            tracing::info!("Loading configuration from: {}", path.display());
        } else {
            tracing::debug!("No configuration file at {}", path.display());
        }

        let config: Self = Self::figment(path).extract()?;
        config.validate()?;
        Ok(config)
    }

    fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Reject configurations the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.jwt.access_secret.trim().is_empty() {
            return Err(invalid("jwt.access_secret must not be empty"));
        }
        if self.jwt.refresh_secret.trim().is_empty() {
            return Err(invalid("jwt.refresh_secret must not be empty"));
        }
        if !BCRYPT_COST_RANGE.contains(&self.password.bcrypt_cost) {
            return Err(invalid(format!(
                "password.bcrypt_cost must be between {} and {}",
                BCRYPT_COST_RANGE.start(),
                BCRYPT_COST_RANGE.end()
            )));
        }
        if self.database.uri.trim().is_empty() {
            return Err(invalid("database.uri must not be empty"));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::from(figment::Error::from(message.into()))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                name: "user-service".to_string(),
                port: default_port(),
                log_level: default_log_level(),
                timeout_secs: default_timeout(),
                environment: default_environment(),
            },
            database: DatabaseConfig {
                uri: "mongodb://localhost:27017".to_string(),
                name: default_database_name(),
                connect_timeout_secs: default_connect_timeout(),
            },
            jwt: JwtConfig {
                access_secret: String::new(),
                access_expires_in_secs: default_access_expiry(),
                refresh_secret: String::new(),
                refresh_expires_in_secs: default_refresh_expiry(),
            },
            password: PasswordConfig::default(),
            middleware: MiddlewareConfig::default(),
        }
    }
}
