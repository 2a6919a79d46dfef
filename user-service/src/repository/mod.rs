//! User store abstraction
//!
//! [`UserRepository`] is the only way services reach the document store.
//! Two adapters are provided:
//!
//! - [`MongoUserRepository`]: MongoDB collection with unique indexes on
//!   `email` and `user_name`
//! - [`InMemoryUserRepository`]: process-local store evaluating compiled
//!   queries directly, used by tests
//!
//! # Example
//!
//! ```rust,ignore
//! use user_service::repository::{MongoUserRepository, UserRepository};
//!
//! let repo = MongoUserRepository::connect(&config.database).await?;
//! repo.ensure_indexes().await?;
//! let user = repo.find_by_email("ann@example.com").await?;
//! ```

mod memory;
mod mongo;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{User, UserRecord};
use crate::query::CompiledQuery;

pub use memory::InMemoryUserRepository;
pub use mongo::MongoUserRepository;

/// Store operations needed by the user and auth services
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Round trip to the store
    async fn ping(&self) -> Result<()>;

    /// Execute a compiled listing query
    async fn find(&self, query: &CompiledQuery) -> Result<Vec<UserRecord>>;

    /// Full document, password hash included
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn user_name_exists(&self, user_name: &str) -> Result<bool>;

    /// Store a new user
    ///
    /// Fails with a duplicate-key error when `email` or `user_name` is taken.
    async fn insert(&self, user: User) -> Result<User>;
}
