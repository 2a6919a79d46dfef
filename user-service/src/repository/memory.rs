//! In-memory adapter

use async_trait::async_trait;
use mongodb::bson::{doc, Document};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::UserRepository;
use crate::error::{DuplicateKeyError, Error, Result};
use crate::models::{User, UserRecord};
use crate::query::{CompiledQuery, Model};

/// Database name used in duplicate-key diagnostics
const DATABASE: &str = "user_service";

/// Users held in process memory
///
/// Listing queries are evaluated with [`CompiledQuery::apply`]; unique
/// fields are enforced the way the MongoDB indexes enforce them.
#[derive(Clone, Debug, Default)]
pub struct InMemoryUserRepository {
    documents: Arc<RwLock<Vec<Document>>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

fn duplicate(field: &str, value: &str) -> Error {
    let message = format!(
        "E11000 duplicate key error collection: {}.{} index: {}_1 dup key: {{ {}: \"{}\" }}",
        DATABASE,
        User::COLLECTION,
        field,
        field,
        value
    );
    Error::Duplicate(DuplicateKeyError::new(message).with_key_value(doc! { field: value }))
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn find(&self, query: &CompiledQuery) -> Result<Vec<UserRecord>> {
        let documents = self.documents.read().await.clone();
        query
            .apply(documents)
            .into_iter()
            .map(UserRecord::from_document)
            .collect()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let documents = self.documents.read().await;
        documents
            .iter()
            .find(|document| document.get_str("email").is_ok_and(|stored| stored == email))
            .cloned()
            .map(User::from_document)
            .transpose()
    }

    async fn user_name_exists(&self, user_name: &str) -> Result<bool> {
        let documents = self.documents.read().await;
        Ok(documents
            .iter()
            .any(|document| document.get_str("user_name").is_ok_and(|stored| stored == user_name)))
    }

    async fn insert(&self, user: User) -> Result<User> {
        let document = user.to_document()?;
        let mut documents = self.documents.write().await;

        for (field, value) in [("email", &user.email), ("user_name", &user.user_name)] {
            let taken = documents
                .iter()
                .any(|existing| existing.get_str(field).is_ok_and(|stored| stored == value));
            if taken {
                return Err(duplicate(field, value));
            }
        }

        documents.push(document);
        Ok(user)
    }
}
