//! MongoDB adapter

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    options::{ClientOptions, IndexOptions},
    Client, Collection, Database, IndexModel,
};

use super::UserRepository;
use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::models::{User, UserRecord};
use crate::query::{CompiledQuery, Model};

/// Users collection in MongoDB
#[derive(Clone, Debug)]
pub struct MongoUserRepository {
    users: Collection<User>,
    rows: Collection<Document>,
}

impl MongoUserRepository {
    /// Connect using the database section of the configuration
    ///
    /// The driver connects lazily; [`UserRepository::ping`] forces a round trip.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let mut options = ClientOptions::parse(&config.uri).await?;
        options.server_selection_timeout = Some(config.connect_timeout());
        options.app_name = Some(env!("CARGO_PKG_NAME").to_string());

        let client = Client::with_options(options)?;
        Ok(Self::new(&client.database(&config.name)))
    }

    pub fn new(database: &Database) -> Self {
        Self {
            users: database.collection(User::COLLECTION),
            rows: database.collection(User::COLLECTION),
        }
    }

    /// Create the unique indexes on `email` and `user_name`
    pub async fn ensure_indexes(&self) -> Result<()> {
        let unique = |field: &str| {
            IndexModel::builder()
                .keys(doc! { field: 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build()
        };

        self.rows
            .create_indexes([unique("email"), unique("user_name")])
            .await?;

        tracing::info!(collection = User::COLLECTION, "Unique indexes ensured");
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MongoUserRepository {
    async fn ping(&self) -> Result<()> {
        self.rows
            .client()
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;
        Ok(())
    }

    async fn find(&self, query: &CompiledQuery) -> Result<Vec<UserRecord>> {
        let mut find = self.rows.find(query.filter_document());
        if let Some(sort) = query.sort_document() {
            find = find.sort(sort);
        }
        if let Some(skip) = query.skip {
            find = find.skip(skip);
        }
        if let Some(limit) = query.limit {
            find = find.limit(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        if let Some(projection) = query.projection() {
            find = find.projection(projection);
        }

        let documents: Vec<Document> = find.await?.try_collect().await?;
        tracing::debug!(
            collection = query.collection,
            returned = documents.len(),
            "Listing query executed"
        );

        documents.into_iter().map(UserRecord::from_document).collect()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.users.find_one(doc! { "email": email }).await?)
    }

    async fn user_name_exists(&self, user_name: &str) -> Result<bool> {
        let count = self
            .rows
            .count_documents(doc! { "user_name": user_name })
            .limit(1)
            .await?;
        Ok(count > 0)
    }

    async fn insert(&self, user: User) -> Result<User> {
        self.users.insert_one(&user).await?;
        tracing::info!(user_name = %user.user_name, "User stored");
        Ok(user)
    }
}
