use std::sync::Arc;

use anyhow::Context;
use user_service::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;
    init_tracing(&config)?;

    let users = MongoUserRepository::connect(&config.database)
        .await
        .context("configuring MongoDB client")?;
    users
        .ensure_indexes()
        .await
        .context("creating user indexes")?;
    tracing::info!(database = %config.database.name, "Connected to MongoDB");

    let state = AppState::new(config.clone(), Arc::new(users));
    Server::new(config).serve(router(state)).await?;

    Ok(())
}
