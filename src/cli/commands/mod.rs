pub mod admin;
pub mod db;

use anyhow::Context;
use sqlx::PgPool;

use crate::config::AppConfig;
use crate::database::{schema, DatabaseManager};

/// Connect with the same environment the server reads, schema included.
pub(crate) async fn connect() -> anyhow::Result<PgPool> {
    let config = AppConfig::from_env();
    let pool = DatabaseManager::connect(&config.database)
        .await
        .context("connecting to the database (check DATABASE_URL)")?;
    schema::init_db(&pool).await.context("creating the schema")?;
    Ok(pool)
}
