use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;

/// Errors from DatabaseManager
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Invalid database URL: {0}")]
    InvalidDatabaseUrl(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Owns pool construction and the liveness probe for the application database.
pub struct DatabaseManager;

impl DatabaseManager {
    /// Connect eagerly; used by the server and CLI at startup.
    pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
        let url = Self::checked_url(&config.url)?;
        let pool = Self::pool_options(config).connect(&url).await?;

        info!("Created database pool for: {}", Self::display_target(&url));
        Ok(pool)
    }

    /// Pool that only opens connections when first used.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
        let url = Self::checked_url(&config.url)?;
        Ok(Self::pool_options(config).connect_lazy(&url)?)
    }

    fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
    }

    fn checked_url(raw: &str) -> Result<String, DatabaseError> {
        let url = url::Url::parse(raw).map_err(|_| DatabaseError::InvalidDatabaseUrl(Self::display_target(raw)))?;
        match url.scheme() {
            "postgres" | "postgresql" => Ok(url.into()),
            _ => Err(DatabaseError::InvalidDatabaseUrl(Self::display_target(raw))),
        }
    }

    /// host/dbname without credentials, for logs and errors.
    fn display_target(raw: &str) -> String {
        match url::Url::parse(raw) {
            Ok(url) => format!("{}{}", url.host_str().unwrap_or("localhost"), url.path()),
            Err(_) => "<unparsable>".to_string(),
        }
    }

    /// Pings the pool and reports how long the round trip took
    pub async fn health_check(pool: &PgPool) -> Result<Duration, DatabaseError> {
        let started = Instant::now();
        sqlx::query("SELECT 1").execute(pool).await?;
        Ok(started.elapsed())
    }
}
