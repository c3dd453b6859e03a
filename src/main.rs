use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use secourisme_api::config::AppConfig;
use secourisme_api::database::{schema, DatabaseManager, PgRegistrationStore};
use secourisme_api::services::mailer::{LogMailer, Mailer, SmtpMailer};
use secourisme_api::{app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, SMTP_*, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=info")),
        )
        .init();

    let config = AppConfig::from_env();
    config.validate()?;
    info!("Starting {} API in {} mode", config.mail.site_name, config.environment.as_str());

    let pool = DatabaseManager::connect(&config.database)
        .await
        .context("connecting to the database")?;
    schema::init_db(&pool).await.context("creating the schema")?;

    let mailer: Arc<dyn Mailer> = match SmtpMailer::from_config(&config.mail) {
        Ok(smtp) => Arc::new(smtp),
        Err(e) => {
            warn!("SMTP not configured ({}), emails will only be logged", e);
            Arc::new(LogMailer)
        }
    };
    if config.mail.admin_email.is_none() {
        warn!("ADMIN_EMAIL is not set: admin notifications are disabled and public forms will be refused");
    }

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let registrations = Arc::new(PgRegistrationStore::new(pool.clone()));
    let state = AppState::new(config, pool, registrations, mailer);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    info!("Listening on http://{}", bind_addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("Shutdown signal received. Stopping server...");
}
