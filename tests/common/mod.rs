#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::Value;
use sqlx::PgPool;
use tempfile::TempDir;

use secourisme_api::config::DatabaseConfig;
use secourisme_api::database::models::Role;
use secourisme_api::database::{schema, DatabaseManager, MemoryRegistrationStore};
use secourisme_api::testing::{test_config, RecordingMailer, TestApp};

/// The real router served in-process over the memory store and a recording
/// mailer. The database URL points nowhere, so routes that need Postgres
/// fail fast with 503.
pub struct TestServer {
    pub base_url: String,
    pub client: reqwest::Client,
    pub store: Arc<MemoryRegistrationStore>,
    pub mailer: Arc<RecordingMailer>,
    admin_token: String,
    super_admin_token: String,
    _uploads: TempDir,
}

impl TestServer {
    pub async fn spawn() -> Result<Self> {
        let uploads = tempfile::tempdir().context("failed to create uploads dir")?;
        let app = TestApp::new(test_config(uploads.path()))?;
        let admin_token = app.token_for(Role::Admin);
        let super_admin_token = app.token_for(Role::SuperAdmin);

        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind test listener")?;
        let router = secourisme_api::app(app.state.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        let server = Self {
            base_url: format!("http://127.0.0.1:{}", port),
            client: reqwest::Client::new(),
            store: app.store,
            mailer: app.mailer,
            admin_token,
            super_admin_token,
            _uploads: uploads,
        };
        server.wait_ready(Duration::from_secs(5)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.client.get(self.url("/")).send().await.is_ok() {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn token(&self, role: Role) -> &str {
        match role {
            Role::Admin => &self.admin_token,
            Role::SuperAdmin => &self.super_admin_token,
        }
    }

    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(self.url(path))
    }

    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.post(self.url(path))
    }

    pub fn put(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.put(self.url(path))
    }

    pub fn delete(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.delete(self.url(path))
    }

    /// Request carrying an ADMIN bearer token.
    pub fn admin(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client.request(method, self.url(path)).bearer_auth(&self.admin_token)
    }

    pub fn super_admin(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client.request(method, self.url(path)).bearer_auth(&self.super_admin_token)
    }

    /// Create a formation through the admin API and return its JSON.
    pub async fn create_formation(&self, total_seats: i32) -> Result<Value> {
        let res = self
            .admin(reqwest::Method::POST, "/api/formations/admin")
            .json(&serde_json::json!({
                "title": "PSC1 - Prévention et secours civiques",
                "type": "PSC1",
                "date": "2099-09-20T09:00:00Z",
                "duration": "7h",
                "total_seats": total_seats,
                "price": 60,
                "location": "Hyères",
                "instructor": "Paul Durand"
            }))
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::CREATED);
        Ok(res.json::<Value>().await?["data"].clone())
    }

    pub async fn available_seats(&self, formation_id: &str) -> Result<i64> {
        let body: Value = self
            .get(&format!("/api/formations/{}", formation_id))
            .send()
            .await?
            .json()
            .await?;
        body["data"]["available_seats"]
            .as_i64()
            .context("available_seats missing from formation")
    }
}

pub fn registrant(formation_id: &str, email: &str) -> Value {
    serde_json::json!({
        "formation_id": formation_id,
        "first_name": "Léa",
        "last_name": "Martin",
        "email": email,
        "phone": "0612345678",
        "birth_date": "1998-03-21",
        "message": "Première formation"
    })
}

/// A pool on `DATABASE_URL` with the schema in place, or `None` when the
/// variable is unset. The database must be disposable: some tests wipe it.
pub async fn database() -> Result<Option<PgPool>> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping");
        return Ok(None);
    };
    let pool = DatabaseManager::connect(&DatabaseConfig {
        url,
        max_connections: 5,
        connection_timeout: 5,
    })
    .await?;
    schema::init_db(&pool).await?;
    Ok(Some(pool))
}

/// An address no other test run will have used.
pub fn unique_email(prefix: &str) -> String {
    format!("{}.{}@example.org", prefix, uuid::Uuid::new_v4().simple())
}
