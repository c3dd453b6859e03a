//! Whole-database export, import and reset for super administrators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use tracing::{info, warn};

use crate::database::models::{AdminProfile, Document, Formation, GalleryImage, Inscription, News, Role, Setting};
use crate::error::ApiError;
use crate::services::settings::{upsert, LAST_BACKUP, LAST_RESET, LAST_RESTORE};

pub const EXPORT_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub version: String,
    pub export_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportData {
    /// Informational only; import never touches accounts.
    #[serde(default)]
    pub admins: Vec<AdminProfile>,
    #[serde(default)]
    pub settings: Vec<Setting>,
    #[serde(default)]
    pub formations: Vec<Formation>,
    #[serde(default)]
    pub inscriptions: Vec<Inscription>,
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default)]
    pub images: Vec<GalleryImage>,
    #[serde(default)]
    pub news: Vec<News>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseExport {
    pub metadata: ExportMetadata,
    pub data: ExportData,
}

impl DatabaseExport {
    /// Reject documents the import would fail on halfway.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.metadata.version != EXPORT_VERSION {
            return Err(ApiError::bad_request(format!(
                "Unsupported export version '{}', expected {}",
                self.metadata.version, EXPORT_VERSION
            )));
        }

        if let Some(f) = self.data.formations.iter().find(|f| !f.seats_within_bounds()) {
            return Err(ApiError::bad_request(format!(
                "Formation {} has available seats outside 0..={}",
                f.id, f.total_seats
            )));
        }

        let orphan = self
            .data
            .inscriptions
            .iter()
            .find(|i| !self.data.formations.iter().any(|f| f.id == i.formation_id));
        if let Some(i) = orphan {
            return Err(ApiError::bad_request(format!(
                "Inscription {} references unknown formation {}",
                i.id, i.formation_id
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStats {
    pub admins: i64,
    pub formations: i64,
    pub inscriptions: i64,
    pub documents: i64,
    pub images: i64,
    pub news: i64,
    pub settings: i64,
    pub last_backup: Option<String>,
}

/// Content tables in delete order (children first).
const CONTENT_TABLES: &[&str] = &["inscriptions", "formations", "documents", "images", "news", "settings"];

#[derive(Clone)]
pub struct BackupService {
    pool: PgPool,
}

impl BackupService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn count(&self, table: &str) -> Result<i64, ApiError> {
        let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn stats(&self) -> Result<DatabaseStats, ApiError> {
        let last_backup = sqlx::query_scalar::<_, String>("SELECT value FROM settings WHERE key = $1")
            .bind(LAST_BACKUP)
            .fetch_optional(&self.pool)
            .await?;

        Ok(DatabaseStats {
            admins: self.count("admins").await?,
            formations: self.count("formations").await?,
            inscriptions: self.count("inscriptions").await?,
            documents: self.count("documents").await?,
            images: self.count("images").await?,
            news: self.count("news").await?,
            settings: self.count("settings").await?,
            last_backup,
        })
    }

    pub async fn export(&self) -> Result<DatabaseExport, ApiError> {
        let mut tx = self.pool.begin().await?;

        let data = ExportData {
            admins: sqlx::query_as(
                "SELECT id, email, first_name, last_name, role, avatar, created_at, updated_at
                 FROM admins ORDER BY created_at",
            )
            .fetch_all(&mut *tx)
            .await?,
            settings: sqlx::query_as("SELECT * FROM settings ORDER BY key")
                .fetch_all(&mut *tx)
                .await?,
            formations: sqlx::query_as("SELECT * FROM formations ORDER BY created_at")
                .fetch_all(&mut *tx)
                .await?,
            inscriptions: sqlx::query_as("SELECT * FROM inscriptions ORDER BY created_at")
                .fetch_all(&mut *tx)
                .await?,
            documents: sqlx::query_as("SELECT * FROM documents ORDER BY created_at")
                .fetch_all(&mut *tx)
                .await?,
            images: sqlx::query_as::<_, GalleryImage>("SELECT * FROM images ORDER BY created_at")
                .fetch_all(&mut *tx)
                .await?
                .into_iter()
                .map(GalleryImage::with_url)
                .collect(),
            news: sqlx::query_as("SELECT * FROM news ORDER BY created_at")
                .fetch_all(&mut *tx)
                .await?,
        };

        let now = Utc::now();
        upsert(&mut *tx, LAST_BACKUP, &now.to_rfc3339()).await?;
        tx.commit().await?;

        info!(
            formations = data.formations.len(),
            inscriptions = data.inscriptions.len(),
            "database exported"
        );
        Ok(DatabaseExport {
            metadata: ExportMetadata {
                version: EXPORT_VERSION.to_string(),
                export_date: now,
            },
            data,
        })
    }

    /// Replace all content with the export's, in one transaction. Admin
    /// accounts are left as they are.
    pub async fn import(&self, export: DatabaseExport) -> Result<(), ApiError> {
        export.validate()?;
        let data = export.data;

        let mut tx = self.pool.begin().await?;
        clear_content(&mut *tx).await?;

        for setting in &data.settings {
            upsert(&mut *tx, &setting.key, &setting.value).await?;
        }
        for f in &data.formations {
            sqlx::query(
                "INSERT INTO formations (id, title, formation_type, date, duration, total_seats,
                     available_seats, price, location, instructor, status, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
            )
            .bind(f.id)
            .bind(&f.title)
            .bind(f.formation_type)
            .bind(f.date)
            .bind(&f.duration)
            .bind(f.total_seats)
            .bind(f.available_seats)
            .bind(f.price)
            .bind(&f.location)
            .bind(&f.instructor)
            .bind(f.status)
            .bind(f.created_at)
            .bind(f.updated_at)
            .execute(&mut *tx)
            .await?;
        }
        for i in &data.inscriptions {
            sqlx::query(
                "INSERT INTO inscriptions (id, first_name, last_name, email, phone, birth_date, message,
                     formation_id, status, notified, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
            )
            .bind(i.id)
            .bind(&i.first_name)
            .bind(&i.last_name)
            .bind(&i.email)
            .bind(&i.phone)
            .bind(i.birth_date)
            .bind(&i.message)
            .bind(i.formation_id)
            .bind(i.status)
            .bind(i.notified)
            .bind(i.created_at)
            .bind(i.updated_at)
            .execute(&mut *tx)
            .await?;
        }
        for d in &data.documents {
            sqlx::query(
                "INSERT INTO documents (id, title, description, category, file_name, file_path,
                     file_size, mime_type, downloads, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            )
            .bind(d.id)
            .bind(&d.title)
            .bind(&d.description)
            .bind(d.category)
            .bind(&d.file_name)
            .bind(&d.file_path)
            .bind(d.file_size)
            .bind(&d.mime_type)
            .bind(d.downloads)
            .bind(d.created_at)
            .bind(d.updated_at)
            .execute(&mut *tx)
            .await?;
        }
        for img in &data.images {
            sqlx::query(
                "INSERT INTO images (id, title, description, category, file_name, file_path, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(img.id)
            .bind(&img.title)
            .bind(&img.description)
            .bind(img.category)
            .bind(&img.file_name)
            .bind(&img.file_path)
            .bind(img.created_at)
            .bind(img.updated_at)
            .execute(&mut *tx)
            .await?;
        }
        for n in &data.news {
            sqlx::query(
                "INSERT INTO news (id, title, content, excerpt, image_url, published, published_at,
                     created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(n.id)
            .bind(&n.title)
            .bind(&n.content)
            .bind(&n.excerpt)
            .bind(&n.image_url)
            .bind(n.published)
            .bind(n.published_at)
            .bind(n.created_at)
            .bind(n.updated_at)
            .execute(&mut *tx)
            .await?;
        }

        upsert(&mut *tx, LAST_RESTORE, &Utc::now().to_rfc3339()).await?;
        tx.commit().await?;

        info!(
            formations = data.formations.len(),
            inscriptions = data.inscriptions.len(),
            documents = data.documents.len(),
            images = data.images.len(),
            news = data.news.len(),
            "database imported"
        );
        Ok(())
    }

    /// Drop all content and every account except super administrators.
    pub async fn reset(&self) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await?;
        clear_content(&mut *tx).await?;

        let removed = sqlx::query("DELETE FROM admins WHERE role <> $1")
            .bind(Role::SuperAdmin)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        upsert(&mut *tx, LAST_RESET, &Utc::now().to_rfc3339()).await?;
        tx.commit().await?;

        warn!(admins_removed = removed, "database reset");
        Ok(())
    }
}

async fn clear_content(conn: &mut PgConnection) -> Result<(), sqlx::Error> {
    for table in CONTENT_TABLES {
        sqlx::query(&format!("DELETE FROM {table}")).execute(&mut *conn).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_formation;
    use uuid::Uuid;

    fn formation(available: i32, total: i32) -> Formation {
        let new = sample_formation(total);
        Formation {
            id: Uuid::new_v4(),
            title: new.title,
            formation_type: new.formation_type,
            date: new.date,
            duration: new.duration,
            total_seats: total,
            available_seats: available,
            price: new.price,
            location: new.location,
            instructor: new.instructor,
            status: new.status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn export(data: ExportData) -> DatabaseExport {
        DatabaseExport {
            metadata: ExportMetadata {
                version: EXPORT_VERSION.into(),
                export_date: Utc::now(),
            },
            data,
        }
    }

    #[test]
    fn rejects_unknown_version() {
        let mut doc = export(ExportData::default());
        doc.metadata.version = "2.0".into();
        assert_eq!(doc.validate().unwrap_err().status_code(), 400);
    }

    #[test]
    fn rejects_seats_out_of_bounds() {
        let doc = export(ExportData {
            formations: vec![formation(11, 10)],
            ..Default::default()
        });
        assert!(doc.validate().is_err());

        let doc = export(ExportData {
            formations: vec![formation(4, 10)],
            ..Default::default()
        });
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn export_document_shape() {
        let doc = export(ExportData::default());
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["metadata"]["version"], "1.0");
        for key in ["admins", "settings", "formations", "inscriptions", "documents", "images", "news"] {
            assert!(value["data"][key].is_array(), "missing {key}");
        }

        let parsed: DatabaseExport =
            serde_json::from_value(serde_json::json!({"metadata": {"version": "1.0", "export_date": Utc::now()}, "data": {}}))
                .unwrap();
        assert!(parsed.data.formations.is_empty());
    }
}
