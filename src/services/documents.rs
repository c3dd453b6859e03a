use chrono::Utc;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::database::models::{Document, DocumentCategory};
use crate::error::ApiError;
use crate::services::validation::nullable;
use crate::services::uploads::{mime_for, timestamped_name, UploadStore, UploadedFile, DOCUMENTS};

pub struct NewDocument {
    pub title: String,
    pub description: Option<String>,
    pub category: DocumentCategory,
    pub file: UploadedFile,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentUpdate {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub category: Option<DocumentCategory>,
}

/// A document and its bytes, ready to stream back.
pub struct Download {
    pub document: Document,
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

#[derive(Clone)]
pub struct DocumentService {
    pool: PgPool,
    uploads: UploadStore,
}

impl DocumentService {
    pub fn new(pool: PgPool, uploads: UploadStore) -> Self {
        Self { pool, uploads }
    }

    pub async fn list(&self, category: Option<DocumentCategory>) -> Result<Vec<Document>, ApiError> {
        Ok(sqlx::query_as::<_, Document>(
            "SELECT * FROM documents WHERE ($1::text IS NULL OR category = $1) ORDER BY created_at DESC",
        )
        .bind(category)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<Document, ApiError> {
        sqlx::query_as::<_, Document>("SELECT * FROM documents WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Document {} not found", id)))
    }

    pub async fn create(&self, new: NewDocument) -> Result<Document, ApiError> {
        let file_name = timestamped_name(&new.file.file_name);
        let mime_type = new
            .file
            .content_type
            .clone()
            .filter(|t| !t.is_empty() && t != "application/octet-stream")
            .unwrap_or_else(|| mime_for(&file_name).to_string());

        let stored = self.uploads.save(DOCUMENTS, &file_name, &new.file.bytes).await?;

        let inserted = sqlx::query_as::<_, Document>(
            "INSERT INTO documents (id, title, description, category, file_name, file_path, file_size, mime_type)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.category)
        .bind(&stored.file_name)
        .bind(&stored.url)
        .bind(stored.size as i64)
        .bind(&mime_type)
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(document) => {
                info!(document = %document.id, file = %document.file_name, "document uploaded");
                Ok(document)
            }
            Err(e) => {
                self.uploads.remove(DOCUMENTS, &stored.file_name).await;
                Err(e.into())
            }
        }
    }

    pub async fn update(&self, id: Uuid, update: DocumentUpdate) -> Result<Document, ApiError> {
        let mut document = self.get(id).await?;
        if let Some(title) = update.title {
            let title = title.trim();
            if title.is_empty() {
                return Err(ApiError::invalid_field("title", "This field is required"));
            }
            document.title = title.to_string();
        }
        if let Some(description) = update.description {
            document.description = description;
        }
        if let Some(category) = update.category {
            document.category = category;
        }

        Ok(sqlx::query_as::<_, Document>(
            "UPDATE documents SET title = $2, description = $3, category = $4, updated_at = $5
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(&document.title)
        .bind(&document.description)
        .bind(document.category)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?)
    }

    /// Delete the row, then the file; a missing file only warns.
    pub async fn delete(&self, id: Uuid) -> Result<(), ApiError> {
        let document = self.get(id).await?;
        sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        self.uploads.remove(DOCUMENTS, &document.file_name).await;
        info!(document = %id, "document deleted");
        Ok(())
    }

    /// Count the download and load the file.
    pub async fn download(&self, id: Uuid) -> Result<Download, ApiError> {
        let document = sqlx::query_as::<_, Document>(
            "UPDATE documents SET downloads = downloads + 1 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Document {} not found", id)))?;

        let bytes = self.uploads.read(DOCUMENTS, &document.file_name).await.map_err(|e| {
            tracing::error!(document = %id, "document file unavailable: {}", e);
            ApiError::not_found("Document file not found")
        })?;

        Ok(Download {
            content_type: mime_for(&document.file_name),
            document,
            bytes,
        })
    }
}
