use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::database::models::{GalleryImage, ImageCategory};
use crate::error::ApiError;
use crate::services::uploads::{prepare_image, sanitize_file_name, UploadError, UploadStore, UploadedFile, GALLERY};
use crate::services::validation::nullable;

pub const RANDOM_SAMPLE: i64 = 4;

const ACCEPTED_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GalleryMode {
    /// Grouped by category.
    All,
    Random,
    #[default]
    List,
}

#[derive(Debug, Clone, Serialize)]
pub struct GalleryGroup {
    pub category: ImageCategory,
    pub images: Vec<GalleryImage>,
}

/// Bucket images under every known category, empty ones included.
pub fn group_by_category(images: Vec<GalleryImage>) -> Vec<GalleryGroup> {
    let mut groups: Vec<GalleryGroup> = ImageCategory::ALL
        .iter()
        .map(|category| GalleryGroup {
            category: *category,
            images: Vec::new(),
        })
        .collect();

    for image in images {
        if let Some(group) = groups.iter_mut().find(|g| g.category == image.category) {
            group.images.push(image);
        }
    }
    groups
}

pub struct NewImage {
    pub title: String,
    pub description: Option<String>,
    pub category: ImageCategory,
    pub file: UploadedFile,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageUpdate {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub category: Option<ImageCategory>,
}

#[derive(Clone)]
pub struct GalleryService {
    pool: PgPool,
    uploads: UploadStore,
}

impl GalleryService {
    pub fn new(pool: PgPool, uploads: UploadStore) -> Self {
        Self { pool, uploads }
    }

    pub async fn list(&self, category: Option<ImageCategory>) -> Result<Vec<GalleryImage>, ApiError> {
        let images = sqlx::query_as::<_, GalleryImage>(
            "SELECT * FROM images WHERE ($1::text IS NULL OR category = $1) ORDER BY created_at DESC",
        )
        .bind(category)
        .fetch_all(&self.pool)
        .await?;
        Ok(images.into_iter().map(GalleryImage::with_url).collect())
    }

    pub async fn grouped(&self) -> Result<Vec<GalleryGroup>, ApiError> {
        Ok(group_by_category(self.list(None).await?))
    }

    pub async fn random(&self) -> Result<Vec<GalleryImage>, ApiError> {
        let images = sqlx::query_as::<_, GalleryImage>("SELECT * FROM images ORDER BY RANDOM() LIMIT $1")
            .bind(RANDOM_SAMPLE)
            .fetch_all(&self.pool)
            .await?;
        Ok(images.into_iter().map(GalleryImage::with_url).collect())
    }

    pub async fn get(&self, id: Uuid) -> Result<GalleryImage, ApiError> {
        sqlx::query_as::<_, GalleryImage>("SELECT * FROM images WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(GalleryImage::with_url)
            .ok_or_else(|| ApiError::not_found(format!("Image {} not found", id)))
    }

    pub async fn create(&self, new: NewImage) -> Result<GalleryImage, ApiError> {
        if let Some(content_type) = new.file.content_type.as_deref() {
            if !ACCEPTED_TYPES.contains(&content_type) {
                return Err(UploadError::UnsupportedType(content_type.to_string()).into());
            }
        }

        let bytes = new.file.bytes;
        let prepared = tokio::task::spawn_blocking(move || prepare_image(&bytes))
            .await
            .map_err(|e| {
                tracing::error!("image processing task failed: {}", e);
                ApiError::internal_server_error("Image processing failed")
            })??;

        let stem = std::path::Path::new(&new.file.file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("image");
        let file_name = format!(
            "{}-{}.{}",
            Utc::now().timestamp_millis(),
            sanitize_file_name(stem).to_lowercase(),
            prepared.extension()
        );
        let stored = self.uploads.save(GALLERY, &file_name, &prepared.bytes).await?;

        let inserted = sqlx::query_as::<_, GalleryImage>(
            "INSERT INTO images (id, title, description, category, file_name, file_path)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.category)
        .bind(&stored.file_name)
        .bind(&stored.url)
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(image) => {
                info!(
                    image = %image.id,
                    width = prepared.width,
                    height = prepared.height,
                    "gallery image uploaded"
                );
                Ok(image.with_url())
            }
            Err(e) => {
                self.uploads.remove(GALLERY, &stored.file_name).await;
                Err(e.into())
            }
        }
    }

    pub async fn update(&self, id: Uuid, update: ImageUpdate) -> Result<GalleryImage, ApiError> {
        let mut image = self.get(id).await?;
        if let Some(title) = update.title {
            let title = title.trim();
            if title.is_empty() {
                return Err(ApiError::invalid_field("title", "This field is required"));
            }
            image.title = title.to_string();
        }
        if let Some(description) = update.description {
            image.description = description;
        }
        if let Some(category) = update.category {
            image.category = category;
        }

        let image = sqlx::query_as::<_, GalleryImage>(
            "UPDATE images SET title = $2, description = $3, category = $4, updated_at = $5
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(&image.title)
        .bind(&image.description)
        .bind(image.category)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(image.with_url())
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ApiError> {
        let image = self.get(id).await?;
        sqlx::query("DELETE FROM images WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        self.uploads.remove(GALLERY, &image.file_name).await;
        info!(image = %id, "gallery image deleted");
        Ok(())
    }
}
