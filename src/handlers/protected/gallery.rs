// handlers/protected/gallery.rs - Gallery management

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Multipart, Path, Query, State};
use axum::Json;
use uuid::Uuid;

use crate::database::models::{GalleryImage, ImageCategory};
use crate::handlers::public::gallery::{service, GalleryQuery};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::gallery::{ImageUpdate, NewImage};
use crate::services::uploads::MultipartForm;
use crate::services::validation::FieldErrors;
use crate::state::AppState;

/// GET /api/galerie/admin?category - Flat list, newest first
pub async fn list(
    State(state): State<AppState>,
    query: Result<Query<GalleryQuery>, QueryRejection>,
) -> ApiResult<Vec<GalleryImage>> {
    let Query(query) = query?;
    Ok(ApiResponse::success(service(&state).list(query.category).await?))
}

/**
 * POST /api/galerie/admin - multipart upload
 *
 * Fields: `image` (or `file`), `title`, `category` (formations, sauvetage,
 * evenements, equipe), optional `description`. Images wider than 1920 px
 * are scaled down before they are stored.
 */
pub async fn create(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<GalleryImage> {
    let mut multipart = multipart?;
    let mut form = MultipartForm::read(&mut multipart, state.config.uploads.max_image_bytes).await?;
    let file = match form.take_file("image") {
        Ok(file) => file,
        Err(_) => form.take_file("file")?,
    };

    let mut errors = FieldErrors::new();
    let title = errors.required("title", form.text("title").as_deref());
    let category = form
        .text("category")
        .map(|raw| raw.to_lowercase().parse::<ImageCategory>());
    let category = match category {
        Some(Ok(category)) => category,
        Some(Err(e)) => {
            errors.add("category", e.to_string());
            ImageCategory::Formations
        }
        None => {
            errors.add("category", "This field is required");
            ImageCategory::Formations
        }
    };
    errors.finish()?;

    let image = service(&state)
        .create(NewImage {
            title,
            description: form.text("description"),
            category,
            file,
        })
        .await?;
    Ok(ApiResponse::created(image))
}

pub async fn update(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<ImageUpdate>, JsonRejection>,
) -> ApiResult<GalleryImage> {
    let Path(id) = path?;
    let Json(update) = payload?;
    Ok(ApiResponse::success(service(&state).update(id, update).await?))
}

/// DELETE /api/galerie/admin/:id - Removes the row, then the file
pub async fn delete(State(state): State<AppState>, path: Result<Path<Uuid>, PathRejection>) -> ApiResult<()> {
    let Path(id) = path?;
    service(&state).delete(id).await?;
    Ok(ApiResponse::no_content())
}
