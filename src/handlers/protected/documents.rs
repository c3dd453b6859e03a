// handlers/protected/documents.rs - Document library management

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Multipart, Path, Query, State};
use axum::Json;
use uuid::Uuid;

use crate::database::models::{Document, DocumentCategory};
use crate::error::ApiError;
use crate::handlers::public::documents::{service, CategoryQuery};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::documents::{DocumentUpdate, NewDocument};
use crate::services::uploads::MultipartForm;
use crate::services::validation::FieldErrors;
use crate::state::AppState;

/// GET /api/documents/admin?category
pub async fn list(
    State(state): State<AppState>,
    query: Result<Query<CategoryQuery>, QueryRejection>,
) -> ApiResult<Vec<Document>> {
    let Query(query) = query?;
    Ok(ApiResponse::success(service(&state).list(query.category).await?))
}

/**
 * POST /api/documents/admin - multipart upload
 *
 * Fields: `file` (required), `title` (required), `category` (required, one
 * of FORMATIONS_PRO, FORMATIONS_PUBLIC, SAUVETAGE_SPORTIF, GENERAL),
 * `description` (optional).
 */
pub async fn create(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Document> {
    let mut multipart = multipart?;
    let mut form = MultipartForm::read(&mut multipart, state.config.uploads.max_document_bytes).await?;
    let file = form.take_file("file")?;

    let mut errors = FieldErrors::new();
    let title = errors.required("title", form.text("title").as_deref());
    let category = errors.required("category", form.text("category").as_deref());
    let category = match category.parse::<DocumentCategory>() {
        Ok(category) => Some(category),
        Err(_) if category.is_empty() => None,
        Err(e) => {
            errors.add("category", e.to_string());
            None
        }
    };
    errors.finish()?;
    let category = category.ok_or_else(|| ApiError::invalid_field("category", "This field is required"))?;

    let document = service(&state)
        .create(NewDocument {
            title,
            description: form.text("description"),
            category,
            file,
        })
        .await?;
    Ok(ApiResponse::created(document))
}

pub async fn get(State(state): State<AppState>, path: Result<Path<Uuid>, PathRejection>) -> ApiResult<Document> {
    let Path(id) = path?;
    Ok(ApiResponse::success(service(&state).get(id).await?))
}

/// PUT /api/documents/admin/:id - Metadata only; the file itself is immutable
pub async fn update(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<DocumentUpdate>, JsonRejection>,
) -> ApiResult<Document> {
    let Path(id) = path?;
    let Json(update) = payload?;
    Ok(ApiResponse::success(service(&state).update(id, update).await?))
}

pub async fn delete(State(state): State<AppState>, path: Result<Path<Uuid>, PathRejection>) -> ApiResult<()> {
    let Path(id) = path?;
    service(&state).delete(id).await?;
    Ok(ApiResponse::no_content())
}
