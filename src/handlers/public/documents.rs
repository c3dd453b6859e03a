// handlers/public/documents.rs - Public document listing and downloads

use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use uuid::Uuid;

use crate::database::models::{Document, DocumentCategory};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::documents::DocumentService;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CategoryQuery {
    pub category: Option<DocumentCategory>,
}

pub(crate) fn service(state: &AppState) -> DocumentService {
    DocumentService::new(state.pool.clone(), state.uploads.clone())
}

/// GET /api/documents?category
pub async fn list(
    State(state): State<AppState>,
    query: Result<Query<CategoryQuery>, QueryRejection>,
) -> ApiResult<Vec<Document>> {
    let Query(query) = query?;
    Ok(ApiResponse::success(service(&state).list(query.category).await?))
}

/// GET /api/documents/:id/download - Counts the download and streams the file as an attachment
pub async fn download(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Response, ApiError> {
    let Path(id) = path?;
    let download = service(&state).download(id).await?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        download.document.file_name.replace('"', "")
    );
    Ok((
        [
            (header::CONTENT_TYPE, download.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        download.bytes,
    )
        .into_response())
}
