// handlers/public/gallery.rs - GET /api/galerie

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::database::models::ImageCategory;
use crate::error::ApiError;
use crate::middleware::ApiResponse;
use crate::services::gallery::{GalleryMode, GalleryService};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct GalleryQuery {
    #[serde(default)]
    pub mode: GalleryMode,
    pub category: Option<ImageCategory>,
}

pub(crate) fn service(state: &AppState) -> GalleryService {
    GalleryService::new(state.pool.clone(), state.uploads.clone())
}

/**
 * GET /api/galerie?mode=all|random&category
 *
 * - `mode=all`: every category with its images
 * - `mode=random`: a small random sample for the home page
 * - otherwise a flat list, optionally filtered by `category`
 */
pub async fn list(
    State(state): State<AppState>,
    query: Result<Query<GalleryQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let gallery = service(&state);

    let response = match query.mode {
        GalleryMode::All => ApiResponse::success(gallery.grouped().await?).into_response(),
        GalleryMode::Random => ApiResponse::success(gallery.random().await?).into_response(),
        GalleryMode::List => ApiResponse::success(gallery.list(query.category).await?).into_response(),
    };
    Ok(response)
}
