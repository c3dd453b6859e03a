// handlers/public/news.rs - Published news

use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use uuid::Uuid;

use crate::database::models::News;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::news::{NewsPage, NewsService, PageQuery};
use crate::state::AppState;

/// GET /api/news?page&limit - Published articles, newest first
pub async fn list(
    State(state): State<AppState>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<NewsPage> {
    let Query(page) = query?;
    Ok(ApiResponse::success(NewsService::new(state.pool.clone()).published_page(page).await?))
}

/// GET /api/news/:id - 404 for drafts
pub async fn get(State(state): State<AppState>, path: Result<Path<Uuid>, PathRejection>) -> ApiResult<News> {
    let Path(id) = path?;
    Ok(ApiResponse::success(NewsService::new(state.pool.clone()).published(id).await?))
}
