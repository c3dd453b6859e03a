// handlers/protected/news.rs - News editing, drafts included

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use crate::database::models::News;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::news::{NewsInput, NewsService, NewsUpdate};
use crate::state::AppState;

fn news(state: &AppState) -> NewsService {
    NewsService::new(state.pool.clone())
}

pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<News>> {
    Ok(ApiResponse::success(news(&state).list_all().await?))
}

/// POST /api/news/admin - `published: true` stamps `published_at`
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<NewsInput>, JsonRejection>,
) -> ApiResult<News> {
    let Json(input) = payload?;
    Ok(ApiResponse::created(news(&state).create(input).await?))
}

pub async fn get(State(state): State<AppState>, path: Result<Path<Uuid>, PathRejection>) -> ApiResult<News> {
    let Path(id) = path?;
    Ok(ApiResponse::success(news(&state).get(id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<NewsUpdate>, JsonRejection>,
) -> ApiResult<News> {
    let Path(id) = path?;
    let Json(update) = payload?;
    Ok(ApiResponse::success(news(&state).update(id, update).await?))
}

pub async fn delete(State(state): State<AppState>, path: Result<Path<Uuid>, PathRejection>) -> ApiResult<()> {
    let Path(id) = path?;
    news(&state).delete(id).await?;
    Ok(ApiResponse::no_content())
}
