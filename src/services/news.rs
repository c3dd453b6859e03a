use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::database::models::News;
use crate::error::ApiError;
use crate::services::validation::{nullable, optional, FieldErrors};

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageQuery {
    /// 1-based page and a page size clamped to `1..=MAX_PAGE_SIZE`.
    pub fn resolve(&self) -> (i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        (page, limit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub total: i64,
    pub total_pages: i64,
    pub current_page: i64,
    pub items_per_page: i64,
}

impl Pagination {
    pub fn new(total: i64, page: i64, limit: i64) -> Self {
        Self {
            total,
            total_pages: (total + limit - 1) / limit,
            current_page: page,
            items_per_page: limit,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewsPage {
    pub news: Vec<News>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewsInput {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub published: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewsUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub excerpt: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub image_url: Option<Option<String>>,
    pub published: Option<bool>,
}

/// `published_at` is stamped the first time an article goes out and kept after.
pub fn publication_date(
    published: bool,
    current: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match (published, current) {
        (true, None) => Some(now),
        (_, current) => current,
    }
}

#[derive(Clone)]
pub struct NewsService {
    pool: PgPool,
}

impl NewsService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn published_page(&self, query: PageQuery) -> Result<NewsPage, ApiError> {
        let (page, limit) = query.resolve();

        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM news WHERE published")
            .fetch_one(&self.pool)
            .await?;
        let news = sqlx::query_as::<_, News>(
            "SELECT * FROM news WHERE published
             ORDER BY published_at DESC NULLS LAST, created_at DESC
             LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind((page - 1) * limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(NewsPage {
            news,
            pagination: Pagination::new(total, page, limit),
        })
    }

    pub async fn published(&self, id: Uuid) -> Result<News, ApiError> {
        sqlx::query_as::<_, News>("SELECT * FROM news WHERE id = $1 AND published")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("News {} not found", id)))
    }

    pub async fn list_all(&self) -> Result<Vec<News>, ApiError> {
        Ok(sqlx::query_as::<_, News>("SELECT * FROM news ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<News, ApiError> {
        sqlx::query_as::<_, News>("SELECT * FROM news WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("News {} not found", id)))
    }

    pub async fn create(&self, input: NewsInput) -> Result<News, ApiError> {
        let mut errors = FieldErrors::new();
        let title = errors.required("title", input.title.as_deref());
        let content = errors.required("content", input.content.as_deref());
        errors.finish()?;

        let now = Utc::now();
        let news = sqlx::query_as::<_, News>(
            "INSERT INTO news (id, title, content, excerpt, image_url, published, published_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&title)
        .bind(&content)
        .bind(optional(input.excerpt))
        .bind(optional(input.image_url))
        .bind(input.published)
        .bind(publication_date(input.published, None, now))
        .fetch_one(&self.pool)
        .await?;

        info!(news = %news.id, published = news.published, "news created");
        Ok(news)
    }

    pub async fn update(&self, id: Uuid, update: NewsUpdate) -> Result<News, ApiError> {
        let mut news = self.get(id).await?;

        let mut errors = FieldErrors::new();
        if update.title.is_some() {
            news.title = errors.required("title", update.title.as_deref());
        }
        if update.content.is_some() {
            news.content = errors.required("content", update.content.as_deref());
        }
        errors.finish()?;

        if let Some(excerpt) = update.excerpt {
            news.excerpt = optional(excerpt);
        }
        if let Some(image_url) = update.image_url {
            news.image_url = optional(image_url);
        }
        if let Some(published) = update.published {
            news.published = published;
        }
        news.published_at = publication_date(news.published, news.published_at, Utc::now());

        Ok(sqlx::query_as::<_, News>(
            "UPDATE news SET title = $2, content = $3, excerpt = $4, image_url = $5,
                 published = $6, published_at = $7, updated_at = $8
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(&news.title)
        .bind(&news.content)
        .bind(&news.excerpt)
        .bind(&news.image_url)
        .bind(news.published)
        .bind(news.published_at)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ApiError> {
        let result = sqlx::query("DELETE FROM news WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::not_found(format!("News {} not found", id)));
        }
        Ok(())
    }
}
