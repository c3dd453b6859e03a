// handlers/protected/users.rs - Admin accounts and the caller's own profile
//
// GET    /api/admin/users                    - list (ADMIN sees ADMIN accounts only)
// GET    /api/admin/users/me                 - own profile
// GET    /api/admin/users/:id
// PUT    /api/admin/users/:id
// DELETE /api/admin/users/:id
// PUT    /api/admin/users/profile/password   - change own password
// POST   /api/admin/users/profile/avatar     - upload own avatar
//
// Account creation is SUPER_ADMIN only and lives in the elevated tier.

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Multipart, Path, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::models::AdminProfile;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::uploads::{detect_image, MultipartForm, AVATARS};
use crate::services::users::{AdminUpdate, UserService};
use crate::services::validation::FieldErrors;
use crate::state::AppState;

fn users(state: &AppState) -> UserService {
    UserService::new(state.pool.clone())
}

pub async fn list(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<Vec<AdminProfile>> {
    Ok(ApiResponse::success(users(&state).list(user.role).await?))
}

pub async fn me(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<AdminProfile> {
    Ok(ApiResponse::success(users(&state).me(user.id).await?))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<AdminProfile> {
    let Path(id) = path?;
    Ok(ApiResponse::success(users(&state).get(user.role, id).await?))
}

/**
 * PUT /api/admin/users/:id
 *
 * Expected Input (all optional):
 * ```json
 * { "email": "...", "first_name": "...", "last_name": "...", "role": "ADMIN", "password": "..." }
 * ```
 *
 * 403 when an ADMIN targets a SUPER_ADMIN or tries to grant SUPER_ADMIN;
 * 400 when the change would leave no SUPER_ADMIN.
 */
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<AdminUpdate>, JsonRejection>,
) -> ApiResult<AdminProfile> {
    let Path(id) = path?;
    let Json(update) = payload?;
    Ok(ApiResponse::success(users(&state).update(user.role, id, update).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<()> {
    let Path(id) = path?;
    users(&state).delete(user.role, id).await?;
    Ok(ApiResponse::no_content())
}

#[derive(Debug, Deserialize)]
pub struct PasswordChange {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Done {
    pub message: &'static str,
}

/// PUT /api/admin/users/profile/password - Requires the current password
pub async fn change_password(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<PasswordChange>, JsonRejection>,
) -> ApiResult<Done> {
    let Json(body) = payload?;
    let mut errors = FieldErrors::new();
    let current = errors.required("current_password", body.current_password.as_deref());
    let new_password = errors.required("new_password", body.new_password.as_deref());
    errors.finish()?;

    users(&state).change_password(user.id, &current, &new_password).await?;
    Ok(ApiResponse::success(Done {
        message: "Password updated",
    }))
}

/**
 * POST /api/admin/users/profile/avatar - multipart field `avatar` (or `file`)
 *
 * JPEG, PNG or WebP only, checked on the bytes. Stored as
 * `/uploads/avatars/{uuid}.{ext}`; the previous avatar file is removed.
 */
pub async fn upload_avatar(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<AdminProfile> {
    let mut multipart = multipart?;
    let mut form = MultipartForm::read(&mut multipart, state.config.uploads.max_avatar_bytes).await?;
    let file = match form.take_file("avatar") {
        Ok(file) => file,
        Err(_) => form.take_file("file")?,
    };

    let extension = match detect_image(&file.bytes)? {
        image::ImageFormat::Png => "png",
        image::ImageFormat::WebP => "webp",
        _ => "jpg",
    };
    let stored = state
        .uploads
        .save(AVATARS, &format!("{}.{}", Uuid::new_v4(), extension), &file.bytes)
        .await?;

    let (profile, previous) = users(&state).set_avatar(user.id, stored.url).await?;
    if let Some(old) = previous.as_deref().and_then(|url| url.strip_prefix("/uploads/avatars/")) {
        state.uploads.remove(AVATARS, old).await;
    }
    Ok(ApiResponse::success(profile))
}
