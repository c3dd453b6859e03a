// handlers/elevated/users.rs - POST /api/admin/users

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::{Extension, Json};

use crate::database::models::AdminProfile;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::users::{NewAdmin, UserService};
use crate::state::AppState;

/**
 * POST /api/admin/users - Create an administrator account
 *
 * Expected Input:
 * ```json
 * {
 *   "email": "string",       // Required, unique (409 otherwise)
 *   "password": "string",    // Required, at least 8 characters
 *   "first_name": "string",  // Required
 *   "last_name": "string",   // Required
 *   "role": "ADMIN"          // Optional: ADMIN (default) or SUPER_ADMIN
 * }
 * ```
 */
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<NewAdmin>, JsonRejection>,
) -> ApiResult<AdminProfile> {
    let Json(new) = payload?;
    let profile = UserService::new(state.pool.clone()).create(Some(user.role), new).await?;
    Ok(ApiResponse::created(profile))
}
