// handlers/protected/auth/session.rs - GET /api/auth/me

use axum::extract::State;
use axum::Extension;

use crate::database::models::AdminProfile;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::users::UserService;
use crate::state::AppState;

/// GET /api/auth/me - Profile of the admin holding the token
///
/// A token whose account was deleted since it was issued gets a 404.
pub async fn me(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<AdminProfile> {
    Ok(ApiResponse::success(UserService::new(state.pool.clone()).me(user.id).await?))
}
