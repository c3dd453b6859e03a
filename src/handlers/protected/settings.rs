// handlers/protected/settings.rs - GET /api/settings/admin

use axum::extract::State;

use crate::middleware::{ApiResponse, ApiResult};
use crate::services::settings::{SettingsService, SiteSettings};
use crate::state::AppState;

/// Same document as the public route; writing it is SUPER_ADMIN only.
pub async fn get(State(state): State<AppState>) -> ApiResult<SiteSettings> {
    Ok(ApiResponse::success(SettingsService::new(state.pool.clone()).get().await?))
}
