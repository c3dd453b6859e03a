// handlers/public/settings.rs - GET /api/settings

use axum::extract::State;

use crate::middleware::{ApiResponse, ApiResult};
use crate::services::settings::{SettingsService, SiteSettings};
use crate::state::AppState;

/// GET /api/settings - Contact details, social links and notification switches
pub async fn get(State(state): State<AppState>) -> ApiResult<SiteSettings> {
    Ok(ApiResponse::success(SettingsService::new(state.pool.clone()).get().await?))
}
