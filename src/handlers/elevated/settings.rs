// handlers/elevated/settings.rs - POST /api/settings/admin

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use crate::middleware::{ApiResponse, ApiResult};
use crate::services::settings::{SettingsPatch, SettingsService, SiteSettings};
use crate::state::AppState;

/**
 * POST /api/settings/admin - Upsert site settings
 *
 * Expected Input (every key optional, absent keys keep their value):
 * ```json
 * {
 *   "contact": { "email": "...", "phone": "...", "address": "..." },
 *   "social": { "facebook": "...", "instagram": "..." },
 *   "notifications": { "email_inscription": true, "email_contact": false }
 * }
 * ```
 *
 * Returns the whole settings document after the update.
 */
pub async fn update(
    State(state): State<AppState>,
    payload: Result<Json<SettingsPatch>, JsonRejection>,
) -> ApiResult<SiteSettings> {
    let Json(patch) = payload?;
    Ok(ApiResponse::success(SettingsService::new(state.pool.clone()).update(patch).await?))
}
