// handlers/elevated/database.rs - Whole-database maintenance
//
// GET  /api/database/stats   - row counts and last backup date
// GET  /api/database/export  - full JSON export
// POST /api/database/import  - replace all content from an export
// POST /api/database/reset   - wipe content, keep super administrators

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::{Extension, Json};
use serde::Serialize;
use tracing::warn;

use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::backup::{BackupService, DatabaseExport, DatabaseStats};
use crate::state::AppState;

fn backup(state: &AppState) -> BackupService {
    BackupService::new(state.pool.clone())
}

#[derive(Debug, Serialize)]
pub struct Done {
    pub message: &'static str,
}

pub async fn stats(State(state): State<AppState>) -> ApiResult<DatabaseStats> {
    Ok(ApiResponse::success(backup(&state).stats().await?))
}

/**
 * GET /api/database/export
 *
 * Expected Output:
 * ```json
 * {
 *   "success": true,
 *   "data": {
 *     "metadata": { "version": "1.0", "export_date": "2025-06-15T12:00:00Z" },
 *     "data": { "admins": [], "settings": [], "formations": [], "inscriptions": [],
 *               "documents": [], "images": [], "news": [] }
 *   }
 * }
 * ```
 *
 * Admin entries never carry password hashes. Uploaded files are not part of
 * the export.
 */
pub async fn export(State(state): State<AppState>) -> ApiResult<DatabaseExport> {
    Ok(ApiResponse::success(backup(&state).export().await?))
}

/// POST /api/database/import - Body is an export document; admins are left untouched
pub async fn import(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<DatabaseExport>, JsonRejection>,
) -> ApiResult<Done> {
    let Json(export) = payload?;
    warn!(by = %user.id, "database import requested");
    backup(&state).import(export).await?;
    Ok(ApiResponse::success(Done {
        message: "Database restored",
    }))
}

/// POST /api/database/reset - Irreversible
pub async fn reset(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<Done> {
    warn!(by = %user.id, "database reset requested");
    backup(&state).reset().await?;
    Ok(ApiResponse::success(Done {
        message: "Database reset",
    }))
}
