// handlers/protected/formations.rs - Formation management and Excel import
//
// POST   /api/formations/admin             - create
// PUT    /api/formations/admin/:id         - partial update
// PUT    /api/formations/admin/:id/status  - status only
// DELETE /api/formations/admin/:id         - delete with its inscriptions
// POST   /api/formations/admin/import      - upload the catalog workbook

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path, State};
use axum::{Extension, Json};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::database::models::Formation;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::excel::{ensure_spreadsheet, CatalogEntry};
use crate::services::formations::{FormationInput, FormationStatusUpdate, FormationUpdate};
use crate::services::uploads::MultipartForm;
use crate::state::AppState;

/// POST /api/formations/admin - `available_seats` starts at `total_seats`
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<FormationInput>, JsonRejection>,
) -> ApiResult<Formation> {
    let Json(input) = payload?;
    let formation = state.registrations.create_formation(input.validate()?).await?;
    info!(formation = %formation.id, by = %user.id, "formation created");
    Ok(ApiResponse::created(formation))
}

/**
 * PUT /api/formations/admin/:id - Partial update
 *
 * Changing `total_seats` moves `available_seats` by the same amount; a new
 * total below the seats already taken is rejected with 400.
 */
pub async fn update(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<FormationUpdate>, JsonRejection>,
) -> ApiResult<Formation> {
    let Path(id) = path?;
    let Json(update) = payload?;
    let formation = state.registrations.update_formation(id, update.validate()?).await?;
    Ok(ApiResponse::success(formation))
}

/// PUT /api/formations/admin/:id/status
pub async fn update_status(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<FormationStatusUpdate>, JsonRejection>,
) -> ApiResult<Formation> {
    let Path(id) = path?;
    let Json(body) = payload?;
    let formation = state.registrations.set_formation_status(id, body.status).await?;
    info!(formation = %id, status = %formation.status, "formation status changed");
    Ok(ApiResponse::success(formation))
}

/// DELETE /api/formations/admin/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<()> {
    let Path(id) = path?;
    state.registrations.delete_formation(id).await?;
    info!(formation = %id, by = %user.id, "formation deleted");
    Ok(ApiResponse::no_content())
}

#[derive(Debug, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub formations: Vec<CatalogEntry>,
}

/**
 * POST /api/formations/admin/import - multipart field `file`
 *
 * Accepts `.xlsx` / `.xls` (by name or spreadsheet MIME type). The workbook
 * is parsed before it replaces the stored catalog, so a broken upload keeps
 * the previous one.
 */
pub async fn import(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<ImportSummary> {
    let mut multipart = multipart?;
    let mut form = MultipartForm::read(&mut multipart, state.config.uploads.max_excel_bytes).await?;
    let file = form.take_file("file")?;
    ensure_spreadsheet(Some(&file.file_name), file.content_type.as_deref())?;

    let formations = state.catalog.import(&file.bytes).await?;
    info!(
        path = %state.catalog.path().display(),
        file = %file.file_name,
        formations = formations.len(),
        by = %user.id,
        "formation catalog imported"
    );
    Ok(ApiResponse::success(ImportSummary {
        imported: formations.len(),
        formations,
    }))
}
